use super::advisory::{Advisory, Signal};
use crate::config::UrlhausConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct LookupResponse {
    query_status: String,
}

/// Looks every hop up in the URLhaus database; a known URL is a block signal.
pub struct UrlhausAdvisory {
    client: Client,
    endpoint: String,
    auth_key: Option<String>,
}

impl UrlhausAdvisory {
    pub fn new(config: &UrlhausConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("UrlNope/1.0")
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to build URLhaus client")?;
        Ok(Self {
            client,
            endpoint: config.url.clone(),
            auth_key: config.auth_key.clone(),
        })
    }

    fn interpret(query_status: &str) -> Signal {
        match query_status {
            "ok" => Signal::Block,
            "no_results" => Signal::Clear,
            _ => Signal::Unknown,
        }
    }

    async fn lookup(&self, url: &str) -> Result<LookupResponse> {
        let mut req = self.client.post(&self.endpoint).form(&[("url", url)]);
        if let Some(key) = &self.auth_key {
            req = req.header("Auth-Key", key);
        }
        let resp: LookupResponse = req
            .send()
            .await
            .context("URLhaus request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed URLhaus response")?;
        Ok(resp)
    }
}

#[async_trait::async_trait]
impl Advisory for UrlhausAdvisory {
    fn name(&self) -> &str {
        "urlhaus"
    }

    async fn check(&self, hop: &Url) -> Signal {
        match self.lookup(hop.as_str()).await {
            Ok(resp) => Self::interpret(&resp.query_status),
            Err(e) => {
                debug!("URLhaus advisory unavailable for {}: {:#}", hop, e);
                Signal::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret() {
        assert_eq!(UrlhausAdvisory::interpret("ok"), Signal::Block);
        assert_eq!(UrlhausAdvisory::interpret("no_results"), Signal::Clear);
        assert_eq!(UrlhausAdvisory::interpret("invalid_url"), Signal::Unknown);
    }

    #[test]
    fn test_parse_lookup_response() {
        let body = r#"{"query_status":"ok","url_status":"online","threat":"malware_download"}"#;
        let parsed: LookupResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.query_status, "ok");
    }
}
