use super::advisory::HostResolver;
use crate::config::DohConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const RCODE_NOERROR: u32 = 0;
const RCODE_NXDOMAIN: u32 = 3;

#[derive(Debug, Deserialize)]
struct DnsJsonResponse {
    #[serde(rename = "Status")]
    status: u32,
}

/// DNS-JSON over HTTPS client. A filtering resolver answers NXDOMAIN for blocked hosts.
pub struct DohResolver {
    client: Client,
    endpoint: String,
}

impl DohResolver {
    pub fn new(config: &DohConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("UrlNope/1.0")
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to build DoH client")?;
        Ok(Self {
            client,
            endpoint: config.url.clone(),
        })
    }

    fn interpret(status: u32) -> Result<bool> {
        match status {
            RCODE_NOERROR => Ok(true),
            RCODE_NXDOMAIN => Ok(false),
            other => Err(anyhow::anyhow!("DoH answered rcode {}", other)),
        }
    }
}

#[async_trait::async_trait]
impl HostResolver for DohResolver {
    async fn resolves(&self, host: &str) -> Result<bool> {
        let resp: DnsJsonResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("name", host), ("type", "A")])
            .header(reqwest::header::ACCEPT, "application/dns-json")
            .send()
            .await
            .context("DoH request failed")?
            .error_for_status()?
            .json()
            .await
            .context("Malformed DoH response")?;
        Self::interpret(resp.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_rcodes() {
        assert!(DohResolver::interpret(0).unwrap());
        assert!(!DohResolver::interpret(3).unwrap());
        assert!(DohResolver::interpret(2).is_err());
    }

    #[test]
    fn test_parse_dns_json() {
        let body = r#"{"Status":3,"TC":false,"Question":[{"name":"evil.test.","type":1}]}"#;
        let parsed: DnsJsonResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, 3);
    }
}
