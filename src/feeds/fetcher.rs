use super::traits::FeedFetcher;
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;
use url::Url;

/// Fetches `http(s)://` sources over the network and `file://` or bare paths from disk.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("UrlNope/1.0")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()?;

        let stream = resp
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other));
        let reader = StreamReader::new(stream);
        let mut lines = BufReader::new(reader).lines();
        let mut out = Vec::new();

        while let Some(line) = lines.next_line().await? {
            out.push(line);
        }
        Ok(out)
    }

    async fn fetch_file(&self, path: &Path) -> Result<Vec<String>> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read feed file {}", path.display()))?;
        Ok(contents.lines().map(str::to_string).collect())
    }
}

#[async_trait::async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<String>> {
        match Url::parse(location) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                self.fetch_remote(location).await
            }
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| anyhow::anyhow!("Invalid file URL {}", location))?;
                self.fetch_file(&path).await
            }
            Ok(url) => Err(anyhow::anyhow!(
                "Unsupported feed scheme '{}' in {}",
                url.scheme(),
                location
            )),
            // Not a URL at all: treat as a filesystem path.
            Err(_) => self.fetch_file(Path::new(location)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_bare_path() {
        let path = std::env::temp_dir().join("url_nope_fetcher_test.txt");
        tokio::fs::write(&path, "# header\nevil.test\n").await.unwrap();

        let fetcher = HttpFetcher::new().unwrap();
        let lines = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(lines, vec!["# header".to_string(), "evil.test".to_string()]);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let fetcher = HttpFetcher::new().unwrap();
        assert!(fetcher
            .fetch("/definitely/not/here/url_nope.txt")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let fetcher = HttpFetcher::new().unwrap();
        assert!(fetcher.fetch("ftp://feeds.test/list.txt").await.is_err());
    }
}
