use anyhow::Result;

/// Retrieves the raw lines of one feed source.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<String>>;
}
