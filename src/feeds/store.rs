use super::fetcher::HttpFetcher;
use super::snapshot::{Feed, FeedEntry, FeedFailure, FeedSnapshot, FeedToken};
use super::traits::FeedFetcher;
use crate::config::{Config, UpdateConfig};
use anyhow::Result;
use arc_swap::ArcSwap;
use futures::{stream, StreamExt};
use ipnetwork::IpNetwork;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

/// Null-route addresses that prefix entries in hosts-file formatted lists.
const NULL_ROUTES: [&str; 2] = ["0.0.0.0", "127.0.0.1"];

const MAX_TOKEN_LEN: usize = 255;

#[derive(Debug, Clone)]
pub struct FeedSource {
    pub name: Arc<str>,
    pub location: String,
    pub weight: u8,
}

impl FeedSource {
    pub fn new(name: &str, location: &str, weight: u8) -> Self {
        Self {
            name: name.into(),
            location: location.to_string(),
            weight,
        }
    }
}

/// Owns the current feed snapshot and rebuilds it from the configured sources.
pub struct FeedStore {
    sources: Vec<FeedSource>,
    fetcher: Arc<dyn FeedFetcher>,
    current: ArcSwap<FeedSnapshot>,
    next_version: AtomicU64,
    fetch_timeout: Duration,
    concurrency: usize,
    refresh_lock: Mutex<()>,
}

impl FeedStore {
    pub fn new(config: &Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new()?);
        Ok(Self::with_fetcher(
            Self::sources_from_config(config),
            fetcher,
            &config.updates,
        ))
    }

    pub fn with_fetcher(
        sources: Vec<FeedSource>,
        fetcher: Arc<dyn FeedFetcher>,
        updates: &UpdateConfig,
    ) -> Self {
        let pending = FeedSnapshot::pending(sources.iter().map(|s| (&s.name, s.weight)));
        Self {
            sources,
            fetcher,
            current: ArcSwap::from_pointee(pending),
            next_version: AtomicU64::new(1),
            fetch_timeout: Duration::from_millis(updates.fetch_timeout_ms),
            concurrency: updates.concurrent_downloads.max(1),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn sources_from_config(config: &Config) -> Vec<FeedSource> {
        config
            .get_feeds_sorted()
            .into_iter()
            .map(|(name, src)| FeedSource::new(&name, &src.url, src.weight))
            .collect()
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    /// The snapshot readers should use right now.
    pub fn current(&self) -> Arc<FeedSnapshot> {
        self.current.load_full()
    }

    /// Rebuilds the snapshot from every configured source and swaps it in.
    pub async fn refresh(&self) -> Arc<FeedSnapshot> {
        // Serialized so a slow refresh can never overwrite a newer snapshot.
        let _guard = self.refresh_lock.lock().await;
        info!("Refreshing feeds...");

        let snapshot = Arc::new(self.load(&self.sources).await);
        self.current.store(snapshot.clone());

        info!(
            "Feed refresh complete. Snapshot v{}: {} entries across {} feeds, {} failed",
            snapshot.version(),
            snapshot.total_entries(),
            snapshot.feeds().len(),
            snapshot.failures().len()
        );
        snapshot
    }

    /// Fetches the given sources concurrently and builds a new snapshot.
    /// A failing source contributes an empty feed and a recorded failure.
    pub async fn load(&self, sources: &[FeedSource]) -> FeedSnapshot {
        let tasks = sources.iter().cloned().map(|source| {
            let fetcher = self.fetcher.clone();
            let timeout = self.fetch_timeout;
            async move {
                let result = Self::fetch_and_parse(fetcher.as_ref(), &source, timeout).await;
                (source, result)
            }
        });

        let results: Vec<(FeedSource, Result<Vec<FeedEntry>>)> = stream::iter(tasks)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut feeds = Vec::with_capacity(results.len());
        let mut failures = Vec::new();

        for (source, result) in results {
            let mut feed = Feed::new(source.name.clone(), source.weight);
            match result {
                Ok(entries) => {
                    let raw = entries.len();
                    feed.extend(entries);
                    info!(
                        "Parsed {} entries ({} distinct) from '{}'",
                        raw,
                        feed.len(),
                        source.name
                    );
                }
                Err(e) => {
                    warn!("Feed '{}' unavailable: {:#}", source.name, e);
                    failures.push(FeedFailure {
                        feed: source.name.clone(),
                        error: format!("{:#}", e),
                    });
                }
            }
            feeds.push(feed);
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        FeedSnapshot::new(version, feeds, failures)
    }

    async fn fetch_and_parse(
        fetcher: &dyn FeedFetcher,
        source: &FeedSource,
        timeout: Duration,
    ) -> Result<Vec<FeedEntry>> {
        info!("Fetching feed '{}' from {}", source.name, source.location);
        let lines = tokio::time::timeout(timeout, fetcher.fetch(&source.location))
            .await
            .map_err(|_| anyhow::anyhow!("timed out after {}ms", timeout.as_millis()))??;

        Ok(lines
            .iter()
            .filter_map(|line| Self::parse_line(line))
            .map(|token| FeedEntry {
                token,
                feed: source.name.clone(),
            })
            .collect())
    }

    pub fn parse_line(line: &str) -> Option<FeedToken> {
        let mut line = line.trim();
        // Skip comments (# generic, ; Spamhaus) and empty lines
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            return None;
        }

        for prefix in NULL_ROUTES {
            if let Some(rest) = line.strip_prefix(prefix) {
                if rest.starts_with(char::is_whitespace) {
                    line = rest.trim_start();
                    break;
                }
            }
        }

        let token = line
            .split(|c: char| c.is_whitespace() || c == ';')
            .next()?
            .trim();
        if token.is_empty() || token.len() >= MAX_TOKEN_LEN {
            return None;
        }

        if token.contains("://") {
            let normalized = Url::parse(token)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| token.to_string());
            return Some(FeedToken::Url(normalized.into_boxed_str()));
        }

        if let Ok(net) = token.parse::<IpNetwork>() {
            return Some(FeedToken::Network(net));
        }

        let domain = token.trim_end_matches('.').to_lowercase();
        if domain.is_empty() {
            return None;
        }
        Some(FeedToken::Domain(domain.into_boxed_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapFetcher {
        lists: HashMap<String, Vec<String>>,
    }

    #[async_trait::async_trait]
    impl FeedFetcher for MapFetcher {
        async fn fetch(&self, location: &str) -> Result<Vec<String>> {
            if location == "slow" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.lists
                .get(location)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404 for {}", location))
        }
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_line_formats() {
        assert_eq!(FeedStore::parse_line("   "), None);
        assert_eq!(FeedStore::parse_line("# comment"), None);
        assert_eq!(FeedStore::parse_line("; Spamhaus DROP List"), None);
        assert_eq!(
            FeedStore::parse_line("  Evil.Test.  "),
            Some(FeedToken::Domain("evil.test".into()))
        );
        assert_eq!(
            FeedStore::parse_line("0.0.0.0 ads.test"),
            Some(FeedToken::Domain("ads.test".into()))
        );
        assert_eq!(
            FeedStore::parse_line("127.0.0.1\ttracker.test # inline"),
            Some(FeedToken::Domain("tracker.test".into()))
        );
        assert_eq!(
            FeedStore::parse_line("1.10.16.0/20 ; SBL256894"),
            Some(FeedToken::Network("1.10.16.0/20".parse().unwrap()))
        );
        assert_eq!(
            FeedStore::parse_line("http://Phish.test/login"),
            Some(FeedToken::Url("http://phish.test/login".into()))
        );
    }

    #[test]
    fn test_bare_null_route_is_network() {
        assert_eq!(
            FeedStore::parse_line("0.0.0.0"),
            Some(FeedToken::Network("0.0.0.0/32".parse().unwrap()))
        );
    }

    #[test]
    fn test_parse_line_drops_oversized() {
        let long = format!("{}.test", "a".repeat(300));
        assert_eq!(FeedStore::parse_line(&long), None);
    }

    #[tokio::test]
    async fn test_load_tolerates_failed_source() {
        let mut lists = HashMap::new();
        lists.insert("good".to_string(), lines("# list\nevil.test\nevil.test\n"));
        let fetcher = Arc::new(MapFetcher { lists });

        let sources = vec![
            FeedSource::new("good", "good", 40),
            FeedSource::new("broken", "missing", 50),
        ];
        let store = FeedStore::with_fetcher(sources.clone(), fetcher, &UpdateConfig::default());

        let snap = store.load(&sources).await;
        assert_eq!(snap.feeds().len(), 2);
        assert_eq!(snap.failures().len(), 1);
        assert_eq!(snap.failures()[0].feed.as_ref(), "broken");
        assert_eq!(snap.total_entries(), 1);
        assert_eq!(snap.host_hits("evil.test")[0].weight, 40);
        assert!(!snap.is_unavailable());
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_source() {
        let mut lists = HashMap::new();
        lists.insert("fast".to_string(), lines("fast.test"));
        lists.insert("slow".to_string(), lines("slow.test"));
        let fetcher = Arc::new(MapFetcher { lists });

        let updates = UpdateConfig {
            fetch_timeout_ms: 100,
            ..UpdateConfig::default()
        };
        let sources = vec![
            FeedSource::new("fast", "fast", 40),
            FeedSource::new("slow", "slow", 40),
        ];
        let store = FeedStore::with_fetcher(sources.clone(), fetcher, &updates);

        let snap = store.load(&sources).await;
        assert_eq!(snap.failures().len(), 1);
        assert_eq!(snap.failures()[0].feed.as_ref(), "slow");
        assert!(snap.failures()[0].error.contains("timed out"));
        assert_eq!(snap.host_hits("fast.test").len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_swaps_and_bumps_version() {
        let mut lists = HashMap::new();
        lists.insert("a".to_string(), lines("a.test\nb.test"));
        let fetcher = Arc::new(MapFetcher { lists });
        let store = FeedStore::with_fetcher(
            vec![FeedSource::new("a", "a", 40)],
            fetcher,
            &UpdateConfig::default(),
        );

        assert_eq!(store.current().version(), 0);
        assert!(store.current().is_unavailable());
        let first = store.refresh().await;
        assert!(!first.is_unavailable());
        let second = store.refresh().await;

        assert!(second.version() > first.version());
        assert_eq!(store.current().version(), second.version());
        // Re-loading the same content does not duplicate tokens.
        assert_eq!(first.total_entries(), 2);
        assert_eq!(second.total_entries(), 2);
    }
}
