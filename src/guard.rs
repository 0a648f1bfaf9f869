//! Caller-facing entry point.
//!
//! The `Guard` wires the feed store, the cached scorer, the chain resolver and
//! the decision engine together. For every candidate it:
//! 1. Resolves the redirect chain against the current snapshot
//! 2. Consults advisories under the overall deadline
//! 3. Applies the failure policy when no feed could be loaded
//! 4. Records stats and emits a verdict log entry

use crate::cache::{CachedScorer, UrlScorer};
use crate::chain::ChainResolver;
use crate::config::{Config, FailurePolicy};
use crate::decision::{Action, Advisory, DecisionEngine, DecisiveReason, Verdict};
use crate::feeds::{FeedSnapshot, FeedStore};
use crate::logger::{VerdictLogEntry, VerdictLogger};
use crate::sanitize::Sanitizer;
use crate::scoring::Scorer;
use crate::stats::StatsCollector;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct Guard {
    config: Config,
    store: Arc<FeedStore>,
    scorer: Arc<CachedScorer>,
    resolver: ChainResolver,
    engine: DecisionEngine,
    sanitizer: Sanitizer,
    stats: Arc<StatsCollector>,
    logger: Arc<VerdictLogger>,
}

impl Guard {
    pub fn new(
        config: Config,
        store: Arc<FeedStore>,
        stats: Arc<StatsCollector>,
        logger: Arc<VerdictLogger>,
        advisories: Vec<Arc<dyn Advisory>>,
    ) -> Result<Self> {
        let scorer = Scorer::new(&config.scoring).context("Invalid scoring configuration")?;
        let scorer = Arc::new(CachedScorer::new(
            scorer,
            &config.cache,
            Some(stats.clone()),
        ));
        let resolver = ChainResolver::new(
            scorer.clone() as Arc<dyn UrlScorer>,
            &config.resolver,
            config.block_threshold,
        );
        let engine = advisories
            .into_iter()
            .fold(DecisionEngine::new(config.block_threshold), |engine, a| {
                engine.with_advisory(a)
            });

        Ok(Self {
            sanitizer: Sanitizer::new(&config.sanitize),
            config,
            store,
            scorer,
            resolver,
            engine,
            stats,
            logger,
        })
    }

    pub fn store(&self) -> &Arc<FeedStore> {
        &self.store
    }

    pub fn stats(&self) -> &Arc<StatsCollector> {
        &self.stats
    }

    pub fn logger(&self) -> &Arc<VerdictLogger> {
        &self.logger
    }

    /// Rebuilds the feed snapshot and drops every cached result.
    pub async fn refresh_feeds(&self) -> Arc<FeedSnapshot> {
        let snapshot = self.store.refresh().await;
        self.scorer.clear();
        self.stats.record_refresh(snapshot.failures().len());
        snapshot
    }

    /// Renders an allow/block verdict for an arbitrary destination string.
    pub async fn decide(&self, raw: &str) -> Verdict {
        let start = Instant::now();
        self.stats.inc_checks();

        let snapshot = self.store.current();
        let chain = self
            .resolver
            .resolve(raw, &snapshot, self.config.max_depth);

        for diff in chain.diffs() {
            debug!(
                hop = diff.index,
                host = diff.host_changed,
                scheme = diff.scheme_changed,
                path = diff.path_changed,
                query = diff.query_changed,
                "Redirect hop"
            );
        }

        let deadline = Duration::from_millis(self.config.decision.deadline_ms);
        let budget = deadline.saturating_sub(start.elapsed());
        let mut verdict = self
            .engine
            .decide_within(chain, budget, self.config.failure_policy)
            .await;

        if !verdict.is_blocked() && snapshot.is_unavailable() {
            match self.config.failure_policy {
                FailurePolicy::FailClosed => {
                    warn!("No feed is available, blocking {}", raw.trim());
                    verdict.action = Action::Block;
                    verdict.reason = DecisiveReason::FeedsUnavailable;
                }
                FailurePolicy::FailOpen => {
                    debug!("No feed is available, allowing {}", raw.trim());
                }
            }
        }

        if !verdict.is_blocked() {
            verdict.destination = verdict
                .chain
                .last()
                .and_then(|hop| hop.candidate.url())
                .map(|url| self.sanitizer.clean(url).to_string());
        }

        match verdict.action {
            Action::Allow => self.stats.inc_allowed(),
            Action::Block => self.stats.inc_blocked(&verdict.reason),
        }
        self.logger.log(VerdictLogEntry::from_verdict(
            raw.trim(),
            &verdict,
            start.elapsed().as_millis() as u64,
        ));

        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpdateConfig;
    use crate::feeds::{FeedFetcher, FeedSource};

    struct StaticFetcher(Vec<String>);

    #[async_trait::async_trait]
    impl FeedFetcher for StaticFetcher {
        async fn fetch(&self, _location: &str) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn guard(lines: &[&str]) -> Guard {
        guard_with_policy(lines, FailurePolicy::FailClosed)
    }

    fn guard_with_policy(lines: &[&str], policy: FailurePolicy) -> Guard {
        let store = FeedStore::with_fetcher(
            vec![FeedSource::new("test", "mem://test", 50)],
            Arc::new(StaticFetcher(lines.iter().map(|s| s.to_string()).collect())),
            &UpdateConfig::default(),
        );
        let mut config = Config::default();
        config.failure_policy = policy;
        config.logging.verdict_log_sinks = vec!["memory".to_string()];
        Guard::new(
            config.clone(),
            Arc::new(store),
            StatsCollector::new(60),
            VerdictLogger::new(config.logging),
            Vec::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_blocks_until_first_refresh() {
        let guard = guard(&["evil.test"]);
        let verdict = guard.decide("https://a.test/").await;
        assert!(verdict.is_blocked());
        assert_eq!(verdict.reason, DecisiveReason::FeedsUnavailable);

        guard.refresh_feeds().await;
        assert!(!guard.decide("https://a.test/").await.is_blocked());
    }

    #[tokio::test]
    async fn test_unloaded_feeds_allowed_when_fail_open() {
        let guard = guard_with_policy(&["evil.test"], FailurePolicy::FailOpen);
        assert!(!guard.decide("https://a.test/").await.is_blocked());
    }

    #[tokio::test]
    async fn test_refresh_changes_verdict() {
        let guard = guard(&["evil.test"]);
        guard.refresh_feeds().await;
        let verdict = guard.decide("https://www.evil.test/").await;
        assert_eq!(verdict.max_score, 50);

        let verdict = guard.decide("https://www.evil.test./").await;
        assert_eq!(verdict.max_score, 50);

        let snap = guard.stats().get_snapshot();
        assert_eq!(snap.total_checks, 2);
        assert_eq!(snap.feed_refreshes, 1);
    }

    #[tokio::test]
    async fn test_destination_is_sanitized() {
        let guard = guard(&[]);
        guard.refresh_feeds().await;
        let verdict = guard
            .decide("https://a.test/?next=https://shop.test/item%3Fid%3D1%26utm_source%3Dx")
            .await;
        assert_eq!(verdict.action, Action::Allow);
        assert_eq!(verdict.chain.len(), 2);
        assert_eq!(
            verdict.destination.as_deref(),
            Some("https://shop.test/item?id=1")
        );
    }

    #[tokio::test]
    async fn test_blocked_has_no_destination() {
        let guard = guard(&[]);
        guard.refresh_feeds().await;
        let verdict = guard.decide("not a url").await;
        assert!(verdict.is_blocked());
        assert!(verdict.destination.is_none());
        assert_eq!(guard.stats().get_snapshot().blocks_by_reason, vec![("unparseable", 1)]);
    }
}
