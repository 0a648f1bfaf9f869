//! Memoization of feed lookups and score results.
//!
//! Every key carries the snapshot version it was computed against, so an entry
//! produced under an older snapshot can never answer a lookup under a newer one.

use crate::config::CacheConfig;
use crate::feeds::{FeedHit, FeedSnapshot};
use crate::scoring::{merge_hits, url_spellings, ScoreResult, Scorer, UrlCandidate};
use crate::stats::StatsCollector;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Anything that can score a candidate against a snapshot.
pub trait UrlScorer: Send + Sync {
    fn score(&self, candidate: &UrlCandidate, snapshot: &FeedSnapshot) -> ScoreResult;
}

impl UrlScorer for Scorer {
    fn score(&self, candidate: &UrlCandidate, snapshot: &FeedSnapshot) -> ScoreResult {
        Scorer::score(self, candidate, snapshot)
    }
}

type VersionedKey = (u64, Arc<str>);

pub struct ScoreCache {
    hosts: Cache<VersionedKey, Arc<[FeedHit]>>,
    scores: Cache<VersionedKey, ScoreResult>,
}

impl ScoreCache {
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs.max(1));
        Self {
            hosts: Cache::builder()
                .max_capacity(config.capacity)
                .time_to_live(ttl)
                .build(),
            scores: Cache::builder()
                .max_capacity(config.capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn host_hits(&self, snapshot: &FeedSnapshot, host: &str) -> Arc<[FeedHit]> {
        let key: VersionedKey = (snapshot.version(), Arc::from(host));
        if let Some(hits) = self.hosts.get(&key) {
            return hits;
        }
        let hits: Arc<[FeedHit]> = snapshot.host_hits(host).into();
        self.hosts.insert(key, hits.clone());
        hits
    }

    pub fn get_score(&self, version: u64, raw: &str) -> Option<ScoreResult> {
        self.scores.get(&(version, Arc::<str>::from(raw)))
    }

    pub fn put_score(&self, version: u64, raw: &str, result: ScoreResult) {
        self.scores.insert((version, Arc::<str>::from(raw)), result);
    }

    /// Drops every entry; called when a new snapshot is published.
    pub fn clear(&self) {
        self.hosts.invalidate_all();
        self.scores.invalidate_all();
    }
}

/// A `Scorer` fronted by an optional `ScoreCache`.
pub struct CachedScorer {
    scorer: Scorer,
    cache: Option<ScoreCache>,
    stats: Option<Arc<StatsCollector>>,
}

impl CachedScorer {
    pub fn new(scorer: Scorer, config: &CacheConfig, stats: Option<Arc<StatsCollector>>) -> Self {
        let cache = config.enable.then(|| ScoreCache::new(config));
        Self {
            scorer,
            cache,
            stats,
        }
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}

impl UrlScorer for CachedScorer {
    fn score(&self, candidate: &UrlCandidate, snapshot: &FeedSnapshot) -> ScoreResult {
        let Some(cache) = &self.cache else {
            return self.scorer.score(candidate, snapshot);
        };
        let (Some(url), Some(host)) = (candidate.url(), candidate.host()) else {
            return ScoreResult::unparseable();
        };

        if let Some(hit) = cache.get_score(snapshot.version(), candidate.raw()) {
            if let Some(stats) = &self.stats {
                stats.inc_cache_hit();
            }
            return hit;
        }
        if let Some(stats) = &self.stats {
            stats.inc_cache_miss();
        }

        let host_hits = cache.host_hits(snapshot, host);
        let hits = merge_hits(
            host_hits.to_vec(),
            snapshot.url_hits(&url_spellings(candidate)),
        );
        let result = self.scorer.score_with_hits(candidate, url, &hits);
        cache.put_score(snapshot.version(), candidate.raw(), result.clone());
        result
    }
}
