use crate::decision::DecisiveReason;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::info;

/// Number of distinct `DecisiveReason` kinds tracked per slot.
const REASON_SLOTS: usize = DecisiveReason::KINDS.len();

#[derive(Debug)]
pub struct StatsCollector {
    // Basic Counters
    total_checks: AtomicU64,
    allowed: AtomicU64,
    blocked: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    feed_failures: AtomicU64,
    feed_refreshes: AtomicU64,

    // One lock-free counter per decisive reason kind.
    blocks_by_reason: [AtomicU64; REASON_SLOTS],

    log_interval: Duration,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub total_checks: u64,
    pub allowed: u64,
    pub blocked: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub feed_failures: u64,
    pub feed_refreshes: u64,
    pub blocks_by_reason: Vec<(&'static str, u64)>,
}

impl StatsCollector {
    /// Creates a collector without the periodic dump task.
    pub fn new(log_interval_sec: u64) -> Arc<Self> {
        Arc::new(Self {
            total_checks: AtomicU64::new(0),
            allowed: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            feed_failures: AtomicU64::new(0),
            feed_refreshes: AtomicU64::new(0),
            blocks_by_reason: [0; REASON_SLOTS].map(|_| AtomicU64::new(0)),
            log_interval: Duration::from_secs(log_interval_sec.max(1)),
        })
    }

    /// Creates a collector and spawns the background dumper. Needs a Tokio runtime.
    pub fn spawn(log_interval_sec: u64) -> Arc<Self> {
        let stats = Self::new(log_interval_sec);
        let stats_clone = stats.clone();
        tokio::spawn(async move {
            stats_clone.run_logger().await;
        });
        stats
    }

    pub fn inc_checks(&self) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_allowed(&self) {
        self.allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_blocked(&self, reason: &DecisiveReason) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
        self.blocks_by_reason[reason.kind_index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh(&self, failed_feeds: usize) {
        self.feed_refreshes.fetch_add(1, Ordering::Relaxed);
        self.feed_failures
            .fetch_add(failed_feeds as u64, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_checks: self.total_checks.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            feed_failures: self.feed_failures.load(Ordering::Relaxed),
            feed_refreshes: self.feed_refreshes.load(Ordering::Relaxed),
            blocks_by_reason: DecisiveReason::KINDS
                .iter()
                .zip(self.blocks_by_reason.iter())
                .map(|(name, count)| (*name, count.load(Ordering::Relaxed)))
                .filter(|(_, count)| *count > 0)
                .collect(),
        }
    }

    async fn run_logger(&self) {
        let mut interval = time::interval(self.log_interval);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.dump_stats();
        }
    }

    fn dump_stats(&self) {
        let s = self.get_snapshot();
        let pct = |n: u64, of: u64| {
            if of > 0 {
                (n as f64 / of as f64) * 100.0
            } else {
                0.0
            }
        };

        let mut block_stats = String::new();
        if s.blocked > 0 {
            block_stats.push_str(" BlockStats: ");
            for (name, count) in &s.blocks_by_reason {
                block_stats.push_str(&format!(
                    "[{}: {} ({:.1}%)] ",
                    name,
                    count,
                    pct(*count, s.blocked)
                ));
            }
        }

        let lookups = s.cache_hits + s.cache_misses;
        info!(
            "STATS DUMP: Checks: {}, Blocked: {} ({:.1}%), CacheHits: {} ({:.1}%), Refreshes: {}, FeedFailures: {}{}",
            s.total_checks,
            s.blocked,
            pct(s.blocked, s.total_checks),
            s.cache_hits,
            pct(s.cache_hits, lookups),
            s.feed_refreshes,
            s.feed_failures,
            block_stats
        );
    }
}
