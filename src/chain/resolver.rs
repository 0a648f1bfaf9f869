use super::extract::Extractor;
use super::types::{Chain, Hop, TerminalReason};
use crate::cache::UrlScorer;
use crate::config::ResolverConfig;
use crate::feeds::FeedSnapshot;
use crate::scoring::UrlCandidate;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::debug;

/// Unwraps a candidate into a bounded chain of scored hops.
///
/// The walk is an explicit loop: each step parses, scores and extracts one hop,
/// and the visited sets make revisits terminate as `cycle` rather than relying on
/// the depth bound alone.
pub struct ChainResolver {
    scorer: Arc<dyn UrlScorer>,
    extractor: Extractor,
    threshold: u8,
}

impl ChainResolver {
    pub fn new(scorer: Arc<dyn UrlScorer>, config: &ResolverConfig, threshold: u8) -> Self {
        Self {
            scorer,
            extractor: Extractor::new(config),
            threshold,
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Never returns more than `max_depth` hops (a depth of 0 is treated as 1).
    pub fn resolve(&self, raw: &str, snapshot: &FeedSnapshot, max_depth: usize) -> Chain {
        let max_depth = max_depth.max(1);
        let mut hops: Vec<Hop> = Vec::new();
        let mut visited_hosts: FxHashSet<String> = FxHashSet::default();
        let mut visited_targets: FxHashSet<String> = FxHashSet::default();
        let mut current = raw.to_string();

        loop {
            let candidate = UrlCandidate::parse(&current);
            let score = self.scorer.score(&candidate, snapshot);
            debug!(
                hop = hops.len(),
                url = %candidate.raw(),
                score = score.score,
                "Scored hop"
            );

            visited_targets.insert(candidate.raw().to_string());
            let Some(host) = candidate.host().map(str::to_string) else {
                hops.push(Hop {
                    candidate,
                    score,
                    next: None,
                });
                return Chain::new(hops, TerminalReason::Unparseable);
            };
            visited_hosts.insert(host);

            if score.reaches(self.threshold) {
                hops.push(Hop {
                    candidate,
                    score,
                    next: None,
                });
                return Chain::new(hops, TerminalReason::Threshold);
            }

            let extracted = candidate.url().and_then(|u| self.extractor.extract(u));
            let Some((target, method)) = extracted else {
                hops.push(Hop {
                    candidate,
                    score,
                    next: None,
                });
                return Chain::new(hops, TerminalReason::Terminal);
            };

            debug!(via = %method, target = %target, "Extracted next hop");
            hops.push(Hop {
                candidate,
                score,
                next: Some(method),
            });

            let target = target.trim().to_string();
            let target_host = UrlCandidate::parse(&target).host().map(str::to_string);
            if visited_targets.contains(&target)
                || target_host.is_some_and(|h| visited_hosts.contains(&h))
            {
                return Chain::new(hops, TerminalReason::Cycle);
            }

            if hops.len() >= max_depth {
                return Chain::new(hops, TerminalReason::DepthExceeded);
            }

            current = target;
        }
    }
}
