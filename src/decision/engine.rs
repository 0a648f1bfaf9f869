use super::advisory::{Advisory, Signal};
use crate::chain::{Chain, TerminalReason};
use crate::config::FailurePolicy;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Allow,
    Block,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Allow => f.write_str("allow"),
            Action::Block => f.write_str("block"),
        }
    }
}

/// The single reason a verdict came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisiveReason {
    /// Every hop stayed below the threshold and no advisory objected.
    Clean,
    Chain(TerminalReason),
    Advisory(Arc<str>),
    Timeout,
    FeedsUnavailable,
}

impl DecisiveReason {
    /// Stable names of every reason kind, indexed by `kind_index`.
    pub const KINDS: [&'static str; 9] = [
        "clean",
        "threshold",
        "terminal",
        "depth-exceeded",
        "cycle",
        "unparseable",
        "advisory",
        "timeout",
        "feeds-unavailable",
    ];

    pub fn kind_index(&self) -> usize {
        match self {
            DecisiveReason::Clean => 0,
            DecisiveReason::Chain(TerminalReason::Threshold) => 1,
            DecisiveReason::Chain(TerminalReason::Terminal) => 2,
            DecisiveReason::Chain(TerminalReason::DepthExceeded) => 3,
            DecisiveReason::Chain(TerminalReason::Cycle) => 4,
            DecisiveReason::Chain(TerminalReason::Unparseable) => 5,
            DecisiveReason::Advisory(_) => 6,
            DecisiveReason::Timeout => 7,
            DecisiveReason::FeedsUnavailable => 8,
        }
    }
}

impl fmt::Display for DecisiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisiveReason::Chain(t) => write!(f, "{}", t),
            DecisiveReason::Advisory(name) => write!(f, "advisory:{}", name),
            other => f.write_str(Self::KINDS[other.kind_index()]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Verdict {
    pub action: Action,
    pub chain: Chain,
    pub reason: DecisiveReason,
    pub max_score: u8,
    /// Final destination with tracking parameters removed; set on allowed verdicts.
    pub destination: Option<String>,
}

impl Verdict {
    pub fn new(action: Action, chain: Chain, reason: DecisiveReason) -> Self {
        let max_score = chain.max_score();
        Self {
            action,
            chain,
            reason,
            max_score,
            destination: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.action == Action::Block
    }
}

/// Turns a resolved chain, plus any advisory signals, into a verdict.
pub struct DecisionEngine {
    threshold: u8,
    advisories: Vec<Arc<dyn Advisory>>,
}

impl DecisionEngine {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            advisories: Vec::new(),
        }
    }

    pub fn with_advisory(mut self, advisory: Arc<dyn Advisory>) -> Self {
        info!("Advisory '{}' enabled", advisory.name());
        self.advisories.push(advisory);
        self
    }

    pub fn advisories(&self) -> &[Arc<dyn Advisory>] {
        &self.advisories
    }

    /// Verdict from the chain's structure alone.
    pub fn judge(&self, chain: &Chain) -> (Action, DecisiveReason) {
        let terminal = chain.terminal();
        if terminal.is_blocking() {
            return (Action::Block, DecisiveReason::Chain(terminal));
        }
        if chain.is_empty() || chain.hops().iter().any(|h| h.score.reaches(self.threshold)) {
            return (Action::Block, DecisiveReason::Chain(TerminalReason::Threshold));
        }
        (Action::Allow, DecisiveReason::Clean)
    }

    /// Runs every advisory against every distinct hop URL concurrently.
    /// Returns the name of the first advisory (in registration order) that objected.
    pub async fn consult(&self, chain: &Chain) -> Option<Arc<str>> {
        if self.advisories.is_empty() {
            return None;
        }

        let mut urls: Vec<&Url> = Vec::new();
        for url in chain.hops().iter().filter_map(|h| h.candidate.url()) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }

        let checks = self.advisories.iter().flat_map(|advisory| {
            urls.iter().map(move |url| async move {
                let signal = advisory.check(url).await;
                debug!(advisory = advisory.name(), url = %url, ?signal, "Advisory answered");
                (advisory.name(), signal)
            })
        });

        join_all(checks)
            .await
            .into_iter()
            .find(|(_, signal)| *signal == Signal::Block)
            .map(|(name, _)| Arc::from(name))
    }

    pub async fn decide(&self, chain: Chain) -> Verdict {
        let (action, reason) = self.judge(&chain);
        if action == Action::Block {
            return Verdict::new(action, chain, reason);
        }
        match self.consult(&chain).await {
            Some(name) => Verdict::new(Action::Block, chain, DecisiveReason::Advisory(name)),
            None => Verdict::new(Action::Allow, chain, DecisiveReason::Clean),
        }
    }

    /// Like `decide`, but advisories must answer within `budget`.
    /// When they don't, `policy` picks the verdict.
    pub async fn decide_within(
        &self,
        chain: Chain,
        budget: Duration,
        policy: FailurePolicy,
    ) -> Verdict {
        let (action, reason) = self.judge(&chain);
        if action == Action::Block {
            return Verdict::new(action, chain, reason);
        }
        match tokio::time::timeout(budget, self.consult(&chain)).await {
            Ok(Some(name)) => Verdict::new(Action::Block, chain, DecisiveReason::Advisory(name)),
            Ok(None) => Verdict::new(Action::Allow, chain, DecisiveReason::Clean),
            Err(_) => {
                warn!("Advisories did not answer within {:?} ({:?})", budget, policy);
                let action = match policy {
                    FailurePolicy::FailClosed => Action::Block,
                    FailurePolicy::FailOpen => Action::Allow,
                };
                Verdict::new(action, chain, DecisiveReason::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::UrlScorer;
    use crate::chain::ChainResolver;
    use crate::config::{ResolverConfig, ScoringConfig};
    use crate::feeds::FeedSnapshot;
    use crate::scoring::Scorer;

    struct HostBlocker(&'static str);

    #[async_trait::async_trait]
    impl Advisory for HostBlocker {
        fn name(&self) -> &str {
            "test"
        }

        async fn check(&self, hop: &Url) -> Signal {
            if hop.host_str() == Some(self.0) {
                Signal::Block
            } else {
                Signal::Clear
            }
        }
    }

    struct Silent;

    #[async_trait::async_trait]
    impl Advisory for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn check(&self, _hop: &Url) -> Signal {
            Signal::Unknown
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl Advisory for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn check(&self, _hop: &Url) -> Signal {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Signal::Block
        }
    }

    fn chain(raw: &str) -> Chain {
        let scorer: Arc<dyn UrlScorer> = Arc::new(Scorer::new(&ScoringConfig::default()).unwrap());
        ChainResolver::new(scorer, &ResolverConfig::default(), 60).resolve(
            raw,
            &FeedSnapshot::empty(),
            6,
        )
    }

    #[tokio::test]
    async fn test_allow_clean_chain() {
        let verdict = DecisionEngine::new(60).decide(chain("https://example.com/")).await;
        assert_eq!(verdict.action, Action::Allow);
        assert_eq!(verdict.reason, DecisiveReason::Clean);
        assert_eq!(verdict.max_score, 0);
    }

    #[tokio::test]
    async fn test_block_on_terminal_reasons() {
        let verdict = DecisionEngine::new(60).decide(chain("not a url")).await;
        assert!(verdict.is_blocked());
        assert_eq!(verdict.reason.to_string(), "unparseable");

        let verdict = DecisionEngine::new(60)
            .decide(chain("https://a.test/?url=https://a.test/x"))
            .await;
        assert!(verdict.is_blocked());
        assert_eq!(verdict.reason, DecisiveReason::Chain(TerminalReason::Cycle));
    }

    #[tokio::test]
    async fn test_stricter_engine_threshold_blocks() {
        // 45 < 60 at resolve time, but the engine is configured stricter.
        let verdict = DecisionEngine::new(40)
            .decide(chain("http://198.51.100.7/login"))
            .await;
        assert!(verdict.is_blocked());
        assert_eq!(verdict.reason.to_string(), "threshold");
    }

    #[tokio::test]
    async fn test_advisory_forces_block_on_any_hop() {
        let engine = DecisionEngine::new(60).with_advisory(Arc::new(HostBlocker("b.test")));
        let verdict = engine
            .decide(chain("https://a.test/?url=https://b.test/"))
            .await;
        assert!(verdict.is_blocked());
        assert_eq!(verdict.reason.to_string(), "advisory:test");

        let verdict = engine.decide(chain("https://c.test/")).await;
        assert!(!verdict.is_blocked());
    }

    #[tokio::test]
    async fn test_unknown_advisory_does_not_block() {
        let engine = DecisionEngine::new(60).with_advisory(Arc::new(Silent));
        let verdict = engine.decide(chain("https://example.com/")).await;
        assert_eq!(verdict.action, Action::Allow);
    }

    #[tokio::test]
    async fn test_deadline_follows_policy() {
        let engine = DecisionEngine::new(60).with_advisory(Arc::new(Slow));
        let budget = Duration::from_millis(20);

        let closed = engine
            .decide_within(chain("https://example.com/"), budget, FailurePolicy::FailClosed)
            .await;
        assert!(closed.is_blocked());
        assert_eq!(closed.reason, DecisiveReason::Timeout);

        let open = engine
            .decide_within(chain("https://example.com/"), budget, FailurePolicy::FailOpen)
            .await;
        assert_eq!(open.action, Action::Allow);
        assert_eq!(open.reason, DecisiveReason::Timeout);
        assert_eq!(open.reason.to_string(), "timeout");
    }

    #[tokio::test]
    async fn test_zero_budget_without_advisories() {
        let verdict = DecisionEngine::new(60)
            .decide_within(
                chain("https://example.com/"),
                Duration::ZERO,
                FailurePolicy::FailClosed,
            )
            .await;
        assert_eq!(verdict.action, Action::Allow);
    }

    #[test]
    fn test_reason_names() {
        assert_eq!(DecisiveReason::Clean.to_string(), "clean");
        assert_eq!(DecisiveReason::Timeout.to_string(), "timeout");
        assert_eq!(
            DecisiveReason::FeedsUnavailable.to_string(),
            "feeds-unavailable"
        );
        assert_eq!(
            DecisiveReason::Chain(TerminalReason::DepthExceeded).to_string(),
            "depth-exceeded"
        );
    }
}
