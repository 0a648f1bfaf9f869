use crate::scoring::{ScoreResult, UrlCandidate};
use std::fmt;

/// Why a chain stopped growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalReason {
    /// A hop scored at or above the block threshold.
    Threshold,
    /// No further target was found: the last hop is the destination.
    Terminal,
    DepthExceeded,
    Cycle,
    Unparseable,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::Threshold => "threshold",
            TerminalReason::Terminal => "terminal",
            TerminalReason::DepthExceeded => "depth-exceeded",
            TerminalReason::Cycle => "cycle",
            TerminalReason::Unparseable => "unparseable",
        }
    }

    pub fn is_blocking(&self) -> bool {
        !matches!(self, TerminalReason::Terminal)
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the next hop was pulled out of the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    RedirectParam(Box<str>),
    EncodedPayload,
}

impl fmt::Display for Extraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extraction::RedirectParam(name) => write!(f, "redirect-param({})", name),
            Extraction::EncodedPayload => f.write_str("encoded-payload"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub candidate: UrlCandidate,
    pub score: ScoreResult,
    pub next: Option<Extraction>,
}

/// What changed between two consecutive hops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopDiff {
    /// Index of the later hop.
    pub index: usize,
    pub host_changed: bool,
    pub scheme_changed: bool,
    pub path_changed: bool,
    pub query_changed: bool,
}

/// Ordered hops produced by one resolution, plus the reason it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    hops: Vec<Hop>,
    terminal: TerminalReason,
}

impl Chain {
    pub(crate) fn new(hops: Vec<Hop>, terminal: TerminalReason) -> Self {
        Self { hops, terminal }
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn terminal(&self) -> TerminalReason {
        self.terminal
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn last(&self) -> Option<&Hop> {
        self.hops.last()
    }

    pub fn max_score(&self) -> u8 {
        self.hops.iter().map(|h| h.score.score).max().unwrap_or(0)
    }

    pub fn diffs(&self) -> Vec<HopDiff> {
        self.hops
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| {
                let a = pair[0].candidate.url()?;
                let b = pair[1].candidate.url()?;
                Some(HopDiff {
                    index: i + 1,
                    host_changed: a.host_str() != b.host_str(),
                    scheme_changed: a.scheme() != b.scheme(),
                    path_changed: a.path() != b.path(),
                    query_changed: a.query() != b.query(),
                })
            })
            .collect()
    }
}
