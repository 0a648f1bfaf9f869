use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// A heuristic that contributed to a score.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reason {
    NonHttps,
    IpHost,
    Punycode,
    Shortener,
    SuspiciousTld,
    Keyword,
    Feed(Arc<str>),
    NonStandardPort,
    Executable,
    DigitRun,
    HighEntropy,
    LongLabel,
    Unparseable,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::NonHttps => f.write_str("non-https"),
            Reason::IpHost => f.write_str("ip-host"),
            Reason::Punycode => f.write_str("punycode"),
            Reason::Shortener => f.write_str("shortener"),
            Reason::SuspiciousTld => f.write_str("tld"),
            Reason::Keyword => f.write_str("keyword"),
            Reason::Feed(name) => write!(f, "feed:{}", name),
            Reason::NonStandardPort => f.write_str("port"),
            Reason::Executable => f.write_str("executable"),
            Reason::DigitRun => f.write_str("digit-run"),
            Reason::HighEntropy => f.write_str("entropy"),
            Reason::LongLabel => f.write_str("long-label"),
            Reason::Unparseable => f.write_str("unparseable"),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Score in [0, 100] plus the reasons that produced it, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreResult {
    pub score: u8,
    pub reasons: Vec<Reason>,
}

impl ScoreResult {
    pub const MAX: u8 = 100;

    pub fn unparseable() -> Self {
        Self {
            score: Self::MAX,
            reasons: vec![Reason::Unparseable],
        }
    }

    pub fn reaches(&self, threshold: u8) -> bool {
        self.score >= threshold
    }

    pub fn reason_tags(&self) -> Vec<String> {
        self.reasons.iter().map(ToString::to_string).collect()
    }
}
