use crate::decision::{Action, Verdict};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictLogEntry {
    pub url: String,
    pub action: Action,
    pub reason: String,
    pub max_score: u8,
    pub hops: usize,
    pub destination: Option<String>,
    pub latency_ms: u64,
}

impl VerdictLogEntry {
    pub fn from_verdict(url: &str, verdict: &Verdict, latency_ms: u64) -> Self {
        Self {
            url: url.to_string(),
            action: verdict.action,
            reason: verdict.reason.to_string(),
            max_score: verdict.max_score,
            hops: verdict.chain.len(),
            destination: verdict.destination.clone(),
            latency_ms,
        }
    }
}

pub trait VerdictLogSink: Send + Sync {
    fn log(&self, entry: &VerdictLogEntry);
}
