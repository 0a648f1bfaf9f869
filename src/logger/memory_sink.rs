use super::{VerdictLogEntry, VerdictLogSink};
use std::collections::VecDeque;
use std::sync::RwLock;

/// Keeps the most recent verdicts in a bounded ring buffer.
pub struct MemoryLogSink {
    buffer: RwLock<VecDeque<VerdictLogEntry>>,
    capacity: usize,
}

impl MemoryLogSink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Oldest first.
    pub fn get_recent(&self) -> Vec<VerdictLogEntry> {
        let buffer = self.buffer.read().unwrap_or_else(|e| e.into_inner());
        buffer.iter().cloned().collect()
    }
}

impl VerdictLogSink for MemoryLogSink {
    fn log(&self, entry: &VerdictLogEntry) {
        let mut buffer = self.buffer.write().unwrap_or_else(|e| e.into_inner());
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Action;

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let sink = MemoryLogSink::new(2);
        for i in 0..3 {
            sink.log(&VerdictLogEntry {
                url: format!("https://{}.test/", i),
                action: Action::Allow,
                reason: "clean".into(),
                max_score: 0,
                hops: 1,
                destination: None,
                latency_ms: 0,
            });
        }
        let urls: Vec<String> = sink.get_recent().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["https://1.test/", "https://2.test/"]);
    }
}
