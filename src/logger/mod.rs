pub mod console_sink;
pub mod memory_sink;
pub mod types;

pub use self::console_sink::ConsoleLogSink;
pub use self::memory_sink::MemoryLogSink;
pub use self::types::{VerdictLogEntry, VerdictLogSink};

use crate::config::LoggingConfig;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

const SINK_BUFFER: usize = 1000;

/// Fans verdict entries out to the configured sinks, each drained by its own task.
pub struct VerdictLogger {
    sinks: Vec<mpsc::Sender<VerdictLogEntry>>,
    memory: Option<Arc<MemoryLogSink>>,
}

impl VerdictLogger {
    /// Must be called from within a Tokio runtime.
    pub fn new(config: LoggingConfig) -> Arc<Self> {
        let mut sinks = Vec::new();
        let mut memory = None;

        for sink_type in &config.verdict_log_sinks {
            let sink: Arc<dyn VerdictLogSink> = match sink_type.as_str() {
                "console" => Arc::new(ConsoleLogSink::new(config.clone())),
                "memory" => {
                    let sink = Arc::new(MemoryLogSink::new(config.memory_capacity));
                    memory = Some(sink.clone());
                    sink
                }
                other => {
                    warn!("Unknown verdict log sink type: {}", other);
                    continue;
                }
            };
            sinks.push(Self::spawn_sink(sink));
        }

        Arc::new(Self { sinks, memory })
    }

    fn spawn_sink(sink: Arc<dyn VerdictLogSink>) -> mpsc::Sender<VerdictLogEntry> {
        let (tx, mut rx) = mpsc::channel::<VerdictLogEntry>(SINK_BUFFER);
        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                sink.log(&entry);
            }
        });
        tx
    }

    /// The in-memory sink, when configured.
    pub fn memory(&self) -> Option<Arc<MemoryLogSink>> {
        self.memory.clone()
    }

    pub fn log(&self, entry: VerdictLogEntry) {
        let Some((last, rest)) = self.sinks.split_last() else {
            return;
        };
        // Fire and forget, a full buffer drops the entry
        for sink in rest {
            let _ = sink.try_send(entry.clone());
        }
        let _ = last.try_send(entry);
    }
}
