use crate::config::LoggingConfig;
use crate::decision::Action;
use crate::logger::types::{VerdictLogEntry, VerdictLogSink};
use tracing::info;

pub struct ConsoleLogSink {
    config: LoggingConfig,
}

impl ConsoleLogSink {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    fn should_log(&self, entry: &VerdictLogEntry) -> bool {
        if !self.config.enable {
            return false;
        }
        match entry.action {
            Action::Block => self.config.log_blocked,
            Action::Allow => self.config.log_allowed,
        }
    }
}

impl VerdictLogSink for ConsoleLogSink {
    fn log(&self, entry: &VerdictLogEntry) {
        if !self.should_log(entry) {
            return;
        }

        if self.config.format == "json" {
            info!(
                target: "url_verdict",
                url = %entry.url,
                action = %entry.action,
                reason = %entry.reason,
                score = entry.max_score,
                hops = entry.hops,
                dest = ?entry.destination,
                lat = entry.latency_ms
            );
        } else {
            let outcome = match entry.action {
                Action::Block => format!("BLOCKED ({})", entry.reason),
                Action::Allow => match &entry.destination {
                    Some(dest) if dest != &entry.url => format!("ALLOWED -> {}", dest),
                    _ => "ALLOWED".to_string(),
                },
            };
            info!(
                "{} -> {} [score={} hops={}] [{}ms]",
                entry.url, outcome, entry.max_score, entry.hops, entry.latency_ms
            );
        }
    }
}
