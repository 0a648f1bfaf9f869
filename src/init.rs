//! Initialization helpers for the application startup.

use crate::config::Config;
use crate::decision::{Advisory, DohAdvisory, DohResolver, UrlhausAdvisory};
use crate::feeds::FeedStore;
use crate::guard::Guard;
use crate::logger::VerdictLogger;
use crate::stats::StatsCollector;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// HTTP stack crates that are silenced unless the filter names them.
const CHATTY_CRATES: [&str; 3] = ["hyper", "reqwest", "rustls"];

/// Builds the filter directive string from the configured level.
fn filter_directives(level: &str) -> String {
    let mut filter = level.to_string();
    for krate in CHATTY_CRATES {
        if !filter.contains(krate) {
            filter.push_str(&format!(",{}=off", krate));
        }
    }
    filter
}

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(filter_directives(&config.logging.level))
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Builds the advisories enabled in the configuration, in a fixed order.
pub fn build_advisories(config: &Config) -> Result<Vec<Arc<dyn Advisory>>> {
    let mut advisories: Vec<Arc<dyn Advisory>> = Vec::new();
    if config.doh.enable {
        info!("DoH advisory enabled ({})", config.doh.url);
        let resolver = Arc::new(DohResolver::new(&config.doh)?);
        advisories.push(Arc::new(DohAdvisory::new(resolver)));
    }
    if config.urlhaus.enable {
        info!("URLhaus advisory enabled ({})", config.urlhaus.url);
        advisories.push(Arc::new(UrlhausAdvisory::new(&config.urlhaus)?));
    }
    Ok(advisories)
}

/// Wires stats, the verdict logger, the feed store and the advisories into a `Guard`.
/// Must be called from within a Tokio runtime.
pub fn build_guard(config: &Config) -> Result<Arc<Guard>> {
    let stats = if config.stats.enable {
        StatsCollector::spawn(config.stats.log_interval_seconds)
    } else {
        StatsCollector::new(config.stats.log_interval_seconds)
    };
    let logger = VerdictLogger::new(config.logging.clone());
    let store = Arc::new(FeedStore::new(config)?);
    let advisories = build_advisories(config)?;

    let guard = Guard::new(config.clone(), store, stats, logger, advisories)?;
    Ok(Arc::new(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        assert_eq!(
            filter_directives("info"),
            "info,hyper=off,reqwest=off,rustls=off"
        );
        assert_eq!(
            filter_directives("debug,reqwest=trace"),
            "debug,reqwest=trace,hyper=off,rustls=off"
        );
    }

    #[test]
    fn test_advisories_follow_config() {
        let mut config = Config::default();
        assert!(build_advisories(&config).unwrap().is_empty());

        config.doh.enable = true;
        config.urlhaus.enable = true;
        let names: Vec<String> = build_advisories(&config)
            .unwrap()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(names, vec!["dns", "urlhaus"]);
    }
}
