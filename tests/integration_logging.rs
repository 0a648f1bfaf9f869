use std::sync::Arc;
use url_nope::config::{Config, LoggingConfig};
use url_nope::decision::Action;
use url_nope::feeds::{FeedStore, HttpFetcher};
use url_nope::guard::Guard;
use url_nope::logger::{VerdictLogEntry, VerdictLogger};
use url_nope::stats::StatsCollector;

fn logging(sinks: &[&str]) -> LoggingConfig {
    LoggingConfig {
        verdict_log_sinks: sinks.iter().map(|s| s.to_string()).collect(),
        memory_capacity: 10,
        ..LoggingConfig::default()
    }
}

#[tokio::test]
async fn test_logger_instantiation() {
    let logger = VerdictLogger::new(logging(&["console", "bogus"]));
    assert!(logger.memory().is_none());

    logger.log(VerdictLogEntry {
        url: "https://test.com/".to_string(),
        action: Action::Allow,
        reason: "clean".to_string(),
        max_score: 0,
        hops: 1,
        destination: None,
        latency_ms: 0,
    });

    // Allow time for async task to process
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_guard_writes_verdicts_to_memory_sink() {
    let mut config = Config::default();
    config.logging = logging(&["console", "memory"]);

    let store = FeedStore::with_fetcher(
        Vec::new(),
        Arc::new(HttpFetcher::new().unwrap()),
        &config.updates,
    );
    let logger = VerdictLogger::new(config.logging.clone());
    let guard = Guard::new(
        config,
        Arc::new(store),
        StatsCollector::new(60),
        logger.clone(),
        Vec::new(),
    )
    .unwrap();

    guard.decide("https://example.com/?utm_source=x").await;
    guard.decide("not a url").await;

    // Allow time for async task to process
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let entries = logger.memory().unwrap().get_recent();
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0].action, Action::Allow);
    assert_eq!(entries[0].reason, "clean");
    assert_eq!(entries[0].destination.as_deref(), Some("https://example.com/"));

    assert_eq!(entries[1].url, "not a url");
    assert_eq!(entries[1].action, Action::Block);
    assert_eq!(entries[1].reason, "unparseable");
    assert_eq!(entries[1].max_score, 100);
}
