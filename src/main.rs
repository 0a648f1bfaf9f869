use anyhow::Result;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use url_nope::config::Config;
use url_nope::decision::Verdict;
use url_nope::guard::Guard;
use url_nope::init::{build_guard, setup_logging};

/// Typed on stdin to force a feed refresh.
const REFRESH_COMMAND: &str = "!refresh";

fn render(raw: &str, verdict: &Verdict) -> String {
    let mut line = format!(
        "{}\t{}\t{}\t{}",
        verdict.action,
        verdict.reason,
        verdict.max_score,
        raw.trim()
    );
    if let Some(dest) = &verdict.destination {
        if dest != raw.trim() {
            line.push_str(&format!("\t-> {}", dest));
        }
    }
    line
}

async fn check_and_print(guard: &Guard, raw: &str) {
    let verdict = guard.decide(raw).await;
    println!("{}", render(raw, &verdict));
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config. A leading *.toml argument is the config path, the rest are URLs.
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = if args.first().is_some_and(|a| a.ends_with(".toml")) {
        args.remove(0)
    } else {
        "config.toml".to_string()
    };
    let config_exists = std::path::Path::new(&config_path).exists();
    let config = if config_exists {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting url-nope...");
    if !config_exists {
        info!("Config file not found, using defaults.");
    }

    // 3. Build Guard & Fetch Initial Feeds
    let guard = build_guard(&config)?;
    guard.refresh_feeds().await;

    // 4. Spawn Periodic Updater
    let update_interval = Duration::from_secs(config.updates.interval_hours.max(1) * 3600);
    let guard_for_loop = guard.clone();

    // Channel for forcing refresh
    let (refresh_tx, mut refresh_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(update_interval);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    info!("Scheduled feed update...");
                }
                msg = refresh_rx.recv() => {
                    if msg.is_none() {
                        break;
                    }
                    info!("Forced feed update triggered...");
                    interval.reset();
                }
            }
            guard_for_loop.refresh_feeds().await;
        }
    });

    // 5. Check URLs from the command line, or from stdin line by line
    if !args.is_empty() {
        for raw in &args {
            check_and_print(&guard, raw).await;
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == REFRESH_COMMAND {
            let _ = refresh_tx.try_send(());
            continue;
        }
        check_and_print(&guard, line).await;
    }

    info!("Input closed, shutting down.");
    Ok(())
}
