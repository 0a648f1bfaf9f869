use super::candidate::UrlCandidate;
use super::reason::{Reason, ScoreResult};
use crate::config::{ScoringConfig, WeightConfig};
use crate::feeds::{FeedHit, FeedSnapshot};
use anyhow::{Context, Result};
use regex::Regex;
use rustc_hash::FxHashSet;
use url::Url;

/// Heuristic risk scorer. Read-only after construction; safe to share.
#[derive(Debug)]
pub struct Scorer {
    secure_scheme: String,
    weights: WeightConfig,
    suspicious_tlds: Regex,
    shorteners: FxHashSet<Box<str>>,
    keywords: Regex,
    /// `None` when no extension is configured.
    executable: Option<Regex>,
    digit_run: Regex,
    entropy_threshold: f64,
    long_label_length: usize,
}

struct Tally {
    total: u32,
    reasons: Vec<Reason>,
}

impl Tally {
    fn add(&mut self, weight: u8, reason: Reason) {
        if weight > 0 {
            self.total += u32::from(weight);
            self.reasons.push(reason);
        }
    }

    fn finish(self) -> ScoreResult {
        ScoreResult {
            score: self.total.min(u32::from(ScoreResult::MAX)) as u8,
            reasons: self.reasons,
        }
    }
}

impl Scorer {
    pub fn new(config: &ScoringConfig) -> Result<Self> {
        let suspicious_tlds =
            Regex::new(&config.suspicious_tlds).context("Invalid suspicious_tlds pattern")?;
        let keywords = Regex::new(&config.keywords).context("Invalid keywords pattern")?;

        let extensions: Vec<String> = config
            .executable_extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.'))
            .filter(|e| !e.is_empty())
            .map(regex::escape)
            .collect();
        let executable = if extensions.is_empty() {
            None
        } else {
            let pattern = format!(r"(?i)\.({})$", extensions.join("|"));
            Some(Regex::new(&pattern).context("Invalid executable_extensions")?)
        };

        let digit_run = Regex::new(&format!(r"\d{{{},}}", config.digit_run_length.max(1)))
            .context("Invalid digit_run_length")?;

        Ok(Self {
            secure_scheme: config.secure_scheme.to_ascii_lowercase(),
            weights: config.weights.clone(),
            suspicious_tlds,
            shorteners: config
                .shorteners
                .iter()
                .map(|s| s.to_ascii_lowercase().into_boxed_str())
                .collect(),
            keywords,
            executable,
            digit_run,
            entropy_threshold: config.entropy_threshold,
            long_label_length: config.long_label_length,
        })
    }

    /// Scores `candidate` against `snapshot`. Pure: same inputs, same result.
    pub fn score(&self, candidate: &UrlCandidate, snapshot: &FeedSnapshot) -> ScoreResult {
        let (Some(url), Some(host)) = (candidate.url(), candidate.host()) else {
            return ScoreResult::unparseable();
        };
        let hits = merge_hits(
            snapshot.host_hits(host),
            snapshot.url_hits(&url_spellings(candidate)),
        );
        self.score_with_hits(candidate, url, &hits)
    }

    /// Scores a parsed candidate given the feeds already known to flag it.
    pub fn score_with_hits(
        &self,
        candidate: &UrlCandidate,
        url: &Url,
        hits: &[FeedHit],
    ) -> ScoreResult {
        let w = &self.weights;
        let mut tally = Tally {
            total: 0,
            reasons: Vec::new(),
        };
        let host = candidate.host().unwrap_or_default();
        let ip_host = candidate.is_ip_host();

        if url.scheme() != self.secure_scheme {
            tally.add(w.non_https, Reason::NonHttps);
        }
        if ip_host {
            tally.add(w.ip_host, Reason::IpHost);
        }
        if !ip_host && host.split('.').any(|label| label.starts_with("xn--")) {
            tally.add(w.punycode, Reason::Punycode);
        }
        if self.is_shortener(host) {
            tally.add(w.shortener, Reason::Shortener);
        }
        if !ip_host && self.suspicious_tlds.is_match(host) {
            tally.add(w.suspicious_tld, Reason::SuspiciousTld);
        }

        let mut path_and_query = url.path().to_string();
        if let Some(q) = url.query() {
            path_and_query.push('?');
            path_and_query.push_str(q);
        }
        if self.keywords.is_match(&path_and_query) {
            tally.add(w.keyword, Reason::Keyword);
        }

        for hit in hits {
            tally.add(hit.weight, Reason::Feed(hit.feed.clone()));
        }

        if url.port().is_some_and(|p| p != 80 && p != 443) {
            tally.add(w.non_standard_port, Reason::NonStandardPort);
        }
        if self.executable.as_ref().is_some_and(|re| re.is_match(url.path())) {
            tally.add(w.executable, Reason::Executable);
        }
        if !ip_host && self.digit_run.is_match(host) {
            tally.add(w.digit_run, Reason::DigitRun);
        }
        if !ip_host && char_diversity(host) > self.entropy_threshold {
            tally.add(w.high_entropy, Reason::HighEntropy);
        }
        let first_label = host.split('.').next().unwrap_or_default();
        if !ip_host && first_label.chars().count() > self.long_label_length {
            tally.add(w.long_label, Reason::LongLabel);
        }

        tally.finish()
    }

    fn is_shortener(&self, host: &str) -> bool {
        self.shorteners.contains(host)
            || host
                .strip_prefix("www.")
                .is_some_and(|h| self.shorteners.contains(h))
    }
}

/// The spellings under which a URL may appear in a URL feed.
pub fn url_spellings(candidate: &UrlCandidate) -> Vec<&str> {
    let mut out = vec![candidate.raw()];
    if let Some(url) = candidate.url() {
        if url.as_str() != candidate.raw() {
            out.push(url.as_str());
        }
    }
    out
}

/// Union of host and URL hits, one entry per feed, ordered by feed name.
pub fn merge_hits(mut host_hits: Vec<FeedHit>, url_hits: Vec<FeedHit>) -> Vec<FeedHit> {
    host_hits.extend(url_hits);
    host_hits.sort_by(|a, b| a.feed.cmp(&b.feed));
    host_hits.dedup_by(|a, b| a.feed == b.feed);
    host_hits
}

/// Distinct characters over length.
fn char_diversity(s: &str) -> f64 {
    let distinct: FxHashSet<char> = s.chars().collect();
    distinct.len() as f64 / s.chars().count().max(1) as f64
}
