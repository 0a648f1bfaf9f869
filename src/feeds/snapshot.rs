use ipnetwork::IpNetwork;
use rustc_hash::FxHashSet;
use std::net::IpAddr;
use std::sync::Arc;

/// A flagged token as it appears in a feed, classified at ingest time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedToken {
    Domain(Box<str>),
    Url(Box<str>),
    Network(IpNetwork),
}

/// One token together with the feed that flagged it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub token: FeedToken,
    pub feed: Arc<str>,
}

/// A feed that matched a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedHit {
    pub feed: Arc<str>,
    pub weight: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFailure {
    pub feed: Arc<str>,
    pub error: String,
}

/// Membership sets of a single named feed.
#[derive(Debug)]
pub struct Feed {
    name: Arc<str>,
    weight: u8,
    domains: FxHashSet<Box<str>>,
    urls: FxHashSet<Box<str>>,
    networks: FxHashSet<IpNetwork>,
}

impl Feed {
    pub fn new(name: impl Into<Arc<str>>, weight: u8) -> Self {
        Self {
            name: name.into(),
            weight,
            domains: FxHashSet::default(),
            urls: FxHashSet::default(),
            networks: FxHashSet::default(),
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn weight(&self) -> u8 {
        self.weight
    }

    pub fn insert(&mut self, token: FeedToken) {
        match token {
            FeedToken::Domain(d) => {
                self.domains.insert(d);
            }
            FeedToken::Url(u) => {
                self.urls.insert(u);
            }
            FeedToken::Network(n) => {
                self.networks.insert(n);
            }
        }
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = FeedEntry>) {
        for entry in entries {
            self.insert(entry.token);
        }
    }

    pub fn len(&self) -> usize {
        self.domains.len() + self.urls.len() + self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn hit(&self) -> FeedHit {
        FeedHit {
            feed: self.name.clone(),
            weight: self.weight,
        }
    }

    fn contains_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.');
        if let Ok(ip) = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
        {
            return self.networks.iter().any(|net| net.contains(ip))
                || self.domains.contains(host);
        }

        // Iterative suffix match: a listed domain also flags its subdomains.
        let mut part = host;
        loop {
            if self.domains.contains(part) {
                return true;
            }

            match part.find('.') {
                Some(idx) => {
                    part = &part[idx + 1..];
                    if part.is_empty() {
                        return false;
                    }
                }
                None => return false,
            }
        }
    }

    fn contains_url(&self, candidates: &[&str]) -> bool {
        candidates.iter().any(|u| self.urls.contains(*u))
    }
}

/// Immutable, versioned view of every loaded feed.
#[derive(Debug, Default)]
pub struct FeedSnapshot {
    version: u64,
    // Sorted by name.
    feeds: Vec<Feed>,
    failures: Vec<FeedFailure>,
}

impl FeedSnapshot {
    pub fn new(version: u64, mut feeds: Vec<Feed>, failures: Vec<FeedFailure>) -> Self {
        feeds.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            version,
            feeds,
            failures,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Version 0 stand-in used before the first load: every source is
    /// present but empty and recorded as not loaded yet.
    pub fn pending<'a>(names: impl IntoIterator<Item = (&'a Arc<str>, u8)>) -> Self {
        let mut feeds = Vec::new();
        let mut failures = Vec::new();
        for (name, weight) in names {
            feeds.push(Feed::new(name.clone(), weight));
            failures.push(FeedFailure {
                feed: name.clone(),
                error: "not loaded yet".to_string(),
            });
        }
        Self::new(0, feeds, failures)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn failures(&self) -> &[FeedFailure] {
        &self.failures
    }

    pub fn total_entries(&self) -> usize {
        self.feeds.iter().map(Feed::len).sum()
    }

    /// True when feeds are configured but none of them could be loaded.
    pub fn is_unavailable(&self) -> bool {
        !self.feeds.is_empty() && self.failures.len() >= self.feeds.len()
    }

    /// Feeds flagging `host` by domain suffix or, for IP literals, by network.
    pub fn host_hits(&self, host: &str) -> Vec<FeedHit> {
        self.feeds
            .iter()
            .filter(|feed| feed.contains_host(host))
            .map(Feed::hit)
            .collect()
    }

    /// Feeds listing any of the given URL spellings verbatim.
    pub fn url_hits(&self, candidates: &[&str]) -> Vec<FeedHit> {
        self.feeds
            .iter()
            .filter(|feed| feed.contains_url(candidates))
            .map(Feed::hit)
            .collect()
    }
}
