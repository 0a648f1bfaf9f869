use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_block_threshold")]
    pub block_threshold: u8,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default = "default_feeds")]
    pub feeds: HashMap<String, FeedSourceConfig>,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub updates: UpdateConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub decision: DecisionConfig,

    #[serde(default)]
    pub doh: DohConfig,

    #[serde(default)]
    pub urlhaus: UrlhausConfig,

    #[serde(default)]
    pub sanitize: SanitizeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

/// What to do when the engine could not finish its assessment
/// (deadline expired, or no feed could be loaded at all).
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    FailClosed,
    FailOpen,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedSourceConfig {
    pub url: String,
    #[serde(default = "default_feed_weight")]
    pub weight: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScoringConfig {
    #[serde(default = "default_secure_scheme")]
    pub secure_scheme: String,
    #[serde(default)]
    pub weights: WeightConfig,
    /// Regex matched against the host.
    #[serde(default = "default_suspicious_tlds")]
    pub suspicious_tlds: String,
    #[serde(default = "default_shorteners")]
    pub shorteners: Vec<String>,
    /// Regex matched against path + query.
    #[serde(default = "default_keywords")]
    pub keywords: String,
    #[serde(default = "default_executable_extensions")]
    pub executable_extensions: Vec<String>,
    #[serde(default = "default_digit_run_length")]
    pub digit_run_length: usize,
    #[serde(default = "default_entropy_threshold")]
    pub entropy_threshold: f64,
    /// First host labels longer than this count as long.
    #[serde(default = "default_long_label_length")]
    pub long_label_length: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WeightConfig {
    #[serde(default = "default_weight_non_https")]
    pub non_https: u8,
    #[serde(default = "default_weight_ip_host")]
    pub ip_host: u8,
    #[serde(default = "default_weight_punycode")]
    pub punycode: u8,
    #[serde(default = "default_weight_shortener")]
    pub shortener: u8,
    #[serde(default = "default_weight_tld")]
    pub suspicious_tld: u8,
    #[serde(default = "default_weight_keyword")]
    pub keyword: u8,
    #[serde(default = "default_weight_port")]
    pub non_standard_port: u8,
    #[serde(default = "default_weight_executable")]
    pub executable: u8,
    // Opt-in host heuristics, disabled unless given a weight.
    #[serde(default)]
    pub digit_run: u8,
    #[serde(default)]
    pub high_entropy: u8,
    #[serde(default)]
    pub long_label: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolverConfig {
    /// Redirect-carrying parameter names, in priority order.
    #[serde(default = "default_redirect_params")]
    pub redirect_params: Vec<String>,
    #[serde(default = "default_follow_schemes")]
    pub follow_schemes: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpdateConfig {
    #[serde(default = "default_update_interval")]
    pub interval_hours: u64,
    #[serde(default = "default_concurrent_downloads")]
    pub concurrent_downloads: usize,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enable")]
    pub enable: bool,
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DecisionConfig {
    /// Overall deadline for one `decide` call, advisories included.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DohConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_doh_url")]
    pub url: String,
    #[serde(default = "default_advisory_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UrlhausConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_urlhaus_url")]
    pub url: String,
    #[serde(default)]
    pub auth_key: Option<String>,
    #[serde(default = "default_advisory_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SanitizeConfig {
    #[serde(default = "default_sanitize_enable")]
    pub enable: bool,
    #[serde(default = "default_tracking_prefixes")]
    pub tracking_prefixes: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_enable")]
    pub enable: bool,
    #[serde(default = "default_log_blocked")]
    pub log_blocked: bool,
    #[serde(default = "default_log_allowed")]
    pub log_allowed: bool,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_verdict_log_sinks")]
    pub verdict_log_sinks: Vec<String>,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_block_threshold() -> u8 {
    60
}
fn default_max_depth() -> usize {
    6
}
fn default_feed_weight() -> u8 {
    40
}
fn default_secure_scheme() -> String {
    "https".to_string()
}
fn default_suspicious_tlds() -> String {
    r"(?i)\.(zip|mov|xyz|top|gq|tk|ml|cf|work|click)$".to_string()
}
fn default_shorteners() -> Vec<String> {
    [
        "bit.ly",
        "t.co",
        "tinyurl.com",
        "goo.gl",
        "is.gd",
        "buff.ly",
        "ow.ly",
        "cutt.ly",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_keywords() -> String {
    r"(?i)(login|verify|secure|update|wallet|invoice|payment)".to_string()
}
fn default_executable_extensions() -> Vec<String> {
    ["exe", "dll", "bat", "scr", "js"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_digit_run_length() -> usize {
    5
}
fn default_entropy_threshold() -> f64 {
    0.75
}
fn default_long_label_length() -> usize {
    15
}
fn default_weight_non_https() -> u8 {
    15
}
fn default_weight_ip_host() -> u8 {
    20
}
fn default_weight_punycode() -> u8 {
    15
}
fn default_weight_shortener() -> u8 {
    15
}
fn default_weight_tld() -> u8 {
    10
}
fn default_weight_keyword() -> u8 {
    10
}
fn default_weight_port() -> u8 {
    10
}
fn default_weight_executable() -> u8 {
    20
}
fn default_redirect_params() -> Vec<String> {
    [
        "url",
        "u",
        "redirect",
        "target",
        "dest",
        "destination",
        "next",
        "continue",
        "r",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_follow_schemes() -> Vec<String> {
    ["http", "https", "ftp", "javascript", "data", "vbscript", "file"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_update_interval() -> u64 {
    24
}
fn default_concurrent_downloads() -> usize {
    4
}
fn default_fetch_timeout_ms() -> u64 {
    10_000
}
fn default_cache_enable() -> bool {
    true
}
fn default_cache_capacity() -> u64 {
    10_000
}
fn default_cache_ttl() -> u64 {
    600
}
fn default_deadline_ms() -> u64 {
    3_000
}
fn default_doh_url() -> String {
    "https://dns.quad9.net:5053/dns-query".to_string()
}
fn default_urlhaus_url() -> String {
    "https://urlhaus-api.abuse.ch/v1/url/".to_string()
}
fn default_advisory_timeout_ms() -> u64 {
    1_500
}
fn default_sanitize_enable() -> bool {
    true
}
fn default_tracking_prefixes() -> Vec<String> {
    ["utm_", "fbclid", "gclid", "_ga", "_gl", "_gid"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_log_enable() -> bool {
    true
}
fn default_log_blocked() -> bool {
    true
}
fn default_log_allowed() -> bool {
    true
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_verdict_log_sinks() -> Vec<String> {
    vec!["console".to_string()]
}
fn default_memory_capacity() -> usize {
    100
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}
fn default_feeds() -> HashMap<String, FeedSourceConfig> {
    let mut m = HashMap::new();
    m.insert(
        "openphish".to_string(),
        FeedSourceConfig {
            url: "https://raw.githubusercontent.com/openphish/public_feed/master/feed.txt"
                .to_string(),
            weight: 40,
        },
    );
    m.insert(
        "spamhaus-drop".to_string(),
        FeedSourceConfig {
            url: "https://www.spamhaus.org/drop/drop.txt".to_string(),
            weight: 40,
        },
    );
    m.insert(
        "spamhaus-edrop".to_string(),
        FeedSourceConfig {
            url: "https://www.spamhaus.org/drop/edrop.txt".to_string(),
            weight: 40,
        },
    );
    m.insert(
        "urlhaus".to_string(),
        FeedSourceConfig {
            url: "https://urlhaus.abuse.ch/downloads/text/".to_string(),
            weight: 50,
        },
    );
    m
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_threshold: default_block_threshold(),
            max_depth: default_max_depth(),
            failure_policy: FailurePolicy::default(),
            feeds: default_feeds(),
            scoring: ScoringConfig::default(),
            resolver: ResolverConfig::default(),
            updates: UpdateConfig::default(),
            cache: CacheConfig::default(),
            decision: DecisionConfig::default(),
            doh: DohConfig::default(),
            urlhaus: UrlhausConfig::default(),
            sanitize: SanitizeConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            secure_scheme: default_secure_scheme(),
            weights: WeightConfig::default(),
            suspicious_tlds: default_suspicious_tlds(),
            shorteners: default_shorteners(),
            keywords: default_keywords(),
            executable_extensions: default_executable_extensions(),
            digit_run_length: default_digit_run_length(),
            entropy_threshold: default_entropy_threshold(),
            long_label_length: default_long_label_length(),
        }
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            non_https: default_weight_non_https(),
            ip_host: default_weight_ip_host(),
            punycode: default_weight_punycode(),
            shortener: default_weight_shortener(),
            suspicious_tld: default_weight_tld(),
            keyword: default_weight_keyword(),
            non_standard_port: default_weight_port(),
            executable: default_weight_executable(),
            digit_run: 0,
            high_entropy: 0,
            long_label: 0,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            redirect_params: default_redirect_params(),
            follow_schemes: default_follow_schemes(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_update_interval(),
            concurrent_downloads: default_concurrent_downloads(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable: default_cache_enable(),
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
        }
    }
}

impl Default for DohConfig {
    fn default() -> Self {
        Self {
            enable: false,
            url: default_doh_url(),
            timeout_ms: default_advisory_timeout_ms(),
        }
    }
}

impl Default for UrlhausConfig {
    fn default() -> Self {
        Self {
            enable: false,
            url: default_urlhaus_url(),
            auth_key: None,
            timeout_ms: default_advisory_timeout_ms(),
        }
    }
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            enable: default_sanitize_enable(),
            tracking_prefixes: default_tracking_prefixes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable: default_log_enable(),
            log_blocked: default_log_blocked(),
            log_allowed: default_log_allowed(),
            format: default_log_format(),
            level: default_log_level(),
            verdict_log_sinks: default_verdict_log_sinks(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config TOML")?;
        Ok(config)
    }

    /// Feeds ordered by name so feed ordering (and reason ordering) is deterministic.
    pub fn get_feeds_sorted(&self) -> Vec<(String, FeedSourceConfig)> {
        let mut list: Vec<_> = self
            .feeds
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }
}
