use crate::config::SanitizeConfig;
use url::Url;

/// Strips tracking query parameters from a destination.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    enabled: bool,
    prefixes: Vec<String>,
}

impl Sanitizer {
    pub fn new(config: &SanitizeConfig) -> Self {
        Self {
            enabled: config.enable,
            prefixes: config
                .tracking_prefixes
                .iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
        }
    }

    fn is_tracking(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Returns the URL with tracking parameters removed. Other parameters keep their order.
    pub fn clean(&self, url: &Url) -> Url {
        let mut out = url.clone();
        if !self.enabled || url.query().is_none() {
            return out;
        }

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !self.is_tracking(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.len() == url.query_pairs().count() {
            return out;
        }
        if kept.is_empty() {
            out.set_query(None);
        } else {
            out.query_pairs_mut().clear().extend_pairs(kept);
        }
        out
    }
}
