use super::types::Extraction;
use crate::config::ResolverConfig;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use url::Url;

/// Shortest string worth trying as a base64 payload (`http://a.b` encodes to 16).
const MIN_PAYLOAD_LEN: usize = 12;

/// Extra percent-decoding passes tried on a parameter value beyond the one
/// query parsing already applied.
const MAX_DECODE_ROUNDS: usize = 3;

/// Pulls the next hop out of a URL: a redirect parameter first, then an encoded payload.
#[derive(Debug, Clone)]
pub struct Extractor {
    redirect_params: Vec<String>,
    follow_schemes: Vec<String>,
}

impl Extractor {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            redirect_params: config.redirect_params.clone(),
            follow_schemes: config
                .follow_schemes
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn extract(&self, url: &Url) -> Option<(String, Extraction)> {
        self.redirect_param(url)
            .or_else(|| self.encoded_payload(url))
    }

    fn redirect_param(&self, url: &Url) -> Option<(String, Extraction)> {
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        for name in &self.redirect_params {
            let found = pairs
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(name))
                .find_map(|(_, v)| self.redirect_target(url, v));
            if let Some(target) = found {
                return Some((target, Extraction::RedirectParam(name.as_str().into())));
            }
        }
        None
    }

    fn encoded_payload(&self, url: &Url) -> Option<(String, Extraction)> {
        // Form decoding turns '+' into ' '; base64 never contains spaces.
        let last_value = url
            .query_pairs()
            .last()
            .map(|(_, v)| v.replace(' ', "+"));
        let last_segment = url
            .path_segments()
            .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
            .map(str::to_string);

        [last_value, last_segment]
            .into_iter()
            .flatten()
            .filter_map(|s| decode_base64(&s))
            .find(|decoded| self.has_known_scheme(decoded))
            .map(|decoded| (decoded, Extraction::EncodedPayload))
    }

    /// Peels repeated percent-encoding (`https%253A%252F...`) until the value
    /// reads as a target or stops changing.
    fn redirect_target(&self, base: &Url, value: &str) -> Option<String> {
        let mut value = value.trim().to_string();
        for _ in 0..=MAX_DECODE_ROUNDS {
            if let Some(target) = self.as_target(base, &value) {
                return Some(target);
            }
            let decoded = urlencoding::decode(&value).ok()?.trim().to_string();
            if decoded == value {
                return None;
            }
            value = decoded;
        }
        None
    }

    /// A parameter value counts as a target when it is absolute (known scheme)
    /// or scheme-relative (`//host/...`). Same-site relative paths are not hops.
    fn as_target(&self, base: &Url, value: &str) -> Option<String> {
        if let Some(rest) = value.strip_prefix("//") {
            if rest.is_empty() {
                return None;
            }
            return Some(format!("{}://{}", base.scheme(), rest));
        }
        self.has_known_scheme(value).then(|| value.to_string())
    }

    fn has_known_scheme(&self, value: &str) -> bool {
        match value.split_once(':') {
            Some((scheme, _)) => self
                .follow_schemes
                .iter()
                .any(|s| s.eq_ignore_ascii_case(scheme.trim())),
            None => false,
        }
    }
}

fn decode_base64(s: &str) -> Option<String> {
    let s = s.trim();
    if s.len() < MIN_PAYLOAD_LEN
        || !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'-' | b'_'))
    {
        return None;
    }

    let bytes = [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(s).ok())?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::new(&ResolverConfig::default())
    }

    fn extract(raw: &str) -> Option<(String, Extraction)> {
        extractor().extract(&Url::parse(raw).unwrap())
    }

    #[test]
    fn test_redirect_param_decoded() {
        let (target, how) =
            extract("https://bit.ly/abc?redirect=https%3A%2F%2Fmalicious.test%2Fpay").unwrap();
        assert_eq!(target, "https://malicious.test/pay");
        assert_eq!(how, Extraction::RedirectParam("redirect".into()));
    }

    #[test]
    fn test_redirect_param_multiply_encoded() {
        let (target, _) =
            extract("https://a.test/?url=https%253A%252F%252Fmalicious.test%252F").unwrap();
        assert_eq!(target, "https://malicious.test/");

        let (target, _) =
            extract("https://a.test/?next=https%25253A%25252F%25252Fb.test%25252F").unwrap();
        assert_eq!(target, "https://b.test/");
    }

    #[test]
    fn test_decoding_is_bounded() {
        // Five layers of encoding on top of the one query parsing removes.
        let mut value = "https://b.test/".to_string();
        for _ in 0..5 {
            value = urlencoding::encode(&value).into_owned();
        }
        let raw = format!("https://a.test/?url={}", urlencoding::encode(&value));
        assert_eq!(extract(&raw), None);
        assert_eq!(extract("https://a.test/?url=100%25"), None);
    }

    #[test]
    fn test_redirect_param_priority() {
        let (target, how) =
            extract("https://a.test/?next=https://second.test/&url=https://first.test/").unwrap();
        assert_eq!(target, "https://first.test/");
        assert_eq!(how.to_string(), "redirect-param(url)");
    }

    #[test]
    fn test_relative_values_are_not_hops() {
        assert_eq!(extract("https://a.test/login?next=/dashboard"), None);
        assert_eq!(extract("https://a.test/?continue=home"), None);
    }

    #[test]
    fn test_scheme_relative_value() {
        let (target, _) = extract("https://a.test/?dest=//evil.test/x").unwrap();
        assert_eq!(target, "https://evil.test/x");
    }

    #[test]
    fn test_dangerous_scheme_followed() {
        let (target, _) = extract("https://a.test/?u=javascript:alert(1)").unwrap();
        assert_eq!(target, "javascript:alert(1)");
    }

    #[test]
    fn test_base64_query_payload() {
        // "https://evil.test/x"
        let (target, how) = extract("https://a.test/go?id=aHR0cHM6Ly9ldmlsLnRlc3QveA==").unwrap();
        assert_eq!(target, "https://evil.test/x");
        assert_eq!(how, Extraction::EncodedPayload);
    }

    #[test]
    fn test_base64_path_payload_unpadded() {
        let (target, _) = extract("https://a.test/r/aHR0cHM6Ly9ldmlsLnRlc3QveA").unwrap();
        assert_eq!(target, "https://evil.test/x");
    }

    #[test]
    fn test_base64_non_url_ignored() {
        // "hello world, not a link"
        assert_eq!(
            extract("https://a.test/?q=aGVsbG8gd29ybGQsIG5vdCBhIGxpbms="),
            None
        );
        assert_eq!(extract("https://a.test/articles/2024"), None);
    }
}
