use url::{Host, Url};

/// A raw destination string together with its parsed form.
///
/// Strings that are not absolute URLs, and absolute URLs without a host
/// (`javascript:`, `data:`, `mailto:`), have no parsed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCandidate {
    raw: Box<str>,
    url: Option<Url>,
}

impl UrlCandidate {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let url = Url::parse(raw)
            .ok()
            .filter(|u| u.host_str().is_some_and(|h| !h.is_empty()));
        Self {
            raw: raw.into(),
            url,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn is_parsed(&self) -> bool {
        self.url.is_some()
    }

    /// Lowercased host as serialized by the URL parser (IPv6 in brackets),
    /// without the trailing dot of an absolute name.
    pub fn host(&self) -> Option<&str> {
        self.url
            .as_ref()
            .and_then(Url::host_str)
            .map(|h| h.trim_end_matches('.'))
            .filter(|h| !h.is_empty())
    }

    pub fn is_ip_host(&self) -> bool {
        matches!(
            self.url.as_ref().and_then(Url::host),
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok() {
        let c = UrlCandidate::parse("  https://Example.COM/a?b=c#frag ");
        assert!(c.is_parsed());
        assert_eq!(c.raw(), "https://Example.COM/a?b=c#frag");
        assert_eq!(c.host(), Some("example.com"));
        assert!(!c.is_ip_host());
    }

    #[test]
    fn test_parse_failures() {
        assert!(!UrlCandidate::parse("not a url").is_parsed());
        assert!(!UrlCandidate::parse("").is_parsed());
        assert!(!UrlCandidate::parse("javascript:alert(1)").is_parsed());
        assert!(!UrlCandidate::parse("/relative/path").is_parsed());
    }

    #[test]
    fn test_ip_hosts() {
        assert!(UrlCandidate::parse("http://198.51.100.7/").is_ip_host());
        assert!(UrlCandidate::parse("http://[2001:db8::1]:8080/").is_ip_host());
    }

    #[test]
    fn test_absolute_name_loses_trailing_dot() {
        let c = UrlCandidate::parse("https://Malicious.Test./pay");
        assert!(c.is_parsed());
        assert_eq!(c.host(), Some("malicious.test"));
    }

    #[test]
    fn test_idn_is_punycoded() {
        let c = UrlCandidate::parse("https://bücher.example/");
        assert_eq!(c.host(), Some("xn--bcher-kva.example"));
    }
}
