use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;

/// Feature columns produced by [`extract_features`], in extraction order.
pub const FEATURE_NAMES: [&str; 7] = [
    "url_length",
    "num_dots",
    "num_hyphens",
    "num_digits",
    "https",
    "num_subdomains",
    "keywords_count",
];

/// Lure words commonly found in phishing URLs. Each contributes at most once.
pub const SUSPICIOUS_KEYWORDS: [&str; 8] = [
    "login", "secure", "account", "update", "bank", "verify", "free", "paypal",
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub url_length: u64,
    pub num_dots: u64,
    pub num_hyphens: u64,
    /// ASCII `0`-`9` only; digits from other scripts are not counted.
    pub num_digits: u64,
    pub https: u8,
    /// Dots in the raw network location minus one. Does not know about
    /// multi-label public suffixes, so `example.co.uk` counts as one.
    /// The host is never decoded or normalized: `0x7f.1` counts zero and
    /// `paypal%2Ecom.evil.ru` counts one.
    pub num_subdomains: u64,
    pub keywords_count: u64,
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        let v = match name {
            "url_length" => self.url_length as f64,
            "num_dots" => self.num_dots as f64,
            "num_hyphens" => self.num_hyphens as f64,
            "num_digits" => self.num_digits as f64,
            "https" => self.https as f64,
            "num_subdomains" => self.num_subdomains as f64,
            "keywords_count" => self.keywords_count as f64,
            _ => return None,
        };
        Some(v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES
            .iter()
            .filter_map(move |name| self.get(name).map(|v| (*name, v)))
    }
}

/// Maps a raw URL string to its lexical features. Never fails: input with
/// no recognizable prefix has no scheme and no network location.
pub fn extract_features(url: &str) -> FeatureVector {
    let prefix = split_prefix(url);

    let https = (prefix.scheme.as_deref() == Some("https")) as u8;

    let netloc_dots = prefix.netloc.map(|n| n.matches('.').count()).unwrap_or(0);
    let num_subdomains = netloc_dots.saturating_sub(1) as u64;

    let lowered = url.to_lowercase();
    let keywords_count = SUSPICIOUS_KEYWORDS
        .iter()
        .filter(|kw| lowered.contains(*kw))
        .count() as u64;

    FeatureVector {
        url_length: url.chars().count() as u64,
        num_dots: url.matches('.').count() as u64,
        num_hyphens: url.matches('-').count() as u64,
        num_digits: url.chars().filter(|c| c.is_ascii_digit()).count() as u64,
        https,
        num_subdomains,
        keywords_count,
    }
}

// `scheme:` then `//authority`, each optional. The authority runs to the
// first `/`, `?` or `#` and is taken verbatim.
static URL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([A-Za-z][A-Za-z0-9+.\-]*):)?(?://([^/?#]*))?")
        .expect("URL prefix pattern is valid")
});

#[derive(Debug, Default, PartialEq)]
struct UrlPrefix {
    scheme: Option<String>,
    netloc: Option<String>,
}

/// Splits off scheme and network location without resolving or decoding
/// anything. Leading control characters and spaces are dropped, as are
/// tabs and line breaks anywhere. A bracketed host that is not an IPv6
/// literal (or `v<hex>.` future form) voids the whole split.
fn split_prefix(url: &str) -> UrlPrefix {
    let cleaned: String = url
        .trim_start_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
        .collect();

    let Some(caps) = URL_PREFIX.captures(&cleaned) else {
        return UrlPrefix::default();
    };
    let netloc = caps.get(2).map(|m| m.as_str());
    if netloc.is_some_and(|n| !valid_brackets(n)) {
        return UrlPrefix::default();
    }

    UrlPrefix {
        scheme: caps.get(1).map(|m| m.as_str().to_ascii_lowercase()),
        netloc: netloc.map(str::to_string),
    }
}

fn valid_brackets(netloc: &str) -> bool {
    match (netloc.find('['), netloc.contains(']')) {
        (None, false) => true,
        (Some(open), true) => {
            let inner = &netloc[open + 1..];
            let host = inner.split(']').next().unwrap_or(inner);
            valid_bracketed_host(host)
        }
        _ => false,
    }
}

fn valid_bracketed_host(host: &str) -> bool {
    if let Some(future) = host.strip_prefix('v') {
        return match future.split_once('.') {
            Some((version, rest)) => {
                !version.is_empty()
                    && version.chars().all(|c| c.is_ascii_hexdigit())
                    && !rest.is_empty()
            }
            None => false,
        };
    }

    let addr = match host.split_once('%') {
        Some((addr, zone)) if !zone.is_empty() => addr,
        Some(_) => return false,
        None => host,
    };
    // an IPv4 address in brackets is rejected too
    addr.parse::<Ipv6Addr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_is_all_zero() {
        assert_eq!(extract_features(""), FeatureVector::default());
    }

    #[test]
    fn test_secure_login_url() {
        let f = extract_features("https://secure-login.example.co.uk");
        assert_eq!(f.https, 1);
        assert_eq!(f.num_hyphens, 1);
        assert_eq!(f.num_dots, 3);
        assert_eq!(f.num_subdomains, 2);
        assert_eq!(f.keywords_count, 2);
        assert_eq!(f.url_length, 34);
    }

    #[test]
    fn test_unparsable_url_degrades() {
        let f = extract_features("not a url at all.com/login-now");
        assert_eq!(f.https, 0);
        assert_eq!(f.num_subdomains, 0);
        assert_eq!(f.num_dots, 1);
        assert_eq!(f.num_hyphens, 1);
        assert_eq!(f.keywords_count, 1);
    }

    #[test]
    fn test_http_scheme_is_not_https() {
        let f = extract_features("http://paypal.com.verify-account.ru/free");
        assert_eq!(f.https, 0);
        assert_eq!(f.num_subdomains, 2);
        assert_eq!(f.keywords_count, 4);
    }

    #[test]
    fn test_repeated_keyword_counts_once() {
        let f = extract_features("https://LOGIN.example.com/login/Login");
        assert_eq!(f.keywords_count, 1);
    }

    #[test]
    fn test_digits_and_userinfo() {
        let f = extract_features("https://first.last@192.168.0.1:8443/a1");
        assert_eq!(f.num_digits, 13);
        // 1 dot in userinfo + 3 in the address
        assert_eq!(f.num_subdomains, 3);
    }

    #[test]
    fn test_obfuscated_hosts_are_counted_raw() {
        // (url, https, num_subdomains)
        let cases = [
            ("https://0x7f.1/login", 1, 0),
            ("https://2130706433/verify", 1, 0),
            ("https://paypal%2Ecom.evil.ru/", 1, 1),
            ("https://exa mple.com", 1, 0),
            ("https://999.999.999.999/login", 1, 2),
            ("https://", 1, 0),
            ("https://host:99999/a.b", 1, 0),
            ("https://ｐａｙｐａｌ．com.evil.ru", 1, 1),
        ];
        for (url, https, subs) in cases {
            let f = extract_features(url);
            assert_eq!(f.https, https, "https for {}", url);
            assert_eq!(f.num_subdomains, subs, "num_subdomains for {}", url);
        }
    }

    #[test]
    fn test_prefix_split() {
        let cases = [
            ("HTTPS://Login.Bank.example.com", Some("https"), Some("Login.Bank.example.com")),
            ("  https://a.b.c.d", Some("https"), Some("a.b.c.d")),
            ("ht\ttps://a.b.c", Some("https"), Some("a.b.c")),
            ("//cdn.a.b.c/x", None, Some("cdn.a.b.c")),
            ("https://[::1]:8443/a.b", Some("https"), Some("[::1]:8443")),
            ("https://[v1.x]/", Some("https"), Some("[v1.x]")),
            ("a b://x.y.z", None, None),
            ("localhost:8080/a.b", Some("localhost"), None),
        ];
        for (url, scheme, netloc) in cases {
            let prefix = split_prefix(url);
            assert_eq!(prefix.scheme.as_deref(), scheme, "scheme for {:?}", url);
            assert_eq!(prefix.netloc.as_deref(), netloc, "netloc for {:?}", url);
        }
    }

    #[test]
    fn test_bad_brackets_void_the_split() {
        for url in ["https://[1.2.3.4]/x", "https://[::1/x.y.z", "https://a]b.c.d"] {
            assert_eq!(split_prefix(url), UrlPrefix::default(), "{}", url);
            let f = extract_features(url);
            assert_eq!(f.https, 0, "{}", url);
            assert_eq!(f.num_subdomains, 0, "{}", url);
        }
    }

    #[test]
    fn test_only_ascii_digits_count() {
        assert_eq!(extract_features("https://a.b/١٢٣").num_digits, 0);
        assert_eq!(extract_features("https://a.b/123").num_digits, 3);
    }

    #[test]
    fn test_iter_follows_feature_order() {
        let f = extract_features("https://a.b.c");
        let names: Vec<_> = f.iter().map(|(n, _)| n).collect();
        assert_eq!(names, FEATURE_NAMES.to_vec());
        assert_eq!(f.get("https"), Some(1.0));
        assert_eq!(f.get("domain_age"), None);
    }
}
