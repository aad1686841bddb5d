//! Pure-function toolkit for link and domain validation.
//!
//! No state lives here. Every place in the pipeline that compares two
//! URLs for "same resource" goes through [`normalize_url`], and the only
//! domain-equality rule anywhere is [`is_domain_or_subdomain_match`]
//! (site rules may additionally supply explicit allow-list patterns).

use once_cell::sync::Lazy;
use url::Url;

use crate::dom::extract_code;
use crate::types::record::DownloadLink;
use crate::types::stub::SearchResultStub;

/// Hostnames known to serve malicious or irrelevant redirect targets.
/// Links into these are dropped regardless of any other matching rule.
pub static SPAM_DOMAINS: &[&str] = &[
    "ouo.io",
    "ouo.press",
    "adf.ly",
    "shink.me",
    "shorte.st",
    "linkvertise.com",
    "bc.vc",
    "cutt.ly",
    "za.gl",
    "exe.io",
    "fc.lc",
    "uii.io",
    "popads.net",
    "propellerads.com",
    "adsterra.com",
];

/// Visible anchor texts that mark navigation chrome, not content links.
static NAV_TEXTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "next", "prev", "previous", "first", "last", "more", "all", "home", "back", "top",
        "english", "日本語", "中文", "한국어", "terms", "terms of service", "privacy",
        "privacy policy", "dmca", "contact", "contact us", "about", "login", "log in",
        "sign up", "register", "rss", "...",
    ]
});

/// Path fragments that mark a URL as a search/listing/utility page
/// rather than a detail page.
static SEARCH_INDICATORS: &[&str] = &[
    "/search",
    "/page/",
    "?page=",
    "&page=",
    "?q=",
    "?s=",
    "/category",
    "/categories",
    "/genre",
    "/genres",
    "/tags/",
    "/tag/",
    "/actresses",
    "/star/",
    "/studio/",
    "/label/",
    "/login",
    "/register",
    "/signup",
    "/admin",
    "/api/",
    "/static/",
    "/assets/",
    "/rss",
    "/feed",
    "/sitemap",
    ".css",
    ".js",
    ".ico",
    ".png",
    ".jpg",
    ".svg",
];

/// Lower-cased hostname of a URL, if it parses.
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Canonical form used for every "same resource" comparison:
/// scheme + host (+ non-default port) + path, lower-cased, with the
/// trailing slash stripped. Query and fragment are dropped.
pub fn normalize_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return url.trim().trim_end_matches('/').to_lowercase();
    };
    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    let port = match parsed.port() {
        Some(p) => format!(":{p}"),
        None => String::new(),
    };
    let path = parsed.path().trim_end_matches('/').to_lowercase();
    format!("{}://{host}{port}{path}", parsed.scheme())
}

/// The single domain-equality rule: exact match, or `candidate` is a
/// dot-separated subdomain of `expected`.
pub fn is_domain_or_subdomain_match(candidate: &str, expected: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let expected = expected.to_lowercase();
    candidate == expected || candidate.ends_with(&format!(".{expected}"))
}

/// Whether a hostname is on the spam blacklist (exact or subdomain).
pub fn is_spam_domain(domain: &str) -> bool {
    SPAM_DOMAINS
        .iter()
        .any(|spam| is_domain_or_subdomain_match(domain, spam))
}

/// Whether a URL looks like a search/listing/pagination/static/admin
/// path. Used to reject same-domain links that are not detail pages.
pub fn contains_search_indicators(url: &str) -> bool {
    let lower = url.to_lowercase();
    SEARCH_INDICATORS.iter().any(|ind| lower.contains(ind))
}

/// Whether visible anchor text is navigation chrome (pager, language
/// switcher, legal boilerplate).
pub fn is_navigation_text(text: &str) -> bool {
    let trimmed = text.trim().to_lowercase();
    if trimmed.is_empty() {
        return false;
    }
    NAV_TEXTS.iter().any(|nav| trimmed == *nav)
        || (trimmed.len() <= 3 && trimmed.chars().all(|c| c.is_ascii_digit()))
}

/// Catalog code from arbitrary text.
pub fn extract_code_from_text(text: &str) -> Option<String> {
    extract_code(text)
}

/// Catalog code from a result title.
pub fn extract_code_from_title(title: &str) -> Option<String> {
    extract_code(title)
}

/// Catalog code from a URL path, checked segment by segment from the
/// most specific end.
pub fn extract_code_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    segments.iter().rev().find_map(|seg| {
        // URL segments often use underscores or dots around the code
        let cleaned = seg.replace(['_', '.'], "-");
        extract_code(&cleaned)
    })
}

/// Jaccard-like similarity over whitespace-tokenized, alnum-normalized
/// words; tokens of length <= 2 are ignored. Returns 0.0..=1.0.
pub fn text_similarity(a: &str, b: &str) -> f32 {
    fn tokens(s: &str) -> std::collections::HashSet<String> {
        s.to_lowercase()
            .split_whitespace()
            .map(|w| {
                w.chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
            })
            .filter(|w| w.len() > 2)
            .collect()
    }

    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f32;
    let union = ta.union(&tb).count() as f32;
    intersection / union
}

/// Whether a URL plausibly points at a detail page on the expected
/// domain: same domain (or subdomain), no search indicators, and a
/// non-root path.
pub fn looks_like_detail_url(url: &str, expected_domain: &str) -> bool {
    let Some(domain) = extract_domain(url) else {
        return false;
    };
    if !is_domain_or_subdomain_match(&domain, expected_domain) {
        return false;
    }
    if contains_search_indicators(url) {
        return false;
    }
    Url::parse(url)
        .ok()
        .map(|u| u.path().trim_matches('/').len() > 1)
        .unwrap_or(false)
}

/// Relevance score for a candidate link against the search result that
/// produced it. Weights carried over from production tuning:
/// exact code match +40, substring code match +25, title similarity
/// scaled by 15, detail-looking URL +10, high-confidence site rule +15.
/// Clamped to [0, 100].
pub fn candidate_score(
    url: &str,
    title: &str,
    code: Option<&str>,
    high_confidence: bool,
    stub: &SearchResultStub,
) -> u8 {
    let keyword = stub.keyword.as_deref().unwrap_or(&stub.title);
    let keyword_code = extract_code(keyword).or_else(|| extract_code(&stub.title));

    let mut score = 0u32;

    if let (Some(code), Some(expected)) = (code, keyword_code.as_deref()) {
        if code.eq_ignore_ascii_case(expected) {
            score += 40;
        } else {
            let a = code.to_uppercase().replace('-', "");
            let b = expected.to_uppercase().replace('-', "");
            if a.contains(&b) || b.contains(&a) {
                score += 25;
            }
        }
    }

    score += (text_similarity(title, keyword) * 15.0).round() as u32;

    if let Some(expected_domain) = extract_domain(&stub.url) {
        if looks_like_detail_url(url, &expected_domain) {
            score += 10;
        }
    }

    if high_confidence {
        score += 15;
    }

    score.min(100) as u8
}

/// Drop download links that leak off-domain, hit the spam blacklist, or
/// carry navigation text. `domain_allowed` is the site rule's explicit
/// cross-domain allow-list check.
pub fn filter_download_links(
    links: Vec<DownloadLink>,
    expected_domain: &str,
    domain_allowed: impl Fn(&str) -> bool,
) -> Vec<DownloadLink> {
    links
        .into_iter()
        .filter(|link| {
            let Some(domain) = extract_domain(&link.url) else {
                tracing::debug!(url = %link.url, "download link dropped: unparseable URL");
                return false;
            };
            if is_spam_domain(&domain) {
                tracing::debug!(url = %link.url, %domain, "download link dropped: spam domain");
                return false;
            }
            if !is_domain_or_subdomain_match(&domain, expected_domain) && !domain_allowed(&domain) {
                tracing::debug!(
                    url = %link.url,
                    %domain,
                    expected = %expected_domain,
                    "download link dropped: off-domain"
                );
                return false;
            }
            if is_navigation_text(&link.name) {
                tracing::debug!(url = %link.url, name = %link.name, "download link dropped: navigation text");
                return false;
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_equivalence() {
        assert_eq!(
            normalize_url("https://x.com/a/"),
            normalize_url("https://X.COM/a")
        );
        assert_eq!(normalize_url("https://x.com/a?page=2"), "https://x.com/a");
        assert_eq!(normalize_url("https://x.com/"), "https://x.com");
    }

    #[test]
    fn test_domain_or_subdomain() {
        assert!(is_domain_or_subdomain_match("javbus.com", "javbus.com"));
        assert!(is_domain_or_subdomain_match("www.javbus.com", "javbus.com"));
        assert!(!is_domain_or_subdomain_match("notjavbus.com", "javbus.com"));
        assert!(!is_domain_or_subdomain_match("javbus.com.evil.net", "javbus.com"));
    }

    #[test]
    fn test_search_indicators() {
        assert!(contains_search_indicators("https://javbus.com/search/IPX-156"));
        assert!(contains_search_indicators("https://x.com/list?page=3"));
        assert!(contains_search_indicators("https://x.com/static/app.js"));
        assert!(!contains_search_indicators("https://javbus.com/IPX-156"));
    }

    #[test]
    fn test_code_from_url() {
        assert_eq!(
            extract_code_from_url("https://javbus.com/IPX-156").as_deref(),
            Some("IPX-156")
        );
        assert_eq!(
            extract_code_from_url("https://x.com/jav/stc872_uncensored/").as_deref(),
            Some("STC-872")
        );
        assert_eq!(extract_code_from_url("https://x.com/about"), None);
    }

    #[test]
    fn test_text_similarity() {
        assert!(text_similarity("IPX-156 Full Title", "IPX-156 Full Title") > 0.99);
        assert_eq!(text_similarity("", "whatever"), 0.0);
        let partial = text_similarity("IPX-156 sample movie", "IPX-156 sample");
        assert!(partial > 0.3 && partial < 1.0);
    }

    #[test]
    fn test_spam_domain_blacklist() {
        assert!(is_spam_domain("ouo.io"));
        assert!(is_spam_domain("sub.adf.ly"));
        assert!(!is_spam_domain("javbus.com"));
    }

    #[test]
    fn test_navigation_text() {
        assert!(is_navigation_text("Next"));
        assert!(is_navigation_text("  privacy policy "));
        assert!(is_navigation_text("2")); // bare pager number
        assert!(!is_navigation_text("IPX-156 720p download"));
    }

    #[test]
    fn test_exact_code_beats_substring() {
        let stub = SearchResultStub::new(
            "1",
            "IPX-156",
            "https://javbus.com/search/IPX-156",
            "javbus",
        )
        .with_keyword("IPX-156");

        let exact = candidate_score(
            "https://javbus.com/IPX-156",
            "IPX-156",
            Some("IPX-156"),
            false,
            &stub,
        );
        let substring = candidate_score(
            "https://javbus.com/IPX-1567",
            "IPX-1567",
            Some("IPX-1567"),
            false,
            &stub,
        );
        assert!(exact >= substring, "exact {exact} < substring {substring}");
        assert!(exact >= 40);
    }

    #[test]
    fn test_score_clamped_to_100() {
        let stub = SearchResultStub::new(
            "1",
            "IPX-156 Full Title Match",
            "https://javbus.com/search/IPX-156",
            "javbus",
        )
        .with_keyword("IPX-156 Full Title Match");

        let score = candidate_score(
            "https://javbus.com/IPX-156",
            "IPX-156 Full Title Match",
            Some("IPX-156"),
            true,
            &stub,
        );
        assert!(score <= 100);
        assert!(score >= 80);
    }

    #[test]
    fn test_filter_download_links() {
        let links = vec![
            DownloadLink::new("IPX-156 720p", "https://javbus.com/files/ipx156.zip"),
            DownloadLink::new("mirror", "https://ouo.io/abc123"),
            DownloadLink::new("other site", "https://unrelated.net/file"),
            DownloadLink::new("Next", "https://javbus.com/page/2"),
        ];

        let kept = filter_download_links(links, "javbus.com", |_| false);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "IPX-156 720p");
    }

    #[test]
    fn test_filter_respects_allow_list() {
        let links = vec![DownloadLink::new(
            "mirror",
            "https://cdn.partner.net/file.zip",
        )];
        let kept = filter_download_links(links, "javbus.com", |d| d.ends_with("partner.net"));
        assert_eq!(kept.len(), 1);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn normalize_url_is_idempotent(url in "https?://[a-z]{1,10}\\.[a-z]{2,4}(/[a-zA-Z0-9_-]{0,12}){0,4}(\\?[a-z]{1,6}=[a-z0-9]{1,6})?") {
            let once = normalize_url(&url);
            prop_assert_eq!(normalize_url(&once), once);
        }

        #[test]
        fn candidate_score_stays_in_range(
            code in proptest::option::of("[A-Z]{2,6}-[0-9]{3,6}"),
            title in ".{0,40}",
            high_confidence: bool,
        ) {
            let stub = crate::types::SearchResultStub::new(
                "1",
                &title,
                "https://javbus.com/search/x",
                "javbus",
            );
            let score = candidate_score(
                "https://javbus.com/IPX-156",
                &title,
                code.as_deref(),
                high_confidence,
                &stub,
            );
            prop_assert!(score <= 100);
        }

        #[test]
        fn extracted_codes_are_normalized(
            letters in "[a-zA-Z]{2,6}",
            digits in "[0-9]{3,6}",
            dash: bool,
        ) {
            let raw = if dash {
                format!("{letters}-{digits}")
            } else {
                format!("{letters}{digits}")
            };
            let code = extract_code_from_text(&format!("watch {raw} online")).unwrap();
            prop_assert_eq!(code, format!("{}-{digits}", letters.to_uppercase()));
        }
    }
}
