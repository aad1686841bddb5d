//! Search-page link extraction.
//!
//! Turns a search-result page's HTML into a ranked list of detail-link
//! candidates. Site rules are tried in priority order; the first selector
//! that yields candidates wins, and a fully generic anchor scan backs
//! everything. This module never hard-fails: an unrecognized page simply
//! produces an empty list.

use std::collections::HashMap;

use tracing::debug;
use url::Url;

use crate::dom::{Document, Element};
use crate::rules::{DetailLinkRule, RuleRegistry, SiteId};
use crate::types::config::ExtractionConfig;
use crate::types::stub::{LinkCandidate, SearchResultStub};
use crate::validate::{
    candidate_score, contains_search_indicators, extract_code_from_text, extract_code_from_url,
    extract_domain, is_domain_or_subdomain_match, is_spam_domain, normalize_url,
};

/// Context for one search-page extraction.
pub struct SearchPageContext<'a> {
    pub site: SiteId,
    pub base_url: &'a str,
    pub stub: &'a SearchResultStub,
}

/// Extract ranked detail-link candidates from a search page.
///
/// Sorted descending by score, deduplicated by normalized URL.
pub fn extract_detail_links(
    html: &str,
    registry: &RuleRegistry,
    config: &ExtractionConfig,
    ctx: &SearchPageContext<'_>,
) -> Vec<LinkCandidate> {
    let doc = Document::parse(html);
    let rules = registry.search_page_rules(ctx.site);

    // The anchor-scan cap guards the generic rules only; a site's own
    // selectors are already narrow enough to scan in full.
    let capped = ctx.site == SiteId::Generic;

    let mut candidates = Vec::new();
    for rule in &rules.detail_link_rules {
        candidates = apply_rule(&doc, rule, config, ctx, capped);
        if !candidates.is_empty() {
            debug!(
                site = %ctx.site,
                rule = %rule.name,
                count = candidates.len(),
                "detail-link rule matched"
            );
            break;
        }
    }

    // Fall through to the fully generic anchor scan when the site's own
    // rules found nothing.
    if candidates.is_empty() && ctx.site != SiteId::Generic {
        let generic = registry.search_page_rules(SiteId::Generic);
        for rule in &generic.detail_link_rules {
            candidates = apply_rule(&doc, rule, config, ctx, true);
            if !candidates.is_empty() {
                debug!(site = %ctx.site, count = candidates.len(), "generic fallback matched");
                break;
            }
        }
    }

    // Generic-rule candidates are noisy; discard anything under the
    // configured score floor.
    if ctx.site == SiteId::Generic
        || candidates
            .iter()
            .all(|c| c.extracted_from.starts_with("generic"))
    {
        candidates.retain(|c| c.score >= config.min_candidate_score);
    }

    dedupe_and_rank(candidates)
}

fn apply_rule(
    doc: &Document,
    rule: &DetailLinkRule,
    config: &ExtractionConfig,
    ctx: &SearchPageContext<'_>,
    capped: bool,
) -> Vec<LinkCandidate> {
    let elements = doc.select(&rule.selector);
    if elements.is_empty() {
        return Vec::new();
    }

    let require_code = rule.require_code;
    let mut out = Vec::new();
    let mut relaxed: Vec<LinkCandidate> = Vec::new();
    let mut scanned = 0usize;

    for element in elements {
        if capped && scanned >= config.max_generic_anchors {
            debug!(
                cap = config.max_generic_anchors,
                "anchor scan cap reached, stopping"
            );
            break;
        }

        let anchors = anchors_of(&element);
        for anchor in anchors {
            scanned += 1;
            if capped && scanned > config.max_generic_anchors {
                break;
            }

            let Some(candidate) = candidate_from_anchor(&element, &anchor, rule, ctx) else {
                continue;
            };

            if require_code && candidate.code.is_none() {
                // Kept aside: the code requirement is relaxed only when
                // the whole page produced nothing code-bearing.
                relaxed.push(candidate);
                continue;
            }
            out.push(candidate);
        }
    }

    if out.is_empty() && require_code {
        return relaxed;
    }
    out
}

/// An element is either an anchor itself or a container of anchors.
fn anchors_of<'a>(element: &Element<'a>) -> Vec<Element<'a>> {
    if element.tag() == "a" {
        vec![*element]
    } else {
        element.select("a")
    }
}

fn candidate_from_anchor(
    container: &Element<'_>,
    anchor: &Element<'_>,
    rule: &DetailLinkRule,
    ctx: &SearchPageContext<'_>,
) -> Option<LinkCandidate> {
    let href = anchor.attr("href")?.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let base = Url::parse(ctx.base_url).ok()?;
    let resolved = base.join(href).ok()?.to_string();

    let domain = extract_domain(&resolved)?;
    let base_domain = extract_domain(ctx.base_url)?;
    let same_domain = is_domain_or_subdomain_match(&domain, &base_domain);

    if is_spam_domain(&domain) {
        debug!(url = %resolved, "candidate dropped: spam domain");
        return None;
    }
    if same_domain && contains_search_indicators(&resolved) {
        return None;
    }
    if !same_domain && !rule.domain_allowed(&domain) {
        debug!(url = %resolved, "candidate dropped: cross-domain");
        return None;
    }
    // The search page itself is never a detail candidate.
    if normalize_url(&resolved) == normalize_url(ctx.base_url) {
        return None;
    }
    if !rule.link_qualifies(&resolved, &domain) {
        return None;
    }

    let title = candidate_title(container, anchor, rule);
    let code = extract_code_from_text(&title).or_else(|| extract_code_from_url(&resolved));

    let score = candidate_score(
        &resolved,
        &title,
        code.as_deref(),
        rule.high_confidence,
        ctx.stub,
    );

    let mut candidate = LinkCandidate::new(resolved, title)
        .with_score(score)
        .with_provenance(rule.name.clone());
    candidate.code = code;
    Some(candidate)
}

/// Title priority: configured title selector, configured attribute,
/// anchor's own derived title hint, then the anchor text.
fn candidate_title(container: &Element<'_>, anchor: &Element<'_>, rule: &DetailLinkRule) -> String {
    if let Some(selector) = &rule.title_selector {
        if let Some(el) = container.select_first(selector) {
            let text = el.text();
            if !text.is_empty() {
                return text;
            }
        }
    }
    if let Some(attr) = &rule.title_attr {
        if let Some(value) = anchor.attr(attr) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    if let Some(hint) = anchor.title_hint() {
        return hint;
    }
    anchor.text()
}

/// Deduplicate by normalized URL (keeping the best score) and sort
/// descending by score.
fn dedupe_and_rank(candidates: Vec<LinkCandidate>) -> Vec<LinkCandidate> {
    let mut best: HashMap<String, LinkCandidate> = HashMap::new();
    for candidate in candidates {
        let key = normalize_url(&candidate.url);
        match best.get(&key) {
            Some(existing) if existing.score >= candidate.score => {}
            _ => {
                best.insert(key, candidate);
            }
        }
    }
    let mut ranked: Vec<LinkCandidate> = best.into_values().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.url.cmp(&b.url)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleRegistry;

    fn ctx<'a>(stub: &'a SearchResultStub, site: SiteId) -> SearchPageContext<'a> {
        SearchPageContext {
            site,
            base_url: &stub.url,
            stub,
        }
    }

    fn stub() -> SearchResultStub {
        SearchResultStub::new(
            "1",
            "IPX-156",
            "https://javbus.com/search/IPX-156",
            "javbus",
        )
        .with_keyword("IPX-156")
    }

    #[test]
    fn test_javbus_search_page_resolution() {
        let html = r#"
            <div id="waterfall">
                <a class="movie-box" href="/IPX-156">
                    <img src="/cover.jpg" title="IPX-156 Full Title">
                </a>
                <a class="movie-box" href="/search/IPX-156?page=2">pager</a>
            </div>
        "#;
        let registry = RuleRegistry::new();
        let config = ExtractionConfig::default();
        let s = stub();

        let candidates =
            extract_detail_links(html, &registry, &config, &ctx(&s, SiteId::Javbus));

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://javbus.com/IPX-156");
        assert_eq!(candidates[0].code.as_deref(), Some("IPX-156"));
        assert!(candidates[0].score >= 40);
        assert_eq!(candidates[0].extracted_from, "javbus-movie-box");
    }

    #[test]
    fn test_base_url_never_a_candidate() {
        let html = r#"<a class="movie-box" href="/search/IPX-156">self link</a>"#;
        let registry = RuleRegistry::new();
        let config = ExtractionConfig::default();
        let s = stub();

        let candidates =
            extract_detail_links(html, &registry, &config, &ctx(&s, SiteId::Javbus));
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_cross_domain_rejected_without_allow_list() {
        let html = r#"
            <a class="movie-box" href="https://evil.example.net/IPX-156">off-site</a>
            <a class="movie-box" href="/IPX-156"><img title="IPX-156"></a>
        "#;
        let registry = RuleRegistry::new();
        let config = ExtractionConfig::default();
        let s = stub();

        let candidates =
            extract_detail_links(html, &registry, &config, &ctx(&s, SiteId::Javbus));
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].url.starts_with("https://javbus.com/"));
    }

    #[test]
    fn test_selector_fallthrough_to_next_rule() {
        // No a.movie-box on the page; the waterfall rule picks it up.
        let html = r#"
            <div id="waterfall">
                <a href="/IPX-156"><img title="IPX-156 Title"></a>
            </div>
        "#;
        let registry = RuleRegistry::new();
        let config = ExtractionConfig::default();
        let s = stub();

        let candidates =
            extract_detail_links(html, &registry, &config, &ctx(&s, SiteId::Javbus));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].extracted_from, "javbus-waterfall");
    }

    #[test]
    fn test_generic_fallback_for_unknown_site() {
        let html = r#"
            <a href="/detail/IPX-156">IPX-156 Full Title</a>
            <a href="/about">About us</a>
        "#;
        let registry = RuleRegistry::new();
        let config = ExtractionConfig::default();
        let s = SearchResultStub::new("1", "IPX-156", "https://unknown-site.net/find/IPX-156", "other")
            .with_keyword("IPX-156");

        let candidates =
            extract_detail_links(html, &registry, &config, &ctx(&s, SiteId::Generic));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://unknown-site.net/detail/IPX-156");
    }

    #[test]
    fn test_generic_scan_respects_anchor_cap() {
        let mut html = String::new();
        for i in 0..500 {
            html.push_str(&format!(r#"<a href="/item/ABC-{:03}">ABC-{:03}</a>"#, i, i));
        }
        let registry = RuleRegistry::new();
        let config = ExtractionConfig {
            max_generic_anchors: 50,
            min_candidate_score: 0,
            ..Default::default()
        };
        let s = SearchResultStub::new("1", "ABC-001", "https://unknown-site.net/s", "other");

        let candidates =
            extract_detail_links(&html, &registry, &config, &ctx(&s, SiteId::Generic));
        assert!(candidates.len() <= 50);
        assert!(!candidates.is_empty());
    }

    #[test]
    fn test_site_rules_scan_past_the_generic_anchor_cap() {
        let mut html = String::from(r#"<div id="waterfall">"#);
        for i in 0..5 {
            html.push_str(&format!(
                r#"<a class="movie-box" href="/IPX-{0:03}"><img title="IPX-{0:03} Title"></a>"#,
                i
            ));
        }
        html.push_str("</div>");
        let registry = RuleRegistry::new();
        let config = ExtractionConfig {
            max_generic_anchors: 2,
            ..Default::default()
        };
        let s = stub();

        let candidates =
            extract_detail_links(&html, &registry, &config, &ctx(&s, SiteId::Javbus));
        assert_eq!(candidates.len(), 5);
    }

    #[test]
    fn test_generic_score_floor_applied() {
        // A code-bearing link wholly unrelated to the keyword scores
        // below the floor and is discarded.
        let html = r#"<a href="/item/ZZZ-999">unrelated thing</a>"#;
        let registry = RuleRegistry::new();
        let config = ExtractionConfig::default();
        let s = SearchResultStub::new("1", "IPX-156", "https://unknown-site.net/s", "other")
            .with_keyword("IPX-156");

        let candidates =
            extract_detail_links(html, &registry, &config, &ctx(&s, SiteId::Generic));
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_dedupe_keeps_best_score() {
        let candidates = vec![
            LinkCandidate::new("https://x.com/a", "low").with_score(10),
            LinkCandidate::new("https://x.com/a/", "high").with_score(90),
            LinkCandidate::new("https://x.com/b", "other").with_score(50),
        ];
        let ranked = dedupe_and_rank(candidates);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].score, 90);
        assert_eq!(ranked[1].score, 50);
    }
}
