//! Detail-page content parsing.
//!
//! Applies a site's field rules to a detail page and produces an
//! unvalidated field bag (validation and enhancement belong to the
//! pipeline). When no site rule set exists, or the site pass comes back
//! empty, a best-effort generic pass runs instead; that path never
//! raises, it just notes what went wrong.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::dom::{Document, Element};
use crate::rules::sites::DetailField;
use crate::rules::{apply_transforms, ActressRule, DetailPageRules, FieldRule, LinkFieldRule, RuleRegistry, SiteId};
use crate::types::config::ExtractionConfig;
use crate::types::record::{Actress, DetailRecord, DownloadLink, MagnetLink};
use crate::validate::{filter_download_links, is_domain_or_subdomain_match};

/// Magnet URIs must carry this scheme prefix to be accepted.
pub const MAGNET_PREFIX: &str = "magnet:";

static SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([\d.]+\s*[kmgt]i?b)").unwrap());

/// Context for one detail-page parse.
pub struct DetailPageContext<'a> {
    pub site: SiteId,
    pub original_url: &'a str,
    pub original_title: Option<&'a str>,
}

/// Result of a parse: the raw field bag plus a note when the
/// site-specific pass failed and the generic fallback supplied the data.
pub struct ParsedDetail {
    pub record: DetailRecord,
    pub fallback_error: Option<String>,
}

/// Parse a detail page into a raw field bag.
pub fn parse_detail_page(
    html: &str,
    registry: &RuleRegistry,
    config: &ExtractionConfig,
    ctx: &DetailPageContext<'_>,
) -> ParsedDetail {
    let doc = Document::parse(html);

    if let Some(rules) = registry.detail_page_rules(ctx.site) {
        let record = parse_with_rules(&doc, rules, config, ctx);
        if record.has_content() {
            return ParsedDetail {
                record,
                fallback_error: None,
            };
        }
        debug!(site = %ctx.site, url = %ctx.original_url, "site-specific parse empty, using generic fallback");
        let mut fallback = parse_with_rules(&doc, registry.generic_detail_rules(), config, ctx);
        apply_generic_extras(&doc, &mut fallback, ctx);
        return ParsedDetail {
            record: fallback,
            fallback_error: Some(format!(
                "site rules for {} produced no fields",
                ctx.site
            )),
        };
    }

    let mut record = parse_with_rules(&doc, registry.generic_detail_rules(), config, ctx);
    apply_generic_extras(&doc, &mut record, ctx);
    ParsedDetail {
        record,
        fallback_error: None,
    }
}

/// Run one rule set over the document.
fn parse_with_rules(
    doc: &Document,
    rules: &DetailPageRules,
    config: &ExtractionConfig,
    ctx: &DetailPageContext<'_>,
) -> DetailRecord {
    let mut record = DetailRecord::new();
    let base = Url::parse(ctx.original_url).ok();

    for (field, rule) in &rules.fields {
        // First-match-wins per field; later rules never overwrite.
        if field_is_set(&record, *field) {
            continue;
        }
        if let Some(value) = single_value(doc, rule) {
            assign_field(&mut record, *field, value);
        }
    }

    if let Some(rule) = &rules.screenshots {
        record.screenshots = multi_attr_values(doc, rule, base.as_ref())
            .into_iter()
            .take(config.max_screenshots)
            .collect();
    }
    if let Some(rule) = &rules.actresses {
        record.actresses = parse_actresses(doc, rule, base.as_ref());
    }
    if let Some(rule) = &rules.tags {
        record.tags = multi_text_values(doc, rule);
    }
    if let Some(rule) = &rules.magnet_links {
        record.magnet_links = parse_magnets(doc, rule)
            .into_iter()
            .take(config.max_magnet_links)
            .collect();
    }
    if let Some(rule) = &rules.download_links {
        let raw = parse_downloads(doc, rule, base.as_ref());
        record.download_links = filter_site_downloads(raw, ctx)
            .into_iter()
            .take(config.max_download_links)
            .collect();
    }

    record.clean()
}

/// Extras the generic pass adds on top of its rule table: the document
/// title (or the original result title) and a code derived from it.
fn apply_generic_extras(doc: &Document, record: &mut DetailRecord, ctx: &DetailPageContext<'_>) {
    if record.title.is_none() {
        record.title = doc
            .title()
            .or_else(|| ctx.original_title.map(str::to_string));
    }
    if record.code.is_none() {
        if let Some(title) = &record.title {
            record.code = crate::dom::extract_code(title);
        }
    }
    if record.release_date.is_none() {
        if let Some(body) = doc.select_first("body") {
            record.release_date = body.date_hint();
        }
    }
}

fn field_is_set(record: &DetailRecord, field: DetailField) -> bool {
    match field {
        DetailField::Title => record.title.is_some(),
        DetailField::Code => record.code.is_some(),
        DetailField::CoverImage => record.cover_image.is_some(),
        DetailField::Description => record.description.is_some(),
        DetailField::Director => record.director.is_some(),
        DetailField::Studio => record.studio.is_some(),
        DetailField::Label => record.label.is_some(),
        DetailField::Series => record.series.is_some(),
        DetailField::ReleaseDate => record.release_date.is_some(),
        DetailField::Duration => record.duration.is_some(),
        DetailField::Quality => record.quality.is_some(),
        DetailField::FileSize => record.file_size.is_some(),
        DetailField::Resolution => record.resolution.is_some(),
        DetailField::Rating => record.rating.is_some(),
    }
}

fn assign_field(record: &mut DetailRecord, field: DetailField, value: String) {
    match field {
        DetailField::Title => record.title = Some(value),
        DetailField::Code => record.code = Some(value),
        DetailField::CoverImage => record.cover_image = Some(value),
        DetailField::Description => record.description = Some(value),
        DetailField::Director => record.director = Some(value),
        DetailField::Studio => record.studio = Some(value),
        DetailField::Label => record.label = Some(value),
        DetailField::Series => record.series = Some(value),
        DetailField::ReleaseDate => record.release_date = Some(value),
        DetailField::Duration => record.duration = Some(value),
        DetailField::Quality => record.quality = Some(value),
        DetailField::FileSize => record.file_size = Some(value),
        DetailField::Resolution => record.resolution = Some(value),
        DetailField::Rating => {
            record.rating = value.parse::<f32>().ok();
        }
    }
}

/// First matching element whose transformed value is non-empty. Several
/// sites put the interesting text in the Nth sibling a shared selector
/// matches, so an empty transform result moves on to the next match.
fn single_value(doc: &Document, rule: &FieldRule) -> Option<String> {
    for element in doc.select(&rule.selector) {
        let Some(raw) = raw_value(&element, rule.attr.as_deref()) else {
            continue;
        };
        let transformed = apply_transforms(&raw, &rule.transforms);
        let trimmed = transformed.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    None
}

fn raw_value(element: &Element<'_>, attr: Option<&str>) -> Option<String> {
    match attr {
        Some(attr) => element.attr(attr).map(str::to_string),
        None => Some(element.text()),
    }
}

/// All matching elements' attribute values, resolved against the page
/// URL when relative, deduplicated preserving order.
fn multi_attr_values(doc: &Document, rule: &FieldRule, base: Option<&Url>) -> Vec<String> {
    let attr = rule.attr.as_deref().unwrap_or("src");
    let mut seen = std::collections::HashSet::new();
    doc.select(&rule.selector)
        .into_iter()
        .filter_map(|el| el.attr(attr))
        .filter_map(|v| resolve(base, v))
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

fn multi_text_values(doc: &Document, rule: &FieldRule) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    doc.select(&rule.selector)
        .into_iter()
        .map(|el| apply_transforms(&el.text(), &rule.transforms))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

fn parse_actresses(doc: &Document, rule: &ActressRule, base: Option<&Url>) -> Vec<Actress> {
    let mut seen = std::collections::HashSet::new();
    doc.select(&rule.selector)
        .into_iter()
        .filter_map(|el| {
            let name = rule
                .name_selector
                .as_deref()
                .and_then(|sel| el.select_first(sel))
                .map(|n| n.text())
                .filter(|n| !n.is_empty())
                .or_else(|| el.title_hint())
                .unwrap_or_else(|| el.text());
            let name = name.trim().to_string();
            if name.is_empty() || !seen.insert(name.to_lowercase()) {
                return None;
            }

            let mut actress = Actress::new(name);
            if let Some(href) = el.attr("href").and_then(|h| resolve(base, h)) {
                actress.profile_url = Some(href);
            }
            if let Some(avatar) = rule
                .avatar_selector
                .as_deref()
                .and_then(|sel| el.select_first(sel))
                .and_then(|img| img.attr("src"))
                .and_then(|src| resolve(base, src))
            {
                actress.avatar = Some(avatar);
            }
            Some(actress)
        })
        .collect()
}

/// Magnet anchors. Only hrefs with the literal magnet scheme prefix are
/// accepted; anything else matching the selector is ignored.
fn parse_magnets(doc: &Document, rule: &LinkFieldRule) -> Vec<MagnetLink> {
    let mut seen = std::collections::HashSet::new();
    doc.select(&rule.selector)
        .into_iter()
        .filter_map(|el| {
            let href = el.attr("href")?.trim().to_string();
            if !href.starts_with(MAGNET_PREFIX) {
                return None;
            }
            if !seen.insert(href.clone()) {
                return None;
            }
            let text = el.text();
            let name = if text.is_empty() {
                "magnet".to_string()
            } else {
                text.clone()
            };
            let mut magnet = MagnetLink::new(name, href);
            magnet.size = SIZE_RE
                .captures(&text)
                .map(|c| c[1].to_string());
            Some(magnet)
        })
        .collect()
}

fn parse_downloads(doc: &Document, rule: &LinkFieldRule, base: Option<&Url>) -> Vec<DownloadLink> {
    let mut seen = std::collections::HashSet::new();
    doc.select(&rule.selector)
        .into_iter()
        .filter_map(|el| {
            let href = el.attr("href")?.trim();
            if href.is_empty() || href.starts_with(MAGNET_PREFIX) {
                return None;
            }
            let url = resolve(base, href)?;
            if !seen.insert(url.clone()) {
                return None;
            }
            let text = el.text();
            let name = if text.is_empty() {
                el.title_hint().unwrap_or_else(|| "download".to_string())
            } else {
                text.clone()
            };
            let mut link = DownloadLink::new(name, url);
            if link.url.to_lowercase().ends_with(".torrent") {
                link.kind = "torrent".into();
            }
            link.size = SIZE_RE.captures(&text).map(|c| c[1].to_string());
            Some(link)
        })
        .collect()
}

/// Same-domain/allow-list/spam/navigation filtering for download links,
/// using the site's own hostnames as the allow-list.
fn filter_site_downloads(
    links: Vec<DownloadLink>,
    ctx: &DetailPageContext<'_>,
) -> Vec<DownloadLink> {
    let Some(expected) = crate::validate::extract_domain(ctx.original_url) else {
        return Vec::new();
    };
    let site = ctx.site;
    filter_download_links(links, &expected, move |domain| {
        site.domains()
            .iter()
            .any(|d| is_domain_or_subdomain_match(domain, d))
    })
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}
