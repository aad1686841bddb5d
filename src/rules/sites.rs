//! Built-in rule tables for the known catalog sites.
//!
//! Everything here is plain serializable data. Selectors and patterns are
//! strings; a pattern that fails to compile simply stops qualifying links
//! instead of erroring.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::transform::TextTransform;
use super::SiteId;

/// Rule for locating detail-page links on a search page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailLinkRule {
    /// Provenance tag recorded on candidates this rule produces.
    pub name: String,

    /// Container/anchor selector tried for this rule.
    pub selector: String,

    /// Optional selector for the candidate title, scoped to the match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_selector: Option<String>,

    /// Optional attribute to read the title from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_attr: Option<String>,

    /// Regex a qualifying href must match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_pattern: Option<String>,

    /// Substrings that disqualify an href.
    #[serde(default)]
    pub exclude_substrings: Vec<String>,

    /// Regexes for cross-domain hosts this rule explicitly allows.
    #[serde(default)]
    pub allowed_domain_patterns: Vec<String>,

    /// Qualifying links must carry a catalog code.
    #[serde(default)]
    pub require_code: bool,

    /// Site-specific rules score higher than generic ones.
    #[serde(default)]
    pub high_confidence: bool,
}

impl DetailLinkRule {
    /// Minimal rule with just a name and selector.
    pub fn new(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            title_selector: None,
            title_attr: None,
            required_pattern: None,
            exclude_substrings: vec![],
            allowed_domain_patterns: vec![],
            require_code: false,
            high_confidence: false,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.required_pattern = Some(pattern.into());
        self
    }

    pub fn excluding(mut self, substrings: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude_substrings = substrings.into_iter().map(|s| s.into()).collect();
        self
    }

    pub fn allowing_domains(
        mut self,
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.allowed_domain_patterns = patterns.into_iter().map(|p| p.into()).collect();
        self
    }

    pub fn requiring_code(mut self) -> Self {
        self.require_code = true;
        self
    }

    pub fn high_confidence(mut self) -> Self {
        self.high_confidence = true;
        self
    }

    pub fn with_title_attr(mut self, attr: impl Into<String>) -> Self {
        self.title_attr = Some(attr.into());
        self
    }

    pub fn with_title_selector(mut self, selector: impl Into<String>) -> Self {
        self.title_selector = Some(selector.into());
        self
    }

    /// ALL configured predicates must pass for a link to qualify:
    /// exclusions, required pattern, and (if configured) allowed domains.
    /// The catalog-code requirement is checked by the extractor, which
    /// knows the derived code.
    pub fn link_qualifies(&self, url: &str, domain: &str) -> bool {
        if self
            .exclude_substrings
            .iter()
            .any(|s| url.to_lowercase().contains(&s.to_lowercase()))
        {
            return false;
        }
        if let Some(pattern) = &self.required_pattern {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(url) => {}
                _ => return false,
            }
        }
        if !self.allowed_domain_patterns.is_empty() && !self.domain_allowed(domain) {
            return false;
        }
        true
    }

    /// Whether a cross-domain host matches this rule's allow-list.
    pub fn domain_allowed(&self, domain: &str) -> bool {
        self.allowed_domain_patterns
            .iter()
            .any(|p| Regex::new(p).map(|re| re.is_match(domain)).unwrap_or(false))
    }
}

/// The ordered detail-link rules for one site's search pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPageRules {
    /// Tried in order; the first rule yielding candidates wins.
    pub detail_link_rules: Vec<DetailLinkRule>,
}

/// Rule for a single-valued detail-page field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub selector: String,

    /// Read this attribute instead of text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,

    /// Transform pipeline applied in order.
    #[serde(default)]
    pub transforms: Vec<TextTransform>,
}

impl FieldRule {
    /// Field read from an element's text content.
    pub fn text(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attr: None,
            transforms: vec![],
        }
    }

    /// Field read from an element attribute.
    pub fn attr(selector: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attr: Some(attr.into()),
            transforms: vec![],
        }
    }

    pub fn with_transforms(mut self, transforms: Vec<TextTransform>) -> Self {
        self.transforms = transforms;
        self
    }
}

/// Rule for the actress list on a detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActressRule {
    /// Selector matching one element per performer.
    pub selector: String,

    /// Optional name selector scoped inside the match; otherwise the
    /// element's title hint, then its text, is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_selector: Option<String>,

    /// Optional avatar image selector scoped inside the match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_selector: Option<String>,
}

/// Rule for magnet or download anchor lists on a detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkFieldRule {
    /// Selector matching the anchors.
    pub selector: String,

    /// Optional selector for a size label near each anchor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_selector: Option<String>,
}

impl LinkFieldRule {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            size_selector: None,
        }
    }
}

/// Single-valued detail fields addressable by rule tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailField {
    Title,
    Code,
    CoverImage,
    Description,
    Director,
    Studio,
    Label,
    Series,
    ReleaseDate,
    Duration,
    Quality,
    FileSize,
    Resolution,
    Rating,
}

/// Field rules for one site's detail pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailPageRules {
    /// Single-valued fields, applied first-match-wins per field.
    #[serde(default)]
    pub fields: Vec<(DetailField, FieldRule)>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshots: Option<FieldRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actresses: Option<ActressRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<FieldRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnet_links: Option<LinkFieldRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_links: Option<LinkFieldRule>,
}

/// Shared path exclusions for search-result pages.
fn common_excludes() -> Vec<String> {
    ["/search", "/genre", "/star/", "/studio/", "/label/", "/page/", "/actresses", "/forum", "/login", "/register", "javascript:", "#"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Extract transform that isolates a catalog code.
fn code_extract() -> Vec<TextTransform> {
    vec![
        TextTransform::Extract {
            pattern: r"(?i)([a-z]{2,6}-?\d{3,6})".into(),
            group: 1,
        },
        TextTransform::Uppercase,
    ]
}

/// Built-in search-page rule tables.
pub(super) fn builtin_search_rules() -> Vec<(SiteId, SearchPageRules)> {
    vec![
        (
            SiteId::Javbus,
            SearchPageRules {
                detail_link_rules: vec![
                    DetailLinkRule::new("javbus-movie-box", "a.movie-box")
                        .with_pattern(r"(?i)/[a-z]{2,6}-?\d{3,6}/?$")
                        .excluding(common_excludes())
                        .requiring_code()
                        .high_confidence(),
                    DetailLinkRule::new("javbus-waterfall", "#waterfall a")
                        .excluding(common_excludes())
                        .requiring_code(),
                ],
            },
        ),
        (
            SiteId::Javdb,
            SearchPageRules {
                detail_link_rules: vec![
                    DetailLinkRule::new("javdb-item", ".movie-list .item a")
                        .with_pattern(r"/v/\w+")
                        .excluding(common_excludes())
                        .with_title_attr("title")
                        .high_confidence(),
                    DetailLinkRule::new("javdb-video-link", r#"a[href*="/v/"]"#)
                        .excluding(common_excludes()),
                ],
            },
        ),
        (
            SiteId::Jable,
            SearchPageRules {
                detail_link_rules: vec![
                    DetailLinkRule::new("jable-video-box", ".video-img-box a")
                        .with_pattern(r"(?i)/videos/[a-z0-9-]+/?")
                        .excluding(common_excludes())
                        .with_title_selector(".detail .title")
                        .high_confidence(),
                ],
            },
        ),
        (
            SiteId::Javgg,
            SearchPageRules {
                detail_link_rules: vec![
                    DetailLinkRule::new("javgg-poster", "article a, .video-poster a")
                        .with_pattern(r"(?i)/jav/")
                        .excluding(common_excludes())
                        .requiring_code()
                        .high_confidence(),
                ],
            },
        ),
        (
            SiteId::Javmost,
            SearchPageRules {
                detail_link_rules: vec![
                    DetailLinkRule::new("javmost-card", ".card a, .col-lg-3 a")
                        .excluding(common_excludes())
                        .allowing_domains([r"(^|\.)javmost\.com$"])
                        .requiring_code()
                        .high_confidence(),
                ],
            },
        ),
        (
            SiteId::Sukebei,
            SearchPageRules {
                detail_link_rules: vec![
                    DetailLinkRule::new("sukebei-view", r#"td a[href*="/view/"]"#)
                        .with_pattern(r"/view/\d+")
                        .excluding(["/user/", "?f=", "?c="].map(String::from))
                        .high_confidence(),
                ],
            },
        ),
        (
            SiteId::Javguru,
            SearchPageRules {
                detail_link_rules: vec![
                    DetailLinkRule::new("javguru-entry", ".imgg a, h2.entry-title a")
                        .with_pattern(r"(?i)jav\.guru/\d+/")
                        .excluding(common_excludes())
                        .high_confidence(),
                ],
            },
        ),
        (
            SiteId::Generic,
            SearchPageRules {
                detail_link_rules: vec![DetailLinkRule::new("generic-anchor-scan", "a")
                    .excluding(common_excludes())
                    .requiring_code()],
            },
        ),
    ]
}

/// Built-in detail-page rule tables.
pub(super) fn builtin_detail_rules() -> Vec<(SiteId, DetailPageRules)> {
    vec![
        (
            SiteId::Javbus,
            DetailPageRules {
                fields: vec![
                    (DetailField::Title, FieldRule::text("div.container h3")),
                    (
                        DetailField::Code,
                        FieldRule::text("div.container h3").with_transforms(code_extract()),
                    ),
                    (DetailField::CoverImage, FieldRule::attr("a.bigImage img", "src")),
                    (
                        DetailField::ReleaseDate,
                        FieldRule::text("div.info p").with_transforms(vec![TextTransform::Extract {
                            pattern: r"(\d{4}-\d{2}-\d{2})".into(),
                            group: 1,
                        }]),
                    ),
                    (
                        DetailField::Duration,
                        FieldRule::text("div.info p").with_transforms(vec![TextTransform::Extract {
                            pattern: r"(\d+)\s*分鐘".into(),
                            group: 1,
                        }]),
                    ),
                    (DetailField::Studio, FieldRule::text(r#"div.info a[href*="/studio/"]"#)),
                    (DetailField::Label, FieldRule::text(r#"div.info a[href*="/label/"]"#)),
                    (DetailField::Series, FieldRule::text(r#"div.info a[href*="/series/"]"#)),
                    (DetailField::Director, FieldRule::text(r#"div.info a[href*="/director/"]"#)),
                ],
                screenshots: Some(FieldRule::attr("#sample-waterfall a.sample-box", "href")),
                actresses: Some(ActressRule {
                    selector: "a.avatar-box".into(),
                    name_selector: Some("span".into()),
                    avatar_selector: Some("img".into()),
                }),
                tags: Some(FieldRule::text(r#"span.genre a[href*="/genre/"]"#)),
                magnet_links: Some(LinkFieldRule::new(r#"a[href^="magnet:"]"#)),
                download_links: None,
            },
        ),
        (
            SiteId::Javdb,
            DetailPageRules {
                fields: vec![
                    (DetailField::Title, FieldRule::text("h2.title")),
                    (
                        DetailField::Code,
                        FieldRule::text(".first-block .value, h2.title")
                            .with_transforms(code_extract()),
                    ),
                    (
                        DetailField::CoverImage,
                        FieldRule::attr(".column-video-cover img, img.video-cover", "src"),
                    ),
                    (
                        DetailField::ReleaseDate,
                        FieldRule::text(".panel-block .value").with_transforms(vec![
                            TextTransform::Extract {
                                pattern: r"(\d{4}-\d{2}-\d{2})".into(),
                                group: 1,
                            },
                        ]),
                    ),
                    (
                        DetailField::Rating,
                        FieldRule::text(".score .value").with_transforms(vec![
                            TextTransform::Extract {
                                pattern: r"(\d+(?:\.\d+)?)".into(),
                                group: 1,
                            },
                        ]),
                    ),
                ],
                screenshots: Some(FieldRule::attr(".preview-images a.tile-item", "href")),
                actresses: Some(ActressRule {
                    selector: r#".panel-block a[href*="/actors/"]"#.into(),
                    name_selector: None,
                    avatar_selector: None,
                }),
                tags: Some(FieldRule::text(r#".panel-block a[href*="/tags"]"#)),
                magnet_links: Some(LinkFieldRule {
                    selector: r#"#magnets-content a[href^="magnet:"], a[href^="magnet:"]"#.into(),
                    size_selector: Some(".meta".into()),
                }),
                download_links: None,
            },
        ),
        (
            SiteId::Jable,
            DetailPageRules {
                fields: vec![
                    (DetailField::Title, FieldRule::text(".header-left h4")),
                    (
                        DetailField::Code,
                        FieldRule::text(".header-left h4").with_transforms(code_extract()),
                    ),
                    (DetailField::CoverImage, FieldRule::attr("#player", "poster")),
                ],
                tags: Some(FieldRule::text(r#".tags a[href*="/tags/"]"#)),
                actresses: Some(ActressRule {
                    selector: r#".models a[href*="/models/"]"#.into(),
                    name_selector: None,
                    avatar_selector: Some("img".into()),
                }),
                ..Default::default()
            },
        ),
        (
            SiteId::Javgg,
            DetailPageRules {
                fields: vec![
                    (DetailField::Title, FieldRule::text("h1.entry-title, .sheader h1")),
                    (
                        DetailField::Code,
                        FieldRule::text("h1.entry-title, .sheader h1")
                            .with_transforms(code_extract()),
                    ),
                    (DetailField::CoverImage, FieldRule::attr(".poster img", "src")),
                    (
                        DetailField::ReleaseDate,
                        FieldRule::text(".extra .date").with_transforms(vec![
                            TextTransform::Extract {
                                pattern: r"(\d{4}-\d{2}-\d{2})".into(),
                                group: 1,
                            },
                        ]),
                    ),
                ],
                screenshots: Some(FieldRule::attr("#dt_galery img, .g-item img", "src")),
                tags: Some(FieldRule::text(r#".sgeneros a"#)),
                download_links: Some(LinkFieldRule::new(r#".links_table a, a[href*="/download/"]"#)),
                ..Default::default()
            },
        ),
        (
            SiteId::Javmost,
            DetailPageRules {
                fields: vec![
                    (DetailField::Title, FieldRule::text("h1.card-title, h1")),
                    (
                        DetailField::Code,
                        FieldRule::text("h1.card-title, h1").with_transforms(code_extract()),
                    ),
                    (DetailField::CoverImage, FieldRule::attr("video", "poster")),
                ],
                tags: Some(FieldRule::text(r#"a[href*="/category/"]"#)),
                download_links: Some(LinkFieldRule::new(r#"a[href*="/download/"]"#)),
                ..Default::default()
            },
        ),
        (
            SiteId::Sukebei,
            DetailPageRules {
                fields: vec![
                    (DetailField::Title, FieldRule::text("h3.panel-title")),
                    (
                        DetailField::Code,
                        FieldRule::text("h3.panel-title").with_transforms(code_extract()),
                    ),
                    (
                        DetailField::FileSize,
                        FieldRule::text(".panel-body .row div").with_transforms(vec![
                            TextTransform::Extract {
                                pattern: r"(?i)([\d.]+\s*[kmgt]i?b)".into(),
                                group: 1,
                            },
                        ]),
                    ),
                    (DetailField::Description, FieldRule::text("#torrent-description")),
                ],
                magnet_links: Some(LinkFieldRule::new(r#"a[href^="magnet:"]"#)),
                download_links: Some(LinkFieldRule::new(r#"a[href$=".torrent"]"#)),
                ..Default::default()
            },
        ),
        (
            SiteId::Javguru,
            DetailPageRules {
                fields: vec![
                    (DetailField::Title, FieldRule::text("h1.titl, h1.entry-title")),
                    (
                        DetailField::Code,
                        FieldRule::text("h1.titl, h1.entry-title").with_transforms(code_extract()),
                    ),
                    (
                        DetailField::CoverImage,
                        FieldRule::attr(".large-screenshot img, .wp-post-image", "src"),
                    ),
                    (DetailField::Description, FieldRule::text(".inside-article .entry-content p")),
                ],
                tags: Some(FieldRule::text(r#"a[rel="tag"]"#)),
                magnet_links: Some(LinkFieldRule::new(r#"a[href^="magnet:"]"#)),
                ..Default::default()
            },
        ),
        (
            SiteId::Generic,
            DetailPageRules {
                fields: vec![
                    (DetailField::Title, FieldRule::text("title")),
                    (
                        DetailField::Code,
                        FieldRule::text("title").with_transforms(code_extract()),
                    ),
                    (
                        DetailField::CoverImage,
                        FieldRule::attr(r#"meta[property="og:image"]"#, "content"),
                    ),
                    (
                        DetailField::Description,
                        FieldRule::attr(r#"meta[name="description"]"#, "content"),
                    ),
                ],
                screenshots: Some(FieldRule::attr(
                    r#"img[class*="screenshot"], img[class*="sample"]"#,
                    "src",
                )),
                magnet_links: Some(LinkFieldRule::new(r#"a[href^="magnet:"]"#)),
                download_links: Some(LinkFieldRule::new(
                    r#"a[href*="/download"], a[href$=".torrent"]"#,
                )),
                ..Default::default()
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_qualifies_all_predicates() {
        let rule = DetailLinkRule::new("t", "a")
            .with_pattern(r"(?i)/[a-z]{2,6}-\d{3,6}$")
            .excluding(["/search"].map(String::from));

        assert!(rule.link_qualifies("https://javbus.com/IPX-156", "javbus.com"));
        assert!(!rule.link_qualifies("https://javbus.com/search/IPX-156", "javbus.com"));
        assert!(!rule.link_qualifies("https://javbus.com/genre", "javbus.com"));
    }

    #[test]
    fn test_domain_allow_list() {
        let rule = DetailLinkRule::new("t", "a").allowing_domains([r"(^|\.)javmost\.com$"]);
        assert!(rule.domain_allowed("www5.javmost.com"));
        assert!(rule.domain_allowed("javmost.com"));
        assert!(!rule.domain_allowed("evil-javmost.com.attacker.net"));
    }

    #[test]
    fn test_bad_required_pattern_disqualifies() {
        let rule = DetailLinkRule::new("t", "a").with_pattern("[[[");
        assert!(!rule.link_qualifies("https://x.com/anything", "x.com"));
    }

    #[test]
    fn test_every_known_site_has_rules() {
        let search = builtin_search_rules();
        let detail = builtin_detail_rules();
        for site in SiteId::KNOWN {
            assert!(
                search.iter().any(|(s, _)| *s == site),
                "missing search rules for {site}"
            );
            assert!(
                detail.iter().any(|(s, _)| *s == site),
                "missing detail rules for {site}"
            );
        }
        assert!(search.iter().any(|(s, _)| *s == SiteId::Generic));
        assert!(detail.iter().any(|(s, _)| *s == SiteId::Generic));
    }
}
