//! Declarative per-site rule registry.
//!
//! Rules are pure data loaded once at startup: a table per site for
//! locating detail links on search pages, and a table per site for
//! locating fields on detail pages. A `generic` rule set backs every
//! unknown site. The registry performs no I/O and has no request-scoped
//! state; `to_json`/`from_json` exist for offline tuning only.

pub mod sites;
pub mod transform;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
pub use sites::{
    ActressRule, DetailLinkRule, DetailPageRules, FieldRule, LinkFieldRule, SearchPageRules,
};
pub use transform::{apply_transforms, TextTransform};

/// Known upstream sites, plus the catch-all.
///
/// Typed dispatch over this enum replaces the original string-keyed
/// switch chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteId {
    Javbus,
    Javdb,
    Jable,
    Javgg,
    Javmost,
    Sukebei,
    Javguru,
    Generic,
}

impl SiteId {
    /// All site identifiers with dedicated rule sets.
    pub const KNOWN: [SiteId; 7] = [
        SiteId::Javbus,
        SiteId::Javdb,
        SiteId::Jable,
        SiteId::Javgg,
        SiteId::Javmost,
        SiteId::Sukebei,
        SiteId::Javguru,
    ];

    /// Lower-cased identifier used in config, logs, and provenance.
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteId::Javbus => "javbus",
            SiteId::Javdb => "javdb",
            SiteId::Jable => "jable",
            SiteId::Javgg => "javgg",
            SiteId::Javmost => "javmost",
            SiteId::Sukebei => "sukebei",
            SiteId::Javguru => "javguru",
            SiteId::Generic => "generic",
        }
    }

    /// Resolve a lower-cased identifier; unknown or empty input maps
    /// to [`SiteId::Generic`].
    pub fn from_name(name: &str) -> SiteId {
        match name.trim().to_lowercase().as_str() {
            "javbus" => SiteId::Javbus,
            "javdb" => SiteId::Javdb,
            "jable" => SiteId::Jable,
            "javgg" => SiteId::Javgg,
            "javmost" => SiteId::Javmost,
            "sukebei" => SiteId::Sukebei,
            "javguru" => SiteId::Javguru,
            _ => SiteId::Generic,
        }
    }

    /// Infer the site from a URL's hostname.
    pub fn from_url(url: &str) -> SiteId {
        let host = match url::Url::parse(url) {
            Ok(u) => match u.host_str() {
                Some(h) => h.to_lowercase(),
                None => return SiteId::Generic,
            },
            Err(_) => return SiteId::Generic,
        };

        for site in Self::KNOWN {
            if site
                .domains()
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{d}")))
            {
                return site;
            }
        }
        SiteId::Generic
    }

    /// Hostnames this site is served from.
    pub fn domains(&self) -> &'static [&'static str] {
        match self {
            SiteId::Javbus => &["javbus.com", "javsee.icu"],
            SiteId::Javdb => &["javdb.com"],
            SiteId::Jable => &["jable.tv"],
            SiteId::Javgg => &["javgg.net"],
            SiteId::Javmost => &["javmost.com", "www5.javmost.com"],
            SiteId::Sukebei => &["sukebei.nyaa.si"],
            SiteId::Javguru => &["jav.guru"],
            SiteId::Generic => &[],
        }
    }

    /// Homepage used as the `Referer` for sites that require one.
    pub fn referer(&self) -> Option<&'static str> {
        match self {
            SiteId::Javbus => Some("https://www.javbus.com/"),
            SiteId::Javdb => Some("https://javdb.com/"),
            SiteId::Javmost => Some("https://www5.javmost.com/"),
            _ => None,
        }
    }
}

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule tables for every known site plus the generic fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRegistry {
    search: IndexMap<SiteId, SearchPageRules>,
    detail: IndexMap<SiteId, DetailPageRules>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    /// Build the built-in rule tables.
    pub fn new() -> Self {
        Self {
            search: sites::builtin_search_rules().into_iter().collect(),
            detail: sites::builtin_detail_rules().into_iter().collect(),
        }
    }

    /// Search-page rules for a site; unknown sites get the generic set.
    pub fn search_page_rules(&self, site: SiteId) -> &SearchPageRules {
        self.search
            .get(&site)
            .or_else(|| self.search.get(&SiteId::Generic))
            .expect("generic search rules always present")
    }

    /// Detail-page rules for a site, if a dedicated set exists.
    ///
    /// Returns `None` for sites without a dedicated table so the parser
    /// can take its generic fallback path explicitly.
    pub fn detail_page_rules(&self, site: SiteId) -> Option<&DetailPageRules> {
        if site == SiteId::Generic {
            return None;
        }
        self.detail.get(&site)
    }

    /// The generic detail-page rules.
    pub fn generic_detail_rules(&self) -> &DetailPageRules {
        self.detail
            .get(&SiteId::Generic)
            .expect("generic detail rules always present")
    }

    /// Export the tables as JSON (offline tuning hook).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load tables from JSON produced by [`RuleRegistry::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_known_hosts() {
        assert_eq!(SiteId::from_url("https://www.javbus.com/IPX-156"), SiteId::Javbus);
        assert_eq!(SiteId::from_url("https://javdb.com/v/abc"), SiteId::Javdb);
        assert_eq!(
            SiteId::from_url("https://sukebei.nyaa.si/view/123"),
            SiteId::Sukebei
        );
        assert_eq!(SiteId::from_url("https://jav.guru/12345/title/"), SiteId::Javguru);
    }

    #[test]
    fn test_from_url_unknown_or_invalid() {
        assert_eq!(SiteId::from_url("https://example.com/x"), SiteId::Generic);
        assert_eq!(SiteId::from_url("not a url"), SiteId::Generic);
    }

    #[test]
    fn test_from_url_subdomain_match() {
        assert_eq!(SiteId::from_url("https://www.javbus.com/"), SiteId::Javbus);
        // Suffix without dot is not a subdomain
        assert_eq!(SiteId::from_url("https://notjavbus.com/"), SiteId::Generic);
    }

    #[test]
    fn test_from_name_falls_back_to_generic() {
        assert_eq!(SiteId::from_name("JavBus"), SiteId::Javbus);
        assert_eq!(SiteId::from_name(""), SiteId::Generic);
        assert_eq!(SiteId::from_name("unknown-site"), SiteId::Generic);
    }

    #[test]
    fn test_registry_lookup_and_fallback() {
        let registry = RuleRegistry::new();
        assert!(!registry
            .search_page_rules(SiteId::Javbus)
            .detail_link_rules
            .is_empty());
        // Unknown sites resolve to the generic search set
        let generic = registry.search_page_rules(SiteId::Generic);
        assert!(!generic.detail_link_rules.is_empty());

        assert!(registry.detail_page_rules(SiteId::Javbus).is_some());
        assert!(registry.detail_page_rules(SiteId::Generic).is_none());
    }

    #[test]
    fn test_registry_json_round_trip() {
        let registry = RuleRegistry::new();
        let json = registry.to_json().unwrap();
        let loaded = RuleRegistry::from_json(&json).unwrap();
        assert_eq!(
            loaded.search_page_rules(SiteId::Javbus).detail_link_rules.len(),
            registry.search_page_rules(SiteId::Javbus).detail_link_rules.len()
        );
    }
}
