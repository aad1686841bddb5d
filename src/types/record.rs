//! The parsed, validated detail record and its component types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::config::DisplayConfig;

/// Outcome status attached to every record the pipeline returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Site-specific (or generic) parse produced usable data.
    Success,

    /// Generic fallback ran after the primary parse failed; partial data.
    Partial,

    /// Served from cache without a network fetch.
    Cached,

    /// Pipeline failed; the record only echoes the input identifiers.
    Error,
}

/// A credited performer on a detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actress {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Actress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile_url: None,
            avatar: None,
        }
    }

    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = Some(url.into());
        self
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar = Some(url.into());
        self
    }
}

/// A direct-download link found on a detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub name: String,
    pub url: String,

    /// Link kind as labelled on the page ("direct", "torrent", ...)
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl DownloadLink {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind: "direct".into(),
            size: None,
            quality: None,
        }
    }
}

/// A magnet link found on a detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnetLink {
    pub name: String,

    /// Full magnet URI; always starts with the `magnet:` scheme
    pub magnet: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u32>,
}

impl MagnetLink {
    pub fn new(name: impl Into<String>, magnet: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            magnet: magnet.into(),
            size: None,
            seeders: None,
            leechers: None,
        }
    }
}

/// Provenance metadata stamped on every returned record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Site identifier the extraction ran under (e.g. "javbus", "generic")
    pub source_type: String,

    /// The resolved detail URL that was actually parsed
    pub detail_url: String,

    /// The original search-result URL from the input stub
    pub search_url: String,

    pub extraction_status: ExtractionStatus,

    /// Wall-clock milliseconds spent on this item (0 for cache hits)
    pub extraction_time_ms: u64,

    pub extracted_at: DateTime<Utc>,

    /// Whether this record came straight from the cache
    #[serde(default)]
    pub cache_hit: bool,

    /// Note recorded when the site-specific parse failed and the
    /// generic fallback supplied the data instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
}

/// The parsed, validated output of the pipeline.
///
/// Empty strings and empty arrays are dropped by [`DetailRecord::clean`]
/// so downstream consumers can treat "field present" as "field usable".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actresses: Vec<Actress>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    /// ISO calendar date (YYYY-MM-DD); anything else is dropped at
    /// validation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub download_links: Vec<DownloadLink>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub magnet_links: Vec<MagnetLink>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Rating clamped to [0, 10]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<RecordMeta>,
}

impl DetailRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rating, clamped to [0, 10].
    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating.clamp(0.0, 10.0));
        self
    }

    /// Drop empty strings and whitespace-only values so "present"
    /// always means "usable".
    pub fn clean(mut self) -> Self {
        fn keep(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        self.title = keep(self.title);
        self.code = keep(self.code);
        self.cover_image = keep(self.cover_image);
        self.director = keep(self.director);
        self.studio = keep(self.studio);
        self.label = keep(self.label);
        self.series = keep(self.series);
        self.release_date = keep(self.release_date);
        self.duration = keep(self.duration);
        self.quality = keep(self.quality);
        self.file_size = keep(self.file_size);
        self.resolution = keep(self.resolution);
        self.description = keep(self.description);
        self.screenshots.retain(|s| !s.trim().is_empty());
        self.tags.retain(|t| !t.trim().is_empty());
        self.actresses.retain(|a| !a.name.trim().is_empty());
        self.download_links.retain(|d| !d.url.trim().is_empty());
        self.magnet_links.retain(|m| !m.magnet.trim().is_empty());
        self
    }

    /// Whether the record carries anything beyond provenance.
    pub fn has_content(&self) -> bool {
        self.title.is_some()
            || self.code.is_some()
            || self.cover_image.is_some()
            || !self.screenshots.is_empty()
            || !self.actresses.is_empty()
            || !self.download_links.is_empty()
            || !self.magnet_links.is_empty()
            || self.description.is_some()
            || !self.tags.is_empty()
    }

    /// Reduce the record to the fields the caller's display config
    /// says to show. Provenance metadata is always kept.
    pub fn filtered(mut self, display: &DisplayConfig) -> Self {
        if !display.show_screenshots {
            self.screenshots.clear();
        }
        if !display.show_actresses {
            self.actresses.clear();
        }
        if !display.show_download_links {
            self.download_links.clear();
        }
        if !display.show_magnet_links {
            self.magnet_links.clear();
        }
        if !display.show_tags {
            self.tags.clear();
        }
        if !display.show_description {
            self.description = None;
        }
        self
    }

    /// Record containing only echoed identifiers, used for failures.
    pub fn error_stub(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_drops_empty_fields() {
        let record = DetailRecord {
            title: Some("  IPX-156  ".into()),
            code: Some("   ".into()),
            screenshots: vec!["https://x.com/1.jpg".into(), "  ".into()],
            ..Default::default()
        }
        .clean();

        assert_eq!(record.title.as_deref(), Some("IPX-156"));
        assert!(record.code.is_none());
        assert_eq!(record.screenshots.len(), 1);
    }

    #[test]
    fn test_rating_clamped() {
        assert_eq!(DetailRecord::new().with_rating(11.5).rating, Some(10.0));
        assert_eq!(DetailRecord::new().with_rating(-2.0).rating, Some(0.0));
        assert_eq!(DetailRecord::new().with_rating(7.2).rating, Some(7.2));
    }

    #[test]
    fn test_filtered_respects_display_config() {
        let record = DetailRecord {
            title: Some("T".into()),
            magnet_links: vec![MagnetLink::new("720p", "magnet:?xt=urn:btih:ABC")],
            tags: vec!["tag".into()],
            ..Default::default()
        };

        let display = DisplayConfig {
            show_magnet_links: false,
            ..Default::default()
        };
        let filtered = record.filtered(&display);
        assert!(filtered.magnet_links.is_empty());
        assert_eq!(filtered.tags.len(), 1);
        assert_eq!(filtered.title.as_deref(), Some("T"));
    }

    #[test]
    fn test_serde_drops_empty_collections() {
        let record = DetailRecord {
            title: Some("T".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("screenshots").is_none());
        assert!(json.get("magnet_links").is_none());
        assert_eq!(json["title"], "T");
    }
}
