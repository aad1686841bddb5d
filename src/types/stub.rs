//! Input stubs and candidate links.

use serde::{Deserialize, Serialize};

/// The unit of work handed to the pipeline by the search layer.
///
/// Immutable input; never persisted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultStub {
    /// Caller-supplied identifier, echoed back in results
    pub id: String,

    /// Title as shown on the search result
    pub title: String,

    /// URL of the search result (may or may not be the detail page)
    pub url: String,

    /// Source tag the search layer used (e.g. "javbus")
    pub source: String,

    /// Keyword the user searched for, if known
    pub keyword: Option<String>,
}

impl SearchResultStub {
    /// Create a new stub.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            source: source.into(),
            keyword: None,
        }
    }

    /// Set the search keyword.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }
}

/// A URL discovered on a search page that might be the true detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCandidate {
    /// Absolute URL of the candidate
    pub url: String,

    /// Title derived for the candidate
    pub title: String,

    /// Catalog code extracted from the title or URL, if any
    pub code: Option<String>,

    /// Relevance score, 0-100
    pub score: u8,

    /// Which rule produced this candidate (diagnostics only)
    pub extracted_from: String,
}

impl LinkCandidate {
    /// Create a new candidate with a zero score.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            code: None,
            score: 0,
            extracted_from: String::new(),
        }
    }

    /// Set the catalog code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the relevance score.
    pub fn with_score(mut self, score: u8) -> Self {
        self.score = score.min(100);
        self
    }

    /// Tag the rule that produced this candidate.
    pub fn with_provenance(mut self, rule: impl Into<String>) -> Self {
        self.extracted_from = rule.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_builder() {
        let stub = SearchResultStub::new("1", "IPX-156", "https://javbus.com/IPX-156", "javbus")
            .with_keyword("IPX-156");
        assert_eq!(stub.keyword.as_deref(), Some("IPX-156"));
        assert_eq!(stub.source, "javbus");
    }

    #[test]
    fn test_candidate_score_clamped() {
        let c = LinkCandidate::new("https://x.com/a", "A").with_score(250);
        assert_eq!(c.score, 100);
    }
}
