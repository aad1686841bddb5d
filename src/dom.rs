//! Queryable document facade over `scraper`.
//!
//! The original system emulated a DOM with regex pattern matching; here a
//! real HTML parser backs the same contract: scoped selector queries that
//! degrade to "no elements found" on unsupported input, plus lazily derived
//! title/code/date hints with a fixed probe order that the search-page
//! extractor depends on.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Catalog code shape: 2-6 letters, optional dash, 3-6 digits.
pub static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([a-z]{2,6})-?(\d{3,6})\b").unwrap());

/// ISO-ish date shape (YYYY-MM-DD, with / tolerated).
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})[-/](\d{2})[-/](\d{2})\b").unwrap());

static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static TITLE_TAG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, .title, .video-title").unwrap());
static TITLE_DIV_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[class*="title"]"#).unwrap());

/// A parsed HTML document.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse raw HTML text. Never fails; malformed markup is repaired
    /// the way browsers repair it.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// All elements matching a CSS selector.
    ///
    /// An invalid selector yields an empty list rather than an error;
    /// callers treat empty results as expected.
    pub fn select(&self, selector: &str) -> Vec<Element<'_>> {
        let Some(sel) = parse_selector(selector) else {
            return Vec::new();
        };
        self.html.select(&sel).map(Element::new).collect()
    }

    /// First element matching a CSS selector.
    pub fn select_first(&self, selector: &str) -> Option<Element<'_>> {
        let sel = parse_selector(selector)?;
        self.html.select(&sel).next().map(Element::new)
    }

    /// Content of the document `<title>` tag, if present.
    pub fn title(&self) -> Option<String> {
        let text = self.select_first("title")?.text();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// A single element, scoped to its own subtree for nested queries.
#[derive(Clone, Copy)]
pub struct Element<'a> {
    inner: ElementRef<'a>,
}

impl<'a> Element<'a> {
    fn new(inner: ElementRef<'a>) -> Self {
        Self { inner }
    }

    /// Attribute value, if present.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.inner.value().attr(name)
    }

    /// Tag name of this element.
    pub fn tag(&self) -> &str {
        self.inner.value().name()
    }

    /// Tag-stripped, entity-decoded, whitespace-normalized text content.
    pub fn text(&self) -> String {
        let joined: String = self.inner.text().collect::<Vec<_>>().join(" ");
        normalize_whitespace(&joined)
    }

    /// Descendant elements matching a selector.
    pub fn select(&self, selector: &str) -> Vec<Element<'a>> {
        let Some(sel) = parse_selector(selector) else {
            return Vec::new();
        };
        self.inner.select(&sel).map(Element::new).collect()
    }

    /// First descendant matching a selector.
    pub fn select_first(&self, selector: &str) -> Option<Element<'a>> {
        let sel = parse_selector(selector)?;
        self.inner.select(&sel).next().map(Element::new)
    }

    /// Derived title using the fixed probe order:
    /// explicit `title` attribute, then image `title`/`alt`, then a
    /// nested title-like tag, then a class-named title div.
    pub fn title_hint(&self) -> Option<String> {
        if let Some(t) = self.attr("title").map(normalize_whitespace) {
            if !t.is_empty() {
                return Some(t);
            }
        }
        for img in self.inner.select(&IMG_SELECTOR) {
            for attr in ["title", "alt"] {
                if let Some(t) = img.value().attr(attr).map(normalize_whitespace) {
                    if !t.is_empty() {
                        return Some(t);
                    }
                }
            }
        }
        if let Some(el) = self.inner.select(&TITLE_TAG_SELECTOR).next() {
            let t = Element::new(el).text();
            if !t.is_empty() {
                return Some(t);
            }
        }
        if let Some(el) = self.inner.select(&TITLE_DIV_SELECTOR).next() {
            let t = Element::new(el).text();
            if !t.is_empty() {
                return Some(t);
            }
        }
        None
    }

    /// Catalog code derived from the title hint, falling back to the
    /// element's own text.
    pub fn code_hint(&self) -> Option<String> {
        if let Some(title) = self.title_hint() {
            if let Some(code) = extract_code(&title) {
                return Some(code);
            }
        }
        extract_code(&self.text())
    }

    /// First date-shaped string in the element's text.
    pub fn date_hint(&self) -> Option<String> {
        let text = self.text();
        DATE_RE
            .captures(&text)
            .map(|c| format!("{}-{}-{}", &c[1], &c[2], &c[3]))
    }

    /// Raw inner markup (diagnostics only).
    pub fn inner_html(&self) -> String {
        self.inner.inner_html()
    }
}

/// Normalize a catalog code to `LETTERS-DIGITS`, upper-cased.
pub fn extract_code(text: &str) -> Option<String> {
    CODE_RE
        .captures(text)
        .map(|c| format!("{}-{}", c[1].to_uppercase(), &c[2]))
}

fn parse_selector(selector: &str) -> Option<Selector> {
    Selector::parse(selector).ok()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>IPX-156 Sample Page</title></head>
        <body>
            <div class="item">
                <a href="/IPX-156" title="IPX-156 Full Title">
                    <img src="/cover.jpg" alt="IPX-156 alt text">
                </a>
                <span class="date">2021-04-17</span>
            </div>
            <div class="movie-box">
                <img src="/c2.jpg" title="ABP-123 Something">
                <div class="photo-info"><span>ABP-123 Something</span></div>
            </div>
        </body></html>
    "#;

    #[test]
    fn test_document_title() {
        let doc = Document::parse(PAGE);
        assert_eq!(doc.title().as_deref(), Some("IPX-156 Sample Page"));
    }

    #[test]
    fn test_select_and_scoped_select() {
        let doc = Document::parse(PAGE);
        let items = doc.select("div.item");
        assert_eq!(items.len(), 1);

        let anchors = items[0].select("a");
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].attr("href"), Some("/IPX-156"));
    }

    #[test]
    fn test_invalid_selector_degrades_to_empty() {
        let doc = Document::parse(PAGE);
        assert!(doc.select("div[[[").is_empty());
        assert!(doc.select_first(":::nope").is_none());
    }

    #[test]
    fn test_title_hint_prefers_title_attribute() {
        let doc = Document::parse(PAGE);
        let anchor = doc.select_first("div.item a").unwrap();
        assert_eq!(anchor.title_hint().as_deref(), Some("IPX-156 Full Title"));
    }

    #[test]
    fn test_title_hint_falls_back_to_image() {
        let doc = Document::parse(PAGE);
        let boxed = doc.select_first("div.movie-box").unwrap();
        assert_eq!(boxed.title_hint().as_deref(), Some("ABP-123 Something"));
    }

    #[test]
    fn test_code_hint() {
        let doc = Document::parse(PAGE);
        let anchor = doc.select_first("div.item a").unwrap();
        assert_eq!(anchor.code_hint().as_deref(), Some("IPX-156"));
    }

    #[test]
    fn test_date_hint() {
        let doc = Document::parse(PAGE);
        let item = doc.select_first("div.item").unwrap();
        assert_eq!(item.date_hint().as_deref(), Some("2021-04-17"));
    }

    #[test]
    fn test_extract_code_shapes() {
        assert_eq!(extract_code("IPX156 no dash").as_deref(), Some("IPX-156"));
        assert_eq!(extract_code("ipx-156 lower").as_deref(), Some("IPX-156"));
        assert_eq!(extract_code("watch stc-872 online").as_deref(), Some("STC-872"));
        assert_eq!(extract_code("no code here"), None);
        // Digit run too short
        assert_eq!(extract_code("AB-12"), None);
    }

    #[test]
    fn test_text_is_whitespace_normalized() {
        let doc = Document::parse("<p>  a\n   b\t c  </p>");
        let p = doc.select_first("p").unwrap();
        assert_eq!(p.text(), "a b c");
    }
}
