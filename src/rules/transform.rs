//! Ordered text transforms applied to extracted field values.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single transform step in a field rule's pipeline.
///
/// Patterns are stored as strings so rule tables stay serializable for
/// the offline tuning hook; a pattern that fails to compile makes its
/// step a no-op rather than failing the whole field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TextTransform {
    /// Replace every match of `pattern` with `replacement`.
    Replace { pattern: String, replacement: String },

    /// Trim surrounding whitespace.
    Trim,

    /// Upper-case the value.
    Uppercase,

    /// Lower-case the value.
    Lowercase,

    /// Keep only the given capture group of the first match; a value
    /// with no match becomes empty.
    Extract { pattern: String, group: usize },
}

impl TextTransform {
    /// Apply this transform to a value.
    pub fn apply(&self, value: &str) -> String {
        match self {
            Self::Replace {
                pattern,
                replacement,
            } => match Regex::new(pattern) {
                Ok(re) => re.replace_all(value, replacement.as_str()).into_owned(),
                Err(_) => value.to_string(),
            },
            Self::Trim => value.trim().to_string(),
            Self::Uppercase => value.to_uppercase(),
            Self::Lowercase => value.to_lowercase(),
            Self::Extract { pattern, group } => match Regex::new(pattern) {
                Ok(re) => re
                    .captures(value)
                    .and_then(|c| c.get(*group))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                Err(_) => value.to_string(),
            },
        }
    }
}

/// Run a transform pipeline in order.
pub fn apply_transforms(value: &str, transforms: &[TextTransform]) -> String {
    transforms
        .iter()
        .fold(value.to_string(), |acc, t| t.apply(&acc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_trim() {
        let out = apply_transforms(
            "  IPX-156 [HD]  ",
            &[
                TextTransform::Replace {
                    pattern: r"\[HD\]".into(),
                    replacement: "".into(),
                },
                TextTransform::Trim,
            ],
        );
        assert_eq!(out, "IPX-156");
    }

    #[test]
    fn test_extract_group() {
        let out = apply_transforms(
            "Release: 2021-04-17 (Japan)",
            &[TextTransform::Extract {
                pattern: r"(\d{4}-\d{2}-\d{2})".into(),
                group: 1,
            }],
        );
        assert_eq!(out, "2021-04-17");
    }

    #[test]
    fn test_extract_without_match_is_empty() {
        let out = apply_transforms(
            "no date",
            &[TextTransform::Extract {
                pattern: r"(\d{4}-\d{2}-\d{2})".into(),
                group: 1,
            }],
        );
        assert_eq!(out, "");
    }

    #[test]
    fn test_bad_pattern_is_noop() {
        let out = apply_transforms(
            "value",
            &[TextTransform::Replace {
                pattern: "[[[".into(),
                replacement: "x".into(),
            }],
        );
        assert_eq!(out, "value");
    }

    #[test]
    fn test_case_transforms() {
        assert_eq!(TextTransform::Uppercase.apply("ipx-156"), "IPX-156");
        assert_eq!(TextTransform::Lowercase.apply("IPX-156"), "ipx-156");
    }
}
