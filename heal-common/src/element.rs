//! Element definitions as declared by a test suite.
//!
//! An [`ElementDefinition`] is immutable once loaded, except that a consumer
//! may clear its fallback selectors for test isolation. Its
//! [`HistoricalMetadata`] is the fingerprint of the element when it was last
//! seen working and is only ever read by the scorer.
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Query engine a selector is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Css,
    Xpath,
}

impl SelectorKind {
    /// Classify a selector by its textual shape: a leading `/` or `(` is xpath.
    ///
    /// ```
    /// use heal_common::SelectorKind;
    ///
    /// assert_eq!(SelectorKind::infer("(//button)[1]"), SelectorKind::Xpath);
    /// assert_eq!(SelectorKind::infer("//div"), SelectorKind::Xpath);
    /// assert_eq!(SelectorKind::infer("#login-button"), SelectorKind::Css);
    /// ```
    pub fn infer(selector: &str) -> Self {
        let trimmed = selector.trim_start();
        if trimmed.starts_with('/') || trimmed.starts_with('(') {
            SelectorKind::Xpath
        } else {
            SelectorKind::Css
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::Css => "css",
            SelectorKind::Xpath => "xpath",
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Last known visual/structural fingerprint of an element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMetadata {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub parent_tag: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub size: Option<Size>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub neighbor_signature: Vec<String>,
    #[serde(default)]
    pub last_verified_at: Option<String>,
}

/// A logical UI element and the selectors that locate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDefinition {
    pub key: String,
    pub intended_role: String,
    pub selector_type: SelectorKind,
    pub selector: String,
    #[serde(default)]
    pub fallback_selectors: Vec<String>,
    #[serde(default)]
    pub historical_metadata: HistoricalMetadata,
}

impl ElementDefinition {
    /// Drop the declared fallbacks so a test exercises the primary selector alone.
    pub fn clear_fallbacks(&mut self) {
        self.fallback_selectors.clear();
    }
}

/// Resolves element keys to their definitions.
pub trait ConfigurationProvider: Send + Sync {
    /// Look up `key`, failing with [`crate::HealError::UnknownElement`].
    fn get_element(&self, key: &str) -> Result<&ElementDefinition>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_kind_deserializes_lowercase() {
        let kind: SelectorKind = serde_json::from_str("\"xpath\"").unwrap();
        assert_eq!(kind, SelectorKind::Xpath);
    }

    #[test]
    fn metadata_tolerates_sparse_input() {
        let meta: HistoricalMetadata =
            serde_json::from_str(r#"{"parent_tag":"form","color":"rgb(0, 0, 0)"}"#).unwrap();
        assert_eq!(meta.parent_tag, "form");
        assert!(meta.location.is_none());
        assert!(meta.neighbor_signature.is_empty());
    }
}
