//! Wire types returned by the in-page scripts.
//!
//! Field names here are part of the browser protocol and must match what the
//! mutation buffer and the candidate extraction scripts emit.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bounding rectangle reported by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

/// Computed-style subset captured for each candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateStyles {
    #[serde(default)]
    pub color: String,
    #[serde(default, rename = "backgroundColor")]
    pub background_color: String,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default, rename = "zIndex")]
    pub z_index: String,
}

/// An element descriptor extracted from the live document during one heal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateElement {
    #[serde(default)]
    pub selector_hint: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub parent_tag: String,
    #[serde(default)]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub styles: CandidateStyles,
    #[serde(default)]
    pub heuristic_score: f64,
}

impl CandidateElement {
    pub fn class_attr(&self) -> &str {
        self.attributes.get("class").map(String::as_str).unwrap_or("")
    }
}

/// One buffered DOM mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEvent {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub target_tag: String,
    #[serde(default)]
    pub added_count: u64,
    #[serde(default)]
    pub removed_count: u64,
    #[serde(default)]
    pub attribute_name: String,
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub timestamp: f64,
}
