//! Explicit schema for the structured failure context sent to a backend.
use heal_common::dom::{CandidateElement, MutationEvent};
use heal_common::{HistoricalMetadata, RepairMode};
use serde::{Deserialize, Serialize};

/// Number of ranked candidates forwarded to the backend.
pub const TOP_CANDIDATES: usize = 5;
/// Number of trailing mutation events forwarded to the backend.
pub const MAX_MUTATION_EVENTS: usize = 20;
/// Characters of raw page source kept in the excerpt.
pub const PAGE_SOURCE_EXCERPT_CHARS: usize = 6000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPayload {
    pub mode: RepairMode,
    pub failed_element_key: String,
    pub old_selector: String,
    pub failure_type: String,
    pub expected_role: String,
    pub historical_metadata: HistoricalMetadata,
    pub top_ranked_candidates: Vec<CandidateElement>,
    pub dom_snippet: DomExcerpt,
    pub mutation_events: Vec<MutationEvent>,
}

/// Summary of the document the backend is allowed to pick from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomExcerpt {
    pub candidate_hints: Vec<String>,
    pub candidate_tags: Vec<String>,
    pub page_source_excerpt: String,
}

impl DomExcerpt {
    /// Summarise `candidates` and keep the head of `page_source`.
    ///
    /// ```
    /// use heal_common::dom::CandidateElement;
    /// use heal_llm::payload::DomExcerpt;
    ///
    /// let button = CandidateElement {
    ///     selector_hint: "#login".into(),
    ///     tag: "button".into(),
    ///     ..Default::default()
    /// };
    /// let excerpt = DomExcerpt::build("<html></html>", &[button]);
    /// assert_eq!(excerpt.candidate_hints, vec!["#login"]);
    /// assert_eq!(excerpt.page_source_excerpt, "<html></html>");
    /// ```
    pub fn build(page_source: &str, candidates: &[CandidateElement]) -> Self {
        Self {
            candidate_hints: candidates.iter().map(|c| c.selector_hint.clone()).collect(),
            candidate_tags: candidates.iter().map(|c| c.tag.clone()).collect(),
            page_source_excerpt: page_source.chars().take(PAGE_SOURCE_EXCERPT_CHARS).collect(),
        }
    }
}

/// Keep only the most recent `MAX_MUTATION_EVENTS` events, preserving order.
pub fn recent_mutations(events: &[MutationEvent]) -> Vec<MutationEvent> {
    let start = events.len().saturating_sub(MAX_MUTATION_EVENTS);
    events[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates_by_characters() {
        let source = "é".repeat(PAGE_SOURCE_EXCERPT_CHARS + 10);
        let excerpt = DomExcerpt::build(&source, &[]);
        assert_eq!(excerpt.page_source_excerpt.chars().count(), PAGE_SOURCE_EXCERPT_CHARS);
    }

    #[test]
    fn keeps_last_twenty_mutations() {
        let events: Vec<MutationEvent> = (0..25)
            .map(|i| MutationEvent {
                kind: "childList".into(),
                timestamp: i as f64,
                ..Default::default()
            })
            .collect();
        let recent = recent_mutations(&events);
        assert_eq!(recent.len(), MAX_MUTATION_EVENTS);
        assert_eq!(recent[0].timestamp, 5.0);
        assert_eq!(recent[19].timestamp, 24.0);
    }
}
