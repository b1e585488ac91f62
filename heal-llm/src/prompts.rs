use crate::payload::RepairPayload;
use heal_common::Result;

/// Fixed instruction sent to every backend.
pub const SYSTEM_PROMPT: &str = "You repair Selenium selectors. Return exactly one valid selector string and nothing else.
Rules:
1. Use only elements present in the provided DOM snippet.
2. Do not invent tags, attributes, text, or hierarchy.
3. Prefer a CSS selector when it uniquely identifies the intended element.
4. If a CSS selector cannot safely identify the element, return a valid XPath.
5. Output must be a single line with no explanation, no quotes, no markdown, and no code fence.
6. If the target action is dismissing an overlay, return the selector for the dismiss/close control only.";

/// Deterministic, key-sorted rendering of the payload.
///
/// Going through `serde_json::Value` sorts object keys at every depth since
/// the map type is ordered.
pub fn build_user_prompt(payload: &RepairPayload) -> Result<String> {
    let value = serde_json::to_value(payload)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::DomExcerpt;
    use heal_common::{HistoricalMetadata, RepairMode};

    fn payload() -> RepairPayload {
        RepairPayload {
            mode: RepairMode::ObstacleRepair,
            failed_element_key: "login_button".into(),
            old_selector: "#login-button".into(),
            failure_type: "intercepted".into(),
            expected_role: "button".into(),
            historical_metadata: HistoricalMetadata::default(),
            top_ranked_candidates: vec![],
            dom_snippet: DomExcerpt::default(),
            mutation_events: vec![],
        }
    }

    #[test]
    fn prompt_is_stable_and_sorted() {
        let first = build_user_prompt(&payload()).unwrap();
        let second = build_user_prompt(&payload()).unwrap();
        assert_eq!(first, second);

        let dom = first.find("\"dom_snippet\"").unwrap();
        let role = first.find("\"expected_role\"").unwrap();
        let mode = first.find("\"mode\"").unwrap();
        assert!(dom < role && role < mode);
        assert!(first.contains("\"obstacle_repair\""));
    }

    #[test]
    fn system_prompt_is_one_selector_contract() {
        assert!(SYSTEM_PROMPT.contains("exactly one valid selector"));
        assert!(SYSTEM_PROMPT.contains("dismiss/close control"));
    }
}
