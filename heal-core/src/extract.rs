//! Candidate extraction from the live document.
use heal_common::dom::CandidateElement;
use heal_common::{HealError, Result};
use heal_drivers::BrowserDriver;
use serde_json::Value;

pub const MAX_CANDIDATES: usize = 80;
pub const MAX_TEXT_CHARS: usize = 200;

/// Enumerates interactive or labelled elements across the document and
/// every shadow root, in document order.
pub const COLLECT_CANDIDATES_SCRIPT: &str = r#"
const includeNode = (node) => {
  if (!(node instanceof Element)) return false;
  const tag = node.tagName.toLowerCase();
  if (["input", "button", "a", "select", "textarea"].includes(tag)) return true;
  if (node.hasAttribute("role")) return true;
  if (node.hasAttribute("data-testid")) return true;
  if (typeof node.onclick === "function") return true;
  return false;
};

const bestSelector = (node) => {
  const tag = node.tagName.toLowerCase();
  if (node.id) return `#${CSS.escape(node.id)}`;
  if (node.getAttribute("data-testid")) return `[data-testid="${node.getAttribute("data-testid")}"]`;
  if (node.getAttribute("name")) return `${tag}[name="${node.getAttribute("name")}"]`;
  if (node.classList.length) return `${tag}.${Array.from(node.classList).slice(0, 3).map((name) => CSS.escape(name)).join(".")}`;
  return tag;
};

const roots = [document];
for (let i = 0; i < roots.length; i++) {
  for (const node of roots[i].querySelectorAll("*")) {
    if (node.shadowRoot) roots.push(node.shadowRoot);
  }
}

const items = [];
for (const root of roots) {
  for (const node of root.querySelectorAll("*")) {
    if (!includeNode(node)) continue;
    const rect = node.getBoundingClientRect();
    const style = window.getComputedStyle(node);
    items.push({
      selector_hint: bestSelector(node),
      tag: node.tagName.toLowerCase(),
      text: (node.innerText || node.textContent || "").trim().slice(0, 200),
      attributes: Array.from(node.attributes).reduce((acc, attr) => {
        acc[attr.name] = attr.value;
        return acc;
      }, {}),
      parent_tag: node.parentElement ? node.parentElement.tagName.toLowerCase() : "",
      rect: {
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
      },
      styles: {
        color: style.color,
        backgroundColor: style.backgroundColor,
        display: style.display,
        visibility: style.visibility,
        zIndex: style.zIndex,
      },
    });
  }
}
return items.slice(0, 80);
"#;

#[derive(Debug, Default, Clone, Copy)]
pub struct CandidateExtractor;

impl CandidateExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Run the extraction script. Scores are left at zero.
    pub async fn extract<D: BrowserDriver>(&self, driver: &D) -> Result<Vec<CandidateElement>> {
        let raw = driver.execute_script(COLLECT_CANDIDATES_SCRIPT).await?;
        let candidates = decode_candidates(raw)?;
        tracing::debug!(target: "heal.extract", count = candidates.len(), "extracted candidates");
        Ok(candidates)
    }
}

fn decode_candidates(raw: Value) -> Result<Vec<CandidateElement>> {
    let mut candidates: Vec<CandidateElement> = match raw {
        Value::Null => Vec::new(),
        Value::Array(_) => serde_json::from_value(raw)?,
        other => {
            return Err(HealError::Healing(format!(
                "candidate extraction returned a non-array value: {other}"
            )))
        }
    };
    // Same limits as the script.
    candidates.truncate(MAX_CANDIDATES);
    for candidate in &mut candidates {
        if candidate.text.chars().count() > MAX_TEXT_CHARS {
            candidate.text = candidate.text.chars().take(MAX_TEXT_CHARS).collect();
        }
        candidate.heuristic_score = 0.0;
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncates_to_eighty_in_document_order() {
        let raw = Value::Array(
            (0..100)
                .map(|i| json!({"selector_hint": format!("#c{i}"), "tag": "button"}))
                .collect(),
        );
        let candidates = decode_candidates(raw).unwrap();
        assert_eq!(candidates.len(), MAX_CANDIDATES);
        assert_eq!(candidates[0].selector_hint, "#c0");
        assert_eq!(candidates[79].selector_hint, "#c79");
    }

    #[test]
    fn long_text_is_capped() {
        let raw = json!([{ "tag": "a", "text": "x".repeat(500) }]);
        let candidates = decode_candidates(raw).unwrap();
        assert_eq!(candidates[0].text.len(), MAX_TEXT_CHARS);
    }

    #[test]
    fn rejects_non_array_results() {
        assert!(decode_candidates(json!({"oops": true})).is_err());
        assert!(decode_candidates(Value::Null).unwrap().is_empty());
    }
}
