//! In-page mutation buffer.
//!
//! The two scripts below are a wire contract with the browser: the buffer
//! lives at `window.__heal_events__`, holds at most [`MUTATION_BUFFER_CAP`]
//! events (oldest dropped first) and every event carries `type`,
//! `targetTag`, `addedCount`, `removedCount`, `attributeName`, `root` and
//! `timestamp`.
use heal_common::dom::MutationEvent;
use heal_common::{HealError, Result};
use heal_drivers::BrowserDriver;
use serde_json::Value;

pub const MUTATION_BUFFER_CAP: usize = 200;

/// Idempotent: guarded by `window.__heal_observer_installed__`.
pub const INSTALL_MONITOR_SCRIPT: &str = r#"
if (!window.__heal_events__) {
  window.__heal_events__ = [];
}

if (!window.__heal_observer_installed__) {
  const pushEvent = (mutation, rootLabel) => {
    window.__heal_events__.push({
      type: mutation.type,
      targetTag: mutation.target && mutation.target.tagName ? mutation.target.tagName.toLowerCase() : "",
      addedCount: mutation.addedNodes ? mutation.addedNodes.length : 0,
      removedCount: mutation.removedNodes ? mutation.removedNodes.length : 0,
      attributeName: mutation.attributeName || "",
      root: rootLabel,
      timestamp: Date.now(),
    });
    if (window.__heal_events__.length > 200) {
      window.__heal_events__ = window.__heal_events__.slice(-200);
    }
  };

  const observed = new WeakSet();
  const observeRoot = (root, label) => {
    if (observed.has(root)) return;
    observed.add(root);
    const observer = new MutationObserver((mutations) => {
      for (const mutation of mutations) {
        pushEvent(mutation, label);
        if (mutation.type === "childList") {
          for (const node of mutation.addedNodes) {
            if (!(node instanceof Element)) continue;
            if (node.shadowRoot) {
              observeRoot(node.shadowRoot, node.tagName.toLowerCase());
            }
            for (const child of node.querySelectorAll("*")) {
              if (child.shadowRoot) {
                observeRoot(child.shadowRoot, child.tagName.toLowerCase());
              }
            }
          }
        }
      }
    });
    observer.observe(root, {
      attributes: true,
      childList: true,
      subtree: true,
    });
    for (const node of root.querySelectorAll("*")) {
      if (node.shadowRoot) {
        observeRoot(node.shadowRoot, node.tagName.toLowerCase());
      }
    }
  };

  observeRoot(document, "document");
  window.__heal_observer_installed__ = true;
}
"#;

/// Returns the buffered events and empties the buffer in one step.
pub const FLUSH_EVENTS_SCRIPT: &str = r#"
const events = window.__heal_events__ || [];
window.__heal_events__ = [];
return events;
"#;

/// Installs and drains the browser-side mutation buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct DomMutationMonitor;

impl DomMutationMonitor {
    pub fn new() -> Self {
        Self
    }

    pub async fn install<D: BrowserDriver>(&self, driver: &D) -> Result<()> {
        driver.execute_script(INSTALL_MONITOR_SCRIPT).await?;
        Ok(())
    }

    /// Drain buffered events in arrival order. An empty or missing buffer
    /// yields an empty vector.
    pub async fn flush_events<D: BrowserDriver>(&self, driver: &D) -> Result<Vec<MutationEvent>> {
        let raw = driver.execute_script(FLUSH_EVENTS_SCRIPT).await?;
        let events = decode_events(raw)?;
        tracing::debug!(target: "heal.monitor", count = events.len(), "flushed mutation events");
        Ok(events)
    }
}

fn decode_events(raw: Value) -> Result<Vec<MutationEvent>> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => Ok(serde_json::from_value(raw)?),
        other => Err(HealError::Healing(format!(
            "mutation buffer returned a non-array value: {other}"
        ))),
    }
}
