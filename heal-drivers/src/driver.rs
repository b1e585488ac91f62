use async_trait::async_trait;
use heal_common::{HealError, SelectorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Classified failure reported by a browser session.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("no such element: {0}")]
    NoSuchElement(String),

    /// The expression is malformed for the query engine.
    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("stale element reference: {0}")]
    StaleElement(String),

    #[error("element click intercepted: {0}")]
    ClickIntercepted(String),

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("session error: {0}")]
    Session(#[from] anyhow::Error),
}

impl DriverError {
    /// Failures an action layer recovers from by re-resolving the element.
    pub fn is_stale_or_not_interactable(&self) -> bool {
        matches!(
            self,
            DriverError::StaleElement(_) | DriverError::NotInteractable(_)
        )
    }
}

impl From<DriverError> for HealError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::NoSuchElement(target) => HealError::NotFound {
                target,
                timeout: Duration::ZERO,
            },
            DriverError::InvalidSelector { selector, message } => {
                HealError::InvalidSelectorSyntax { selector, message }
            }
            DriverError::StaleElement(msg) => HealError::StaleReference(msg),
            DriverError::ClickIntercepted(msg) => HealError::Intercepted(msg),
            DriverError::NotInteractable(msg) => {
                HealError::Driver(anyhow::anyhow!("element not interactable: {msg}"))
            }
            DriverError::Script(msg) => HealError::Driver(anyhow::anyhow!("script error: {msg}")),
            DriverError::Session(e) => HealError::Driver(e),
        }
    }
}

/// A cookie as reported by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Primitive browser capability consumed by the healing pipeline.
///
/// Every query is a single round trip; polling and deadlines belong to the
/// caller.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Opaque live element handle.
    type Element: Clone + Send + Sync;

    /// All elements matching `expression` under `kind`, possibly none.
    async fn find_all(
        &self,
        kind: SelectorKind,
        expression: &str,
    ) -> Result<Vec<Self::Element>, DriverError>;

    /// Run `script` as a function body and return its JSON result.
    async fn execute_script(&self, script: &str) -> Result<Value, DriverError>;

    async fn page_source(&self) -> Result<String, DriverError>;

    /// Capture the viewport as PNG into `path`.
    async fn save_screenshot(&self, path: &Path) -> Result<(), DriverError>;

    async fn cookies(&self) -> Result<Vec<BrowserCookie>, DriverError>;

    async fn click(&self, element: &Self::Element) -> Result<(), DriverError>;

    async fn clear(&self, element: &Self::Element) -> Result<(), DriverError>;

    async fn send_keys(&self, element: &Self::Element, text: &str) -> Result<(), DriverError>;
}
