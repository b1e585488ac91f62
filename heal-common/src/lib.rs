//! Common types and utilities shared across the heal crates.
//!
//! This crate defines the element model, the in-page wire types, repair
//! backend settings, observability helpers, and the shared error taxonomy
//! used throughout the workspace. It is intentionally lightweight so that
//! every crate can depend on it without heavy transitive costs.
//!
//! # Overview
//!
//! - [`element`]: element definitions, historical metadata and the
//!   [`element::ConfigurationProvider`] seam
//! - [`dom`]: candidate descriptors and mutation events produced in-page
//! - [`RepairConfig`]: provider‑neutral AI repair backend settings
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`HealError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use heal_common::{FailureKind, RepairMode};
//!
//! assert_eq!(RepairMode::TargetRepair.as_str(), "target_repair");
//! assert_eq!(FailureKind::Intercepted.to_string(), "intercepted");
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod dom;
pub mod element;
pub mod observability;

pub use element::{
    ConfigurationProvider, ElementDefinition, HistoricalMetadata, Location, SelectorKind, Size,
};

/// Default request timeout for a single repair call.
pub const DEFAULT_REPAIR_TIMEOUT_SECS: u64 = 30;

/// Why a resolution or action failed before healing was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A selector was syntactically unusable and nothing else matched.
    NotFound,
    /// No candidate selector matched before the deadline.
    Timeout,
    /// The element reference was invalidated by a DOM mutation.
    StaleReference,
    /// A pointer event was blocked by another element.
    Intercepted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "not_found",
            FailureKind::Timeout => "timeout",
            FailureKind::StaleReference => "stale_reference",
            FailureKind::Intercepted => "intercepted",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the AI backend is asked to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairMode {
    /// The element itself is missing or stale.
    TargetRepair,
    /// A click was intercepted; locate the control that dismisses the obstacle.
    ObstacleRepair,
}

impl RepairMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairMode::TargetRepair => "target_repair",
            RepairMode::ObstacleRepair => "obstacle_repair",
        }
    }
}

impl fmt::Display for RepairMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for the AI backend used to repair selectors.
///
/// The provider name is kept as free text so that an unknown backend is
/// rejected loudly by the factory in `heal-llm` rather than at parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_repair_timeout")]
    pub timeout_seconds: u64,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_repair_timeout() -> u64 {
    DEFAULT_REPAIR_TIMEOUT_SECS
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            base_url: None,
            timeout_seconds: DEFAULT_REPAIR_TIMEOUT_SECS,
        }
    }
}

impl RepairConfig {
    /// Build settings from `LLM_PROVIDER` and `<PROVIDER>_MODEL`.
    ///
    /// The credential is deliberately left unset here; the factory resolves
    /// it from the provider's own environment variable at construction time.
    ///
    /// ```
    /// use heal_common::RepairConfig;
    ///
    /// let cfg = RepairConfig::from_env();
    /// assert!(!cfg.provider.is_empty());
    /// ```
    pub fn from_env() -> Self {
        let provider = std::env::var("LLM_PROVIDER")
            .map(|p| p.trim().to_lowercase())
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(default_provider);
        let model = std::env::var(format!("{}_MODEL", provider.to_uppercase()))
            .ok()
            .filter(|m| !m.trim().is_empty());
        Self {
            provider,
            model,
            ..Self::default()
        }
    }

    /// Normalised provider name used for dispatch.
    pub fn provider_name(&self) -> String {
        self.provider.trim().to_lowercase()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

/// Distinguishable reasons an AI-proposed selector was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    Empty,
    Multiline,
    Fenced,
    InvalidSyntax(String),
    NoMatch,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::Empty => f.write_str("repair response was empty"),
            ValidationFailure::Multiline => f.write_str("repair response spanned multiple lines"),
            ValidationFailure::Fenced => {
                f.write_str("repair response contained a markdown fence instead of a selector")
            }
            ValidationFailure::InvalidSyntax(msg) => {
                write!(f, "repaired selector is not valid for the query engine: {msg}")
            }
            ValidationFailure::NoMatch => f.write_str("repaired selector matched no live element"),
        }
    }
}

/// Error types used across the healing pipeline.
#[derive(thiserror::Error, Debug)]
pub enum HealError {
    /// No candidate selector matched before the deadline.
    #[error("element not found: {target} (waited {}ms)", .timeout.as_millis())]
    NotFound { target: String, timeout: Duration },

    /// The element reference was invalidated by a DOM mutation.
    #[error("stale element reference: {0}")]
    StaleReference(String),

    /// A pointer event was blocked by another element.
    #[error("click intercepted: {0}")]
    Intercepted(String),

    /// A selector is malformed for the query engine.
    #[error("invalid selector `{selector}`: {message}")]
    InvalidSelectorSyntax { selector: String, message: String },

    /// The AI output was unusable or did not match the live document.
    #[error("selector validation failed: {0}")]
    SelectorValidation(ValidationFailure),

    /// AI transport/HTTP failure, missing credential, or empty response.
    #[error("repair provider error: {0}")]
    Provider(String),

    /// Any other failure raised while healing.
    #[error("healing failed: {0}")]
    Healing(String),

    /// An element key is not defined in the suite.
    #[error("unknown element key: {0}")]
    UnknownElement(String),

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A driver (browser session) reported an error.
    #[error("driver error: {0}")]
    Driver(#[from] anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl HealError {
    /// Whether the error is one of the healing-time failures that must be
    /// surfaced to the caller after the attempt is audited.
    pub fn is_healing_failure(&self) -> bool {
        matches!(
            self,
            HealError::SelectorValidation(_) | HealError::Provider(_) | HealError::Healing(_)
        )
    }
}

/// Convenient alias for results that use [`HealError`].
pub type Result<T> = std::result::Result<T, HealError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_config_reads_provider_and_model_from_env() {
        temp_env::with_vars(
            [
                ("LLM_PROVIDER", Some(" Gemini ")),
                ("GEMINI_MODEL", Some("gemini-test")),
            ],
            || {
                let cfg = RepairConfig::from_env();
                assert_eq!(cfg.provider, "gemini");
                assert_eq!(cfg.model.as_deref(), Some("gemini-test"));
                assert!(cfg.api_key.is_none());
            },
        );
    }

    #[test]
    fn repair_config_defaults_to_openai() {
        temp_env::with_var_unset("LLM_PROVIDER", || {
            let cfg = RepairConfig::from_env();
            assert_eq!(cfg.provider_name(), "openai");
            assert_eq!(cfg.timeout(), Duration::from_secs(30));
        });
    }

    #[test]
    fn validation_failures_render_distinct_notes() {
        let multiline = HealError::SelectorValidation(ValidationFailure::Multiline).to_string();
        let no_match = HealError::SelectorValidation(ValidationFailure::NoMatch).to_string();
        assert_ne!(multiline, no_match);
        assert!(no_match.contains("no live element"));
    }
}
