//! Provider-neutral selector repair for the healing pipeline.
//!
//! This crate exposes the [`traits::SelectorRepairClient`] capability, the
//! explicit [`payload::RepairPayload`] schema, the fixed prompts, the
//! response parser, and one backend per provider. Backends are compiled
//! behind the `openai`, `anthropic`, `gemini` and `ollama` features.
//!
//! # Examples
//! ```no_run
//! use heal_common::{RepairConfig, Result};
//! use heal_llm::create_repair_client;
//! use heal_llm::traits::SelectorRepairClient;
//!
//! # fn main() -> Result<()> {
//! let cfg = RepairConfig::from_env();
//! let client = create_repair_client(&cfg)?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
pub mod parser;
pub mod payload;
pub mod prompts;
pub mod traits;

use heal_common::{HealError, RepairConfig, Result};
use heal_http::HttpError;
use std::sync::Arc;
use traits::SelectorRepairClient;

pub use parser::parse_selector_response;
pub use payload::{DomExcerpt, RepairPayload};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";

/// Build the backend named by `config.provider`.
///
/// Fails with [`HealError::Config`] when the provider is unknown or not
/// compiled in, and with [`HealError::Provider`] when its credential is
/// missing or malformed. Nothing is deferred to the first repair call.
pub fn create_repair_client(config: &RepairConfig) -> Result<Arc<dyn SelectorRepairClient>> {
    let provider = config.provider_name();
    let timeout = config.timeout();
    let model = |default: &str| config.model.clone().unwrap_or_else(|| default.to_string());

    let client: Arc<dyn SelectorRepairClient> = match provider.as_str() {
        #[cfg(feature = "openai")]
        "openai" => {
            let key = credential(config, "OPENAI_API_KEY", &provider)?;
            let model = model(DEFAULT_OPENAI_MODEL);
            Arc::new(match &config.base_url {
                Some(base) => openai::OpenAiRepairClient::with_base_url(base, key, model, timeout)?,
                None => openai::OpenAiRepairClient::new(key, model, timeout)?,
            })
        }
        #[cfg(feature = "anthropic")]
        "anthropic" => {
            let key = credential(config, "ANTHROPIC_API_KEY", &provider)?;
            let model = model(DEFAULT_ANTHROPIC_MODEL);
            Arc::new(match &config.base_url {
                Some(base) => {
                    anthropic::AnthropicRepairClient::with_base_url(base, key, model, timeout)?
                }
                None => anthropic::AnthropicRepairClient::new(key, model, timeout)?,
            })
        }
        #[cfg(feature = "gemini")]
        "gemini" => {
            let key = credential(config, "GEMINI_API_KEY", &provider)?;
            let model = model(DEFAULT_GEMINI_MODEL);
            Arc::new(match &config.base_url {
                Some(base) => gemini::GeminiRepairClient::with_base_url(base, key, model, timeout)?,
                None => gemini::GeminiRepairClient::new(key, model, timeout)?,
            })
        }
        #[cfg(feature = "ollama")]
        "ollama" => {
            let base = config
                .base_url
                .clone()
                .or_else(|| std::env::var("OLLAMA_BASE_URL").ok())
                .unwrap_or_else(|| ollama::DEFAULT_OLLAMA_URL.to_string());
            Arc::new(ollama::OllamaRepairClient::new(
                &base,
                model(DEFAULT_OLLAMA_MODEL),
                timeout,
            )?)
        }
        other => {
            return Err(HealError::Config(format!(
                "unsupported repair provider: {other}"
            )))
        }
    };

    tracing::info!(
        target: "heal.llm",
        provider = client.provider_name(),
        model = client.model_name(),
        "repair client ready"
    );
    Ok(client)
}

/// Explicit key, else the provider's env var; rejected here when missing or
/// unusable as a header value.
#[cfg(any(feature = "openai", feature = "anthropic", feature = "gemini"))]
fn credential(config: &RepairConfig, env_var: &str, provider: &str) -> Result<String> {
    let raw = config
        .api_key
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            HealError::Provider(format!(
                "{env_var} is required when LLM_PROVIDER={provider}"
            ))
        })?;
    heal_http::sanitize_api_key(&raw)
        .map_err(|e| HealError::Provider(format!("invalid {env_var} for {provider}: {e}")))
}

pub(crate) fn http_to_heal(e: HttpError) -> HealError {
    HealError::Provider(e.to_string())
}

pub(crate) fn non_empty(provider: &str, text: String) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(HealError::Provider(format!(
            "{provider} returned an empty response"
        )));
    }
    Ok(trimmed.to_string())
}
