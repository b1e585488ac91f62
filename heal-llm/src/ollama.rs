use crate::payload::RepairPayload;
use crate::prompts::{build_user_prompt, SYSTEM_PROMPT};
use crate::traits::SelectorRepairClient;
use crate::{http_to_heal, non_empty};
use async_trait::async_trait;
use heal_common::{HealError, Result};
use heal_http::{HttpClient, HttpError, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Local model backend; needs no credential.
///
/// Expects a running Ollama server with the model already pulled.
pub struct OllamaRepairClient {
    client: HttpClient,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    options: Options,
    messages: [Message<'a>; 2],
}

#[derive(Serialize)]
struct Options {
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaRepairClient {
    pub fn new(base_url: &str, model: String, timeout: Duration) -> Result<Self> {
        let client = HttpClient::new(base_url)
            .map_err(|e| HealError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(timeout);
        Ok(Self { client, model })
    }
}

#[async_trait]
impl SelectorRepairClient for OllamaRepairClient {
    async fn repair_selector(&self, payload: &RepairPayload) -> Result<String> {
        let user = build_user_prompt(payload)?;
        let req = ChatRequest {
            model: &self.model,
            stream: false,
            options: Options { temperature: 0.0 },
            messages: [
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: &user,
                },
            ],
        };
        tracing::debug!(target: "heal.llm", provider = "ollama", model = %self.model, key = %payload.failed_element_key, "repair request");

        let resp: ChatResponse = self
            .client
            .post_json("api/chat", &req, RequestOpts::default())
            .await
            .map_err(|e| match e {
                HttpError::Network(_) => HealError::Provider(OLLAMA_CONNECTION_ERROR.to_string()),
                other => http_to_heal(other),
            })?;

        let text = resp.message.map(|m| m.content).unwrap_or_default();
        non_empty("ollama", text)
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
