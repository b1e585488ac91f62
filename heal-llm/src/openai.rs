use crate::payload::RepairPayload;
use crate::prompts::{build_user_prompt, SYSTEM_PROMPT};
use crate::traits::SelectorRepairClient;
use crate::{http_to_heal, non_empty};
use async_trait::async_trait;
use heal_common::{HealError, Result};
use heal_http::{Auth, HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_BASE: &str = "https://api.openai.com/";

pub struct OpenAiRepairClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiRepairClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        Self::with_base_url(OPENAI_API_BASE, api_key, model, timeout)
    }

    /// Point the client at an OpenAI-compatible gateway or a mock server.
    pub fn with_base_url(
        base_url: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = HttpClient::new(base_url)
            .map_err(|e| HealError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(timeout);
        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl SelectorRepairClient for OpenAiRepairClient {
    async fn repair_selector(&self, payload: &RepairPayload) -> Result<String> {
        let user = build_user_prompt(payload)?;
        let req = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
        };
        tracing::debug!(target: "heal.llm", provider = "openai", model = %self.model, key = %payload.failed_element_key, "repair request");

        let resp: ChatResponse = self
            .client
            .post_json(
                "v1/chat/completions",
                &req,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.api_key)),
                    ..Default::default()
                },
            )
            .await
            .map_err(http_to_heal)?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| HealError::Provider("openai returned no choices".into()))?
            .message
            .content
            .unwrap_or_default();
        non_empty("openai", text)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
