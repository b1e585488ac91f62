use crate::payload::RepairPayload;
use crate::prompts::{build_user_prompt, SYSTEM_PROMPT};
use crate::traits::SelectorRepairClient;
use crate::{http_to_heal, non_empty};
use async_trait::async_trait;
use heal_common::{HealError, Result};
use heal_http::{Auth, HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 128;

pub struct AnthropicRepairClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl AnthropicRepairClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        Self::with_base_url(ANTHROPIC_API_BASE, api_key, model, timeout)
    }

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
impl SelectorRepairClient for AnthropicRepairClient {
    async fn repair_selector(&self, payload: &RepairPayload) -> Result<String> {
        let user = build_user_prompt(payload)?;
        let req = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            system: SYSTEM_PROMPT,
            messages: [UserMessage {
                role: "user",
                content: &user,
            }],
        };
        tracing::debug!(target: "heal.llm", provider = "anthropic", model = %self.model, key = %payload.failed_element_key, "repair request");

        let mut headers = heal_http::HeaderMap::new();
        headers.insert(
            "anthropic-version",
            heal_http::HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        let auth = Auth::header("x-api-key", &self.api_key).map_err(http_to_heal)?;

        let resp: MessagesResponse = self
            .client
            .post_json(
                "v1/messages",
                &req,
                RequestOpts {
                    auth: Some(auth),
                    headers: Some(headers),
                    ..Default::default()
                },
            )
            .await
            .map_err(http_to_heal)?;

        if resp.content.is_empty() {
            return Err(HealError::Provider("anthropic returned no content".into()));
        }
        let text: String = resp.content.into_iter().map(|block| block.text).collect();
        non_empty("anthropic", text)
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
