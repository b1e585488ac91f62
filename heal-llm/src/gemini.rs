use crate::payload::RepairPayload;
use crate::prompts::{build_user_prompt, SYSTEM_PROMPT};
use crate::traits::SelectorRepairClient;
use crate::{http_to_heal, non_empty};
use async_trait::async_trait;
use heal_common::{HealError, Result};
use heal_http::{Auth, HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/";

pub struct GeminiRepairClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    system_instruction: Instruction<'a>,
    contents: [Content<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Instruction<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiRepairClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        Self::with_base_url(GEMINI_API_BASE, api_key, model, timeout)
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
impl SelectorRepairClient for GeminiRepairClient {
    async fn repair_selector(&self, payload: &RepairPayload) -> Result<String> {
        let user = build_user_prompt(payload)?;
        let req = GenerateContentRequest {
            system_instruction: Instruction {
                parts: [Part {
                    text: SYSTEM_PROMPT,
                }],
            },
            contents: [Content {
                role: "user",
                parts: [Part { text: &user }],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };
        tracing::debug!(target: "heal.llm", provider = "gemini", model = %self.model, key = %payload.failed_element_key, "repair request");

        let auth = Auth::header("x-goog-api-key", &self.api_key).map_err(http_to_heal)?;
        let path = format!("v1beta/models/{}:generateContent", self.model);
        let resp: GenerateContentResponse = self
            .client
            .post_json(
                &path,
                &req,
                RequestOpts {
                    auth: Some(auth),
                    ..Default::default()
                },
            )
            .await
            .map_err(http_to_heal)?;

        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| HealError::Provider("gemini returned no candidates".into()))?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        non_empty("gemini", text)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
