mod common;

use heal_common::HealError;
use heal_llm::anthropic::AnthropicRepairClient;
use heal_llm::gemini::GeminiRepairClient;
use heal_llm::ollama::OllamaRepairClient;
use heal_llm::openai::OpenAiRepairClient;
use heal_llm::prompts::SYSTEM_PROMPT;
use heal_llm::traits::SelectorRepairClient;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn last_body(requests: &[Request]) -> Value {
    let req = requests.last().expect("one request");
    serde_json::from_slice(&req.body).expect("json body")
}

#[tokio::test]
async fn openai_sends_pinned_temperature_and_reads_first_choice() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  #signin\n"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiRepairClient::with_base_url(
        &server.uri(),
        "sk-test".into(),
        "gpt-4o-mini".into(),
        TIMEOUT,
    )
    .unwrap();
    let text = client.repair_selector(&common::sample_payload()).await.unwrap();
    assert_eq!(text, "#signin");

    let body = last_body(&server.received_requests().await.unwrap());
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
    let user = body["messages"][1]["content"].as_str().unwrap();
    let parsed: Value = serde_json::from_str(user).unwrap();
    assert_eq!(parsed["failed_element_key"], "login_button");
    assert_eq!(parsed["mode"], "target_repair");
}

#[tokio::test]
async fn openai_empty_choices_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client =
        OpenAiRepairClient::with_base_url(&server.uri(), "sk".into(), "m".into(), TIMEOUT)
            .unwrap();
    let err = client
        .repair_selector(&common::sample_payload())
        .await
        .unwrap_err();
    assert!(matches!(err, HealError::Provider(_)), "got {err:?}");
}

#[tokio::test]
async fn http_failures_surface_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "invalid x-api-key"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client =
        AnthropicRepairClient::with_base_url(&server.uri(), "bad".into(), "m".into(), TIMEOUT)
            .unwrap();
    match client.repair_selector(&common::sample_payload()).await {
        Err(HealError::Provider(msg)) => assert!(msg.contains("invalid x-api-key")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn anthropic_uses_top_level_system_and_version_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"max_tokens": 128, "temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "button[name=\"login\"]"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnthropicRepairClient::with_base_url(
        &server.uri(),
        "sk-ant".into(),
        "claude-3-5-sonnet-latest".into(),
        TIMEOUT,
    )
    .unwrap();
    let text = client.repair_selector(&common::sample_payload()).await.unwrap();
    assert_eq!(text, "button[name=\"login\"]");

    let body = last_body(&server.received_requests().await.unwrap());
    assert_eq!(body["system"], SYSTEM_PROMPT);
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn gemini_joins_parts_of_first_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "g-key"))
        .and(body_partial_json(json!({"generationConfig": {"temperature": 0.0}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "//button"}, {"text": "[1]"}]}}]
        })))
        .mount(&server)
        .await;

    let client = GeminiRepairClient::with_base_url(
        &server.uri(),
        "g-key".into(),
        "gemini-2.5-flash".into(),
        TIMEOUT,
    )
    .unwrap();
    let text = client.repair_selector(&common::sample_payload()).await.unwrap();
    assert_eq!(text, "//button[1]");

    let body = last_body(&server.received_requests().await.unwrap());
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(body["system_instruction"]["parts"][0]["text"], SYSTEM_PROMPT);
}

#[tokio::test]
async fn gemini_without_candidates_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let client =
        GeminiRepairClient::with_base_url(&server.uri(), "k".into(), "m".into(), TIMEOUT)
            .unwrap();
    let err = client
        .repair_selector(&common::sample_payload())
        .await
        .unwrap_err();
    assert!(matches!(err, HealError::Provider(_)));
}

#[tokio::test]
async fn ollama_chat_disables_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": false, "options": {"temperature": 0.0}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "   "}
        })))
        .mount(&server)
        .await;

    let client = OllamaRepairClient::new(&server.uri(), "llama3.2:3b".into(), TIMEOUT).unwrap();
    let err = client
        .repair_selector(&common::sample_payload())
        .await
        .unwrap_err();
    assert!(matches!(err, HealError::Provider(msg) if msg.contains("empty")));
}
