use std::sync::OnceLock;

use heal_common::dom::CandidateElement;
use heal_common::observability::{LogConfig, LogFormat};
use heal_common::{HistoricalMetadata, RepairMode};
use heal_llm::payload::{DomExcerpt, RepairPayload};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

#[allow(dead_code)]
pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "heal-tests",
            emit_stderr: true,
            format: LogFormat::from_env(),
            default_filter: "debug",
            ..LogConfig::default()
        };

        heal_common::observability::init_logging(config).unwrap_or_default()
    });
}

#[allow(dead_code)]
pub fn sample_payload() -> RepairPayload {
    let login = CandidateElement {
        selector_hint: "#signin".into(),
        tag: "button".into(),
        text: "Sign in".into(),
        parent_tag: "form".into(),
        heuristic_score: 72.5,
        ..Default::default()
    };
    RepairPayload {
        mode: RepairMode::TargetRepair,
        failed_element_key: "login_button".into(),
        old_selector: "#login-button".into(),
        failure_type: "timeout".into(),
        expected_role: "button".into(),
        historical_metadata: HistoricalMetadata {
            tag: Some("button".into()),
            parent_tag: "form".into(),
            ..Default::default()
        },
        dom_snippet: DomExcerpt::build("<form><button id=\"signin\">Sign in</button></form>", std::slice::from_ref(&login)),
        top_ranked_candidates: vec![login],
        mutation_events: vec![],
    }
}
