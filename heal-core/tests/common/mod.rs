#![allow(dead_code)]

use async_trait::async_trait;
use heal_common::dom::{CandidateElement, MutationEvent};
use heal_common::observability::{LogConfig, LogFormat};
use heal_common::{
    ConfigurationProvider, ElementDefinition, HealError, HistoricalMetadata, Result,
    SelectorKind,
};
use heal_core::extract::COLLECT_CANDIDATES_SCRIPT;
use heal_core::monitor::{FLUSH_EVENTS_SCRIPT, INSTALL_MONITOR_SCRIPT};
use heal_core::{
    ArtifactStore, AuditLog, HealingCoordinator, ResolverSettings, SafeActions, SelectorResolver,
};
use heal_drivers::{BrowserCookie, BrowserDriver, DriverError};
use heal_llm::payload::RepairPayload;
use heal_llm::traits::SelectorRepairClient;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FAST: ResolverSettings = ResolverSettings {
    default_timeout: Duration::from_millis(60),
    poll_interval: Duration::from_millis(10),
};

/// Element handle in the fake document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement(pub String);

#[derive(Default)]
struct FakeState {
    matches: HashMap<String, Vec<String>>,
    delayed: HashMap<String, (usize, Vec<String>)>,
    invalid: HashSet<String>,
    candidates: Vec<CandidateElement>,
    mutations: Vec<MutationEvent>,
    pending_mutations: Vec<MutationEvent>,
    page_source: String,
    click_failures: HashMap<String, VecDeque<DriverError>>,
    input_failures: HashMap<String, VecDeque<DriverError>>,
    queries: Vec<String>,
    clicks: Vec<String>,
    typed: Vec<(String, String)>,
    cleared: Vec<String>,
    installs: usize,
}

/// In-memory document answering selector queries from a lookup table.
#[derive(Default)]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new() -> Self {
        let driver = Self::default();
        driver.state().page_source = "<html><body><form></form></body></html>".into();
        driver
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_match(self, selector: &str, ids: &[&str]) -> Self {
        self.set_match(selector, ids);
        self
    }

    pub fn set_match(&self, selector: &str, ids: &[&str]) {
        self.state()
            .matches
            .insert(selector.into(), ids.iter().map(|s| s.to_string()).collect());
    }

    /// `selector` starts matching once it has been queried `misses` times.
    pub fn with_match_after(self, selector: &str, misses: usize, ids: &[&str]) -> Self {
        self.state().delayed.insert(
            selector.into(),
            (misses, ids.iter().map(|s| s.to_string()).collect()),
        );
        self
    }

    pub fn remove_match(&self, selector: &str) {
        self.state().matches.remove(selector);
    }

    pub fn with_invalid(self, selector: &str) -> Self {
        self.state().invalid.insert(selector.into());
        self
    }

    pub fn with_candidates(self, candidates: Vec<CandidateElement>) -> Self {
        self.state().candidates = candidates;
        self
    }

    /// Events that land in the page buffer on the first selector query.
    pub fn mutating_on_query(self, events: Vec<MutationEvent>) -> Self {
        self.state().pending_mutations = events;
        self
    }

    pub fn fail_click_once(self, id: &str, error: DriverError) -> Self {
        self.state()
            .click_failures
            .entry(id.into())
            .or_default()
            .push_back(error);
        self
    }

    pub fn fail_input_once(self, id: &str, error: DriverError) -> Self {
        self.state()
            .input_failures
            .entry(id.into())
            .or_default()
            .push_back(error);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    pub fn clear_queries(&self) {
        self.state().queries.clear();
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state().clicks.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state().typed.clone()
    }

    pub fn cleared(&self) -> Vec<String> {
        self.state().cleared.clone()
    }

    pub fn installs(&self) -> usize {
        self.state().installs
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    type Element = FakeElement;

    async fn find_all(
        &self,
        _kind: SelectorKind,
        expression: &str,
    ) -> std::result::Result<Vec<FakeElement>, DriverError> {
        let mut state = self.state();
        state.queries.push(expression.to_string());
        let pending = std::mem::take(&mut state.pending_mutations);
        state.mutations.extend(pending);
        let ready = match state.delayed.get_mut(expression) {
            Some((0, _)) => true,
            Some((misses, _)) => {
                *misses -= 1;
                false
            }
            None => false,
        };
        if ready {
            if let Some((_, ids)) = state.delayed.remove(expression) {
                state.matches.insert(expression.to_string(), ids);
            }
        }
        if state.invalid.contains(expression) {
            return Err(DriverError::InvalidSelector {
                selector: expression.to_string(),
                message: "invalid selector".into(),
            });
        }
        Ok(state
            .matches
            .get(expression)
            .map(|ids| ids.iter().cloned().map(FakeElement).collect())
            .unwrap_or_default())
    }

    async fn execute_script(&self, script: &str) -> std::result::Result<Value, DriverError> {
        let mut state = self.state();
        if script == INSTALL_MONITOR_SCRIPT {
            state.installs += 1;
            Ok(Value::Null)
        } else if script == FLUSH_EVENTS_SCRIPT {
            let events = std::mem::take(&mut state.mutations);
            Ok(serde_json::to_value(events).unwrap())
        } else if script == COLLECT_CANDIDATES_SCRIPT {
            Ok(serde_json::to_value(&state.candidates).unwrap())
        } else {
            Err(DriverError::Script(format!("unexpected script: {script}")))
        }
    }

    async fn page_source(&self) -> std::result::Result<String, DriverError> {
        Ok(self.state().page_source.clone())
    }

    async fn save_screenshot(&self, path: &Path) -> std::result::Result<(), DriverError> {
        std::fs::write(path, b"\x89PNG").map_err(|e| DriverError::Session(e.into()))
    }

    async fn cookies(&self) -> std::result::Result<Vec<BrowserCookie>, DriverError> {
        Ok(vec![])
    }

    async fn click(&self, element: &FakeElement) -> std::result::Result<(), DriverError> {
        let mut state = self.state();
        if let Some(err) = state
            .click_failures
            .get_mut(&element.0)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        state.clicks.push(element.0.clone());
        Ok(())
    }

    async fn clear(&self, element: &FakeElement) -> std::result::Result<(), DriverError> {
        let mut state = self.state();
        if let Some(err) = state
            .input_failures
            .get_mut(&element.0)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        state.cleared.push(element.0.clone());
        Ok(())
    }

    async fn send_keys(
        &self,
        element: &FakeElement,
        text: &str,
    ) -> std::result::Result<(), DriverError> {
        self.state()
            .typed
            .push((element.0.clone(), text.to_string()));
        Ok(())
    }
}

/// Repair backend returning scripted responses in order.
pub struct FakeRepairClient {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    payloads: Mutex<Vec<RepairPayload>>,
}

impl FakeRepairClient {
    pub fn replying(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|r| Ok(r.to_string())).collect()),
            payloads: Mutex::new(vec![]),
        })
    }

    pub fn failing(times: usize) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(
                (0..times)
                    .map(|_| Err("upstream rate limited".to_string()))
                    .collect(),
            ),
            payloads: Mutex::new(vec![]),
        })
    }

    pub fn payloads(&self) -> Vec<RepairPayload> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl SelectorRepairClient for FakeRepairClient {
    async fn repair_selector(&self, payload: &RepairPayload) -> Result<String> {
        self.payloads.lock().unwrap().push(payload.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(HealError::Provider(msg)),
            None => Err(HealError::Provider("no scripted response left".into())),
        }
    }

    fn provider_name(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Minimal suite backed by a vector.
pub struct Suite(pub Vec<ElementDefinition>);

impl ConfigurationProvider for Suite {
    fn get_element(&self, key: &str) -> Result<&ElementDefinition> {
        self.0
            .iter()
            .find(|e| e.key == key)
            .ok_or_else(|| HealError::UnknownElement(key.to_string()))
    }
}

impl Suite {
    pub fn clear_fallbacks(&mut self, key: &str) {
        if let Some(element) = self.0.iter_mut().find(|e| e.key == key) {
            element.clear_fallbacks();
        }
    }
}

pub fn element(key: &str, selector: &str, fallbacks: &[&str]) -> ElementDefinition {
    ElementDefinition {
        key: key.into(),
        intended_role: "button".into(),
        selector_type: SelectorKind::infer(selector),
        selector: selector.into(),
        fallback_selectors: fallbacks.iter().map(|s| s.to_string()).collect(),
        historical_metadata: HistoricalMetadata::default(),
    }
}

pub fn resolver(
    driver: Arc<FakeDriver>,
    suite: Suite,
    client: Arc<FakeRepairClient>,
    root: &Path,
) -> SelectorResolver<FakeDriver, Suite> {
    resolver_with(driver, suite, client, root, FAST)
}

pub fn resolver_with(
    driver: Arc<FakeDriver>,
    suite: Suite,
    client: Arc<FakeRepairClient>,
    root: &Path,
    settings: ResolverSettings,
) -> SelectorResolver<FakeDriver, Suite> {
    let coordinator = HealingCoordinator::new(
        client,
        ArtifactStore::new(root).unwrap(),
        AuditLog::open(root).unwrap(),
    );
    SelectorResolver::new(driver, suite, coordinator, settings).unwrap()
}

pub fn actions(
    driver: Arc<FakeDriver>,
    suite: Suite,
    client: Arc<FakeRepairClient>,
    root: &Path,
) -> SafeActions<FakeDriver, Suite> {
    SafeActions::new(resolver(driver, suite, client, root))
}

pub fn candidate(hint: &str, tag: &str, text: &str, attrs: &[(&str, &str)]) -> CandidateElement {
    CandidateElement {
        selector_hint: hint.into(),
        tag: tag.into(),
        text: text.into(),
        attributes: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        parent_tag: "form".into(),
        ..CandidateElement::default()
    }
}

pub fn init_tracing() {
    static INIT: std::sync::OnceLock<std::path::PathBuf> = std::sync::OnceLock::new();
    INIT.get_or_init(|| {
        let config = LogConfig {
            app_name: "heal-core-tests",
            emit_stderr: true,
            format: LogFormat::from_env(),
            default_filter: "debug",
            ..LogConfig::default()
        };
        heal_common::observability::init_logging(config).unwrap_or_default()
    });
}
