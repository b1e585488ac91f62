//! One healing attempt: capture, score, ask, validate, persist, audit.
use crate::artifacts::ArtifactStore;
use crate::audit::{AttemptContext, AuditLog, HealAttempt, OverrideMap};
use crate::extract::CandidateExtractor;
use crate::monitor::DomMutationMonitor;
use crate::scoring::score_candidates;
use heal_common::dom::{CandidateElement, MutationEvent};
use heal_common::{
    ElementDefinition, FailureKind, HealError, RepairMode, Result, ValidationFailure,
};
use heal_drivers::{BrowserDriver, DriverError};
use heal_llm::payload::{recent_mutations, DomExcerpt, RepairPayload, TOP_CANDIDATES};
use heal_llm::parse_selector_response;
use heal_llm::traits::SelectorRepairClient;
use std::fmt;
use std::sync::Arc;

/// Stages of a single attempt, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealStage {
    CaptureContext,
    ScoreCandidates,
    RequestRepair,
    ValidateSelector,
}

impl fmt::Display for HealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealStage::CaptureContext => "capture_context",
            HealStage::ScoreCandidates => "score_candidates",
            HealStage::RequestRepair => "request_repair",
            HealStage::ValidateSelector => "validate_selector",
        })
    }
}

/// What failed and what to ask for.
#[derive(Debug, Clone, Copy)]
pub struct HealRequest<'a> {
    pub definition: &'a ElementDefinition,
    /// First selector the resolver actually tried.
    pub old_selector: &'a str,
    pub failure: FailureKind,
    pub mode: RepairMode,
}

struct CapturedContext {
    page_source: String,
    mutation_events: Vec<MutationEvent>,
}

pub struct HealingCoordinator {
    client: Arc<dyn SelectorRepairClient>,
    monitor: DomMutationMonitor,
    extractor: CandidateExtractor,
    artifacts: ArtifactStore,
    audit: AuditLog,
}

impl HealingCoordinator {
    pub fn new(
        client: Arc<dyn SelectorRepairClient>,
        artifacts: ArtifactStore,
        audit: AuditLog,
    ) -> Self {
        Self {
            client,
            monitor: DomMutationMonitor::new(),
            extractor: CandidateExtractor::new(),
            artifacts,
            audit,
        }
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Run one attempt and return the validated selector.
    ///
    /// Exactly one audit record is appended whatever the outcome. A
    /// `target_repair` success is also written to `overrides` and the
    /// durable override file. The backend is asked once; failures are
    /// returned to the caller, never retried here.
    pub async fn heal<D: BrowserDriver>(
        &self,
        driver: &D,
        request: HealRequest<'_>,
        overrides: &mut OverrideMap,
    ) -> Result<String> {
        let key = request.definition.key.as_str();
        tracing::warn!(
            target: "heal.healer",
            %key,
            old_selector = request.old_selector,
            failure = %request.failure,
            mode = %request.mode,
            "healing started"
        );

        let mut context = AttemptContext {
            element_key: key.to_string(),
            old_selector: request.old_selector.to_string(),
            failure_type: request.failure,
            mode: request.mode,
            llm_provider: self.client.provider_name().to_string(),
            top_candidates: Vec::new(),
            artifact_paths: Default::default(),
        };

        let outcome = self.attempt(driver, &request, &mut context).await;
        let attempt = match &outcome {
            Ok(selector) => HealAttempt::succeeded(context, selector.clone()),
            Err(e) => HealAttempt::failed(context, e),
        };
        self.audit.append(&attempt)?;

        let selector = outcome.map_err(|e| {
            tracing::error!(target: "heal.healer", %key, error = %e, "healing failed");
            e
        })?;

        if request.mode == RepairMode::TargetRepair {
            overrides.insert(key, selector.clone());
            self.audit.write_overrides(overrides)?;
        }
        tracing::info!(target: "heal.healer", %key, %selector, mode = %request.mode, "healing succeeded");
        Ok(selector)
    }

    async fn attempt<D: BrowserDriver>(
        &self,
        driver: &D,
        request: &HealRequest<'_>,
        context: &mut AttemptContext,
    ) -> Result<String> {
        let key = request.definition.key.as_str();
        let stamp = ArtifactStore::timestamp();

        let captured = self
            .capture(driver, key, &stamp, context)
            .await
            .map_err(|e| at_stage(HealStage::CaptureContext, e))?;

        let ranked = self
            .rank(driver, request.definition)
            .await
            .map_err(|e| at_stage(HealStage::ScoreCandidates, e))?;
        context.top_candidates = ranked.clone();

        let payload = RepairPayload {
            mode: request.mode,
            failed_element_key: key.to_string(),
            old_selector: request.old_selector.to_string(),
            failure_type: request.failure.to_string(),
            expected_role: request.definition.intended_role.clone(),
            historical_metadata: request.definition.historical_metadata.clone(),
            dom_snippet: DomExcerpt::build(&captured.page_source, &ranked),
            top_ranked_candidates: ranked,
            mutation_events: recent_mutations(&captured.mutation_events),
        };
        let raw = self
            .client
            .repair_selector(&payload)
            .await
            .map_err(|e| at_stage(HealStage::RequestRepair, e))?;
        tracing::debug!(target: "heal.healer", %key, response = %raw, "repair response received");

        validate(driver, &raw)
            .await
            .map_err(|e| at_stage(HealStage::ValidateSelector, e))
    }

    async fn capture<D: BrowserDriver>(
        &self,
        driver: &D,
        key: &str,
        stamp: &str,
        context: &mut AttemptContext,
    ) -> Result<CapturedContext> {
        let mutation_events = self.monitor.flush_events(driver).await?;
        let page_source = driver.page_source().await?;

        let screenshot = self.artifacts.screenshot_path(key, stamp);
        context
            .artifact_paths
            .insert("screenshot".into(), screenshot.display().to_string());
        driver.save_screenshot(&screenshot).await?;

        let dom = self.artifacts.write_dom_snapshot(key, &page_source, stamp)?;
        context
            .artifact_paths
            .insert("dom_snapshot".into(), dom.display().to_string());

        Ok(CapturedContext {
            page_source,
            mutation_events,
        })
    }

    async fn rank<D: BrowserDriver>(
        &self,
        driver: &D,
        definition: &ElementDefinition,
    ) -> Result<Vec<CandidateElement>> {
        let candidates = self.extractor.extract(driver).await?;
        let mut ranked = score_candidates(definition, candidates);
        ranked.truncate(TOP_CANDIDATES);
        if let Some(best) = ranked.first() {
            tracing::debug!(
                target: "heal.healer",
                key = %definition.key,
                best = %best.selector_hint,
                score = best.heuristic_score,
                "ranked candidates"
            );
        }
        Ok(ranked)
    }
}

/// Parse the raw text and confirm it matches at least one live element.
async fn validate<D: BrowserDriver>(driver: &D, raw: &str) -> Result<String> {
    let (selector, kind) = parse_selector_response(raw)?;
    match driver.find_all(kind, &selector).await {
        Ok(matches) if matches.is_empty() => {
            Err(HealError::SelectorValidation(ValidationFailure::NoMatch))
        }
        Ok(_) => Ok(selector),
        Err(DriverError::InvalidSelector { message, .. }) => Err(HealError::SelectorValidation(
            ValidationFailure::InvalidSyntax(message),
        )),
        Err(e) => Err(e.into()),
    }
}

// Taxonomy errors pass through; anything else becomes a healing error
// naming the stage.
fn at_stage(stage: HealStage, err: HealError) -> HealError {
    if err.is_healing_failure() {
        err
    } else {
        HealError::Healing(format!("{stage}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_wrapping_keeps_healing_failures() {
        let validation = HealError::SelectorValidation(ValidationFailure::Empty);
        assert!(matches!(
            at_stage(HealStage::ValidateSelector, validation),
            HealError::SelectorValidation(ValidationFailure::Empty)
        ));

        let io = HealError::Io(std::io::Error::other("disk full"));
        match at_stage(HealStage::CaptureContext, io) {
            HealError::Healing(msg) => assert!(msg.starts_with("capture_context:")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
