//! Append-only healing audit log and the durable override map.
use heal_common::dom::CandidateElement;
use heal_common::{FailureKind, HealError, RepairMode, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const AUDIT_LOG_FILE: &str = "healed_elements.jsonl";
pub const OVERRIDES_FILE: &str = "selector_overrides.json";

/// Element key → selector learned from the latest successful heal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideMap(BTreeMap<String, String>);

impl OverrideMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, selector: impl Into<String>) {
        self.0.insert(key.into(), selector.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything known about an attempt before its outcome.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub element_key: String,
    pub old_selector: String,
    pub failure_type: FailureKind,
    pub mode: RepairMode,
    pub llm_provider: String,
    pub top_candidates: Vec<CandidateElement>,
    pub artifact_paths: BTreeMap<String, String>,
}

/// One audit record. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealAttempt {
    pub element_key: String,
    pub old_selector: String,
    pub failure_type: FailureKind,
    pub mode: RepairMode,
    pub top_candidates: Vec<CandidateElement>,
    pub llm_provider: String,
    pub new_selector: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub artifact_paths: BTreeMap<String, String>,
    pub recorded_at: String,
}

impl HealAttempt {
    pub fn succeeded(context: AttemptContext, new_selector: String) -> Self {
        Self::build(context, new_selector, None)
    }

    pub fn failed(context: AttemptContext, error: &HealError) -> Self {
        Self::build(context, String::new(), Some(error.to_string()))
    }

    fn build(context: AttemptContext, new_selector: String, error: Option<String>) -> Self {
        Self {
            element_key: context.element_key,
            old_selector: context.old_selector,
            failure_type: context.failure_type,
            mode: context.mode,
            top_candidates: context.top_candidates,
            llm_provider: context.llm_provider,
            success: !new_selector.is_empty(),
            new_selector,
            error,
            artifact_paths: context.artifact_paths,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Durable store rooted at one directory.
///
/// Not safe for concurrent writers in separate processes; give each
/// parallel session its own root.
#[derive(Debug, Clone)]
pub struct AuditLog {
    log_path: PathBuf,
    overrides_path: PathBuf,
}

impl AuditLog {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        Ok(Self {
            log_path: root.join(AUDIT_LOG_FILE),
            overrides_path: root.join(OVERRIDES_FILE),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn overrides_path(&self) -> &Path {
        &self.overrides_path
    }

    /// Append one JSON line.
    pub fn append(&self, attempt: &HealAttempt) -> Result<()> {
        let mut line = serde_json::to_string(attempt)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(line.as_bytes())?;
        tracing::info!(
            target: "heal.audit",
            key = %attempt.element_key,
            success = attempt.success,
            mode = %attempt.mode,
            "audit record appended"
        );
        Ok(())
    }

    /// Every record in append order.
    pub fn records(&self) -> Result<Vec<HealAttempt>> {
        let raw = match fs::read_to_string(&self.log_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(HealError::from))
            .collect()
    }

    /// Read the override map; a missing file is an empty map.
    pub fn read_overrides(&self) -> Result<OverrideMap> {
        match fs::read_to_string(&self.overrides_path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(OverrideMap::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite the whole override file, keys sorted.
    pub fn write_overrides(&self, overrides: &OverrideMap) -> Result<()> {
        let body = serde_json::to_string_pretty(overrides)?;
        fs::write(&self.overrides_path, body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heal_common::ValidationFailure;

    fn context(key: &str) -> AttemptContext {
        AttemptContext {
            element_key: key.into(),
            old_selector: "#login-button".into(),
            failure_type: FailureKind::Timeout,
            mode: RepairMode::TargetRepair,
            llm_provider: "openai".into(),
            top_candidates: vec![],
            artifact_paths: BTreeMap::new(),
        }
    }

    #[test]
    fn success_flag_tracks_selector() {
        let ok = HealAttempt::succeeded(context("a"), "#signin".into());
        assert!(ok.success);
        assert!(ok.error.is_none());

        let err = HealError::SelectorValidation(ValidationFailure::Multiline);
        let failed = HealAttempt::failed(context("a"), &err);
        assert!(!failed.success);
        assert!(failed.new_selector.is_empty());
        assert!(failed.error.unwrap().contains("multiple lines"));
    }

    #[test]
    fn appends_one_line_per_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path()).unwrap();
        log.append(&HealAttempt::succeeded(context("a"), "#a".into()))
            .unwrap();
        log.append(&HealAttempt::failed(
            context("b"),
            &HealError::Provider("boom".into()),
        ))
        .unwrap();

        let raw = fs::read_to_string(log.log_path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(first["failure_type"], "timeout");
        assert_eq!(first["mode"], "target_repair");
        assert!(first.get("error").is_none());

        let records = log.records().unwrap();
        assert_eq!(records[1].element_key, "b");
        assert!(!records[1].success);
    }

    #[test]
    fn overrides_round_trip_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path()).unwrap();
        assert!(log.read_overrides().unwrap().is_empty());

        let mut map = OverrideMap::default();
        map.insert("zeta", "#z");
        map.insert("alpha", "//a");
        log.write_overrides(&map).unwrap();

        let raw = fs::read_to_string(log.overrides_path()).unwrap();
        assert!(raw.find("alpha").unwrap() < raw.find("zeta").unwrap());
        assert_eq!(log.read_overrides().unwrap(), map);
    }
}
