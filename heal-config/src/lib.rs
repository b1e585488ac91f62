//! Loader for test-suite configuration with YAML/JSON + environment overlays.
//!
//! A suite file declares the target environment, the element definitions the
//! resolver heals, and optionally the repair backend and artifact root.
//! `HEAL__SECTION__FIELD` environment variables override file values and
//! `${VAR}` placeholders inside string values are expanded after merging.
use config::{Config, ConfigError, Environment, File};
use heal_common::{ConfigurationProvider, ElementDefinition, HealError, RepairConfig};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const SUPPORTED_BROWSERS: [&str; 2] = ["chrome", "firefox"];

#[derive(Debug, thiserror::Error)]
pub enum SuiteConfigError {
    #[error(transparent)]
    Load(#[from] ConfigError),
    #[error("invalid suite configuration: {0}")]
    Invalid(String),
}

impl From<SuiteConfigError> for HealError {
    fn from(err: SuiteConfigError) -> Self {
        HealError::Config(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuiteConfig {
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub elements: Vec<ElementDefinition>,
    #[serde(default)]
    pub repair: Option<RepairConfig>,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_browser_matrix")]
    pub browser_matrix: Vec<String>,
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub webdriver_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifact_root")]
    pub root: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: default_artifact_root(),
        }
    }
}

fn default_browser_matrix() -> Vec<String> {
    vec!["chrome".into()]
}
fn default_timeout_seconds() -> u64 {
    10
}
fn default_poll_interval_ms() -> u64 {
    200
}
fn default_artifact_root() -> PathBuf {
    PathBuf::from("artifacts")
}

impl SuiteConfig {
    /// Repair backend settings, falling back to `LLM_PROVIDER`-driven defaults.
    pub fn repair_config(&self) -> RepairConfig {
        self.repair.clone().unwrap_or_else(RepairConfig::from_env)
    }

    /// Clear an element's fallback selectors at runtime.
    pub fn clear_fallbacks(&mut self, key: &str) -> Result<(), HealError> {
        let element = self
            .elements
            .iter_mut()
            .find(|e| e.key == key)
            .ok_or_else(|| HealError::UnknownElement(key.to_string()))?;
        element.clear_fallbacks();
        Ok(())
    }

    fn validate(mut self) -> Result<Self, SuiteConfigError> {
        let normalized: Vec<String> = self
            .environment
            .browser_matrix
            .iter()
            .map(|b| b.trim().to_lowercase())
            .collect();
        let invalid: Vec<&str> = normalized
            .iter()
            .map(String::as_str)
            .filter(|b| !SUPPORTED_BROWSERS.contains(b))
            .collect();
        if !invalid.is_empty() {
            return Err(SuiteConfigError::Invalid(format!(
                "unsupported browsers: {}",
                invalid.join(", ")
            )));
        }
        self.environment.browser_matrix = normalized;

        if self.environment.default_timeout_seconds == 0 {
            return Err(SuiteConfigError::Invalid(
                "default_timeout_seconds must be positive".into(),
            ));
        }

        let mut seen = HashSet::new();
        for element in &self.elements {
            if !seen.insert(element.key.as_str()) {
                return Err(SuiteConfigError::Invalid(format!(
                    "duplicate element key: {}",
                    element.key
                )));
            }
            if element.selector.trim().is_empty() {
                return Err(SuiteConfigError::Invalid(format!(
                    "element {} has an empty selector",
                    element.key
                )));
            }
        }
        Ok(self)
    }
}

impl ConfigurationProvider for SuiteConfig {
    fn get_element(&self, key: &str) -> Result<&ElementDefinition, HealError> {
        self.elements
            .iter()
            .find(|e| e.key == key)
            .ok_or_else(|| HealError::UnknownElement(key.to_string()))
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (file + env overrides).
pub struct SuiteConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SuiteConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SuiteConfigLoader {
    /// Start with `HEAL__`-prefixed environment overrides only.
    ///
    /// ```
    /// use heal_config::SuiteConfigLoader;
    ///
    /// let config = SuiteConfigLoader::new()
    ///     .with_yaml_str("environment:\n  base_url: http://localhost:8000\nelements: []")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.environment.default_timeout_seconds, 10);
    /// assert!(config.elements.is_empty());
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder().add_source(
            Environment::with_prefix("HEAL")
                .separator("__")
                .try_parsing(true),
        );
        Self { builder }
    }

    /// Attach a YAML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Merge an inline YAML snippet (tests and CLI).
    ///
    /// ```
    /// use heal_common::{ConfigurationProvider, SelectorKind};
    /// use heal_config::SuiteConfigLoader;
    ///
    /// let cfg = SuiteConfigLoader::new()
    ///     .with_yaml_str(
    ///         r##"
    /// environment:
    ///   base_url: "http://localhost:8000"
    /// elements:
    ///   - key: login_button
    ///     intended_role: button
    ///     selector_type: css
    ///     selector: "#login-button"
    ///     historical_metadata:
    ///       tag: button
    ///       parent_tag: form
    ///       color: "rgb(255, 255, 255)"
    /// "##,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// let login = cfg.get_element("login_button").unwrap();
    /// assert_eq!(login.selector_type, SelectorKind::Css);
    /// assert!(login.fallback_selectors.is_empty());
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder, expand `${VAR}` placeholders, deserialize and validate.
    pub fn load(self) -> Result<SuiteConfig, SuiteConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        normalize_selector_types(&mut v);
        expand_env_in_value(&mut v);

        let typed: SuiteConfig = serde_json::from_value(v)
            .map_err(|e| SuiteConfigError::Load(ConfigError::Message(e.to_string())))?;

        typed.validate()
    }
}

// `selector_type` is accepted case-insensitively.
fn normalize_selector_types(v: &mut Value) {
    if let Some(elements) = v.get_mut("elements").and_then(Value::as_array_mut) {
        for element in elements {
            if let Some(Value::String(kind)) = element.get_mut("selector_type") {
                *kind = kind.trim().to_lowercase();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("HEAL_TEST_KEY", Some("sk-test"), || {
            let mut v = json!("prefix-${HEAL_TEST_KEY}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-sk-test-suffix"));
        });
    }

    #[test]
    fn expands_nested_elements() {
        temp_env::with_vars(
            [("HEAL_HOST", Some("localhost")), ("HEAL_PORT", Some("8000"))],
            || {
                let mut v = json!({
                    "environment": { "base_url": "http://${HEAL_HOST}:${HEAL_PORT}" },
                    "elements": [{ "selector": "#login" }, 42, null]
                });
                expand_env_in_value(&mut v);
                assert_eq!(v["environment"]["base_url"], json!("http://localhost:8000"));
                assert_eq!(v["elements"][0]["selector"], json!("#login"));
            },
        );
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("HEAL_A", Some("${HEAL_B}")), ("HEAL_B", Some("${HEAL_A}"))], || {
            let mut v = json!("x=${HEAL_A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${HEAL_DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${HEAL_DOES_NOT_EXIST}"));
    }

    #[test]
    fn selector_type_is_case_insensitive() {
        let mut v = json!({ "elements": [{ "selector_type": " XPath " }] });
        normalize_selector_types(&mut v);
        assert_eq!(v["elements"][0]["selector_type"], json!("xpath"));
    }
}
