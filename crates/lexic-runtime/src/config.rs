//! Runtime configuration.
//!
//! Values are resolved in layers: built-in defaults, then an optional YAML
//! file, then environment variables. The CLI applies its own flags last.
//!
//! ```yaml
//! data_dir: data
//! default_model: claude-3-5-sonnet-20241022
//! judge_model: claude-3-5-sonnet-20241022
//! temperature: 0.7
//! max_retries: 3
//! request_timeout: 5m
//! mlflow:
//!   tracking_uri: http://localhost:5000
//!   experiment: lexic-evaluation
//! provider:
//!   type: anthropic
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use lexic_core::{CaseStore, CoreError};

use crate::providers::{ApiCredential, CompletionConfig, CredentialSource, ANTHROPIC_API_KEY_ENV};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Errors from configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },

    #[error("{0} not set: export it or add provider.api_key to the config file")]
    MissingApiKey(&'static str),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Which part of the system a model call serves.
///
/// Selects the model and sampling settings, and keys usage accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Agent,
    Judge,
    Generation,
    Extraction,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Agent => "agent",
            ModelRole::Judge => "judge",
            ModelRole::Generation => "generation",
            ModelRole::Extraction => "extraction",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MLflow sink settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlflowSettings {
    pub tracking_uri: String,
    pub experiment: String,
}

impl Default for MlflowSettings {
    fn default() -> Self {
        Self {
            tracking_uri: "http://localhost:5000".to_string(),
            experiment: "lexic-evaluation".to_string(),
        }
    }
}

/// `provider` section: which backend to build, and how to reach it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    #[serde(rename = "type")]
    pub provider_type: String,
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Where `api_key` came from. `ANTHROPIC_API_KEY` overrides the YAML.
    #[serde(skip)]
    pub api_key_source: CredentialSource,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider_type: "anthropic".to_string(),
            base_url: None,
            api_key: None,
            api_key_source: CredentialSource::Config,
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("provider_type", &self.provider_type)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_key_source", &self.api_key_source)
            .finish()
    }
}

/// Lexic configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicConfig {
    /// Root of `court_decisions/`, `synthetic_cases/`, `eval_runs/` and
    /// `pipeline_runs/`.
    pub data_dir: PathBuf,

    /// Model used by the drafting agents.
    pub default_model: String,
    pub extraction_model: String,
    pub generation_model: String,
    pub judge_model: String,

    pub temperature: f32,
    pub judge_temperature: f32,

    /// Output token limit for agents, generation and extraction.
    pub max_tokens: u32,
    pub judge_max_tokens: u32,

    /// Retries after the first attempt for transient provider errors.
    pub max_retries: usize,

    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    /// Entries kept in the deterministic completion cache. 0 disables it.
    pub cache_capacity: u64,
    #[serde(with = "humantime_duration")]
    pub cache_ttl: Duration,

    /// Whether the pipeline predicts a judgment before recommendations.
    pub predict_judgment: bool,

    /// Directory of `<category>/<name>.yaml` prompt overrides.
    pub prompts_dir: Option<PathBuf>,
    /// Directory of `<step>.yaml` rubric overrides.
    pub rubrics_dir: Option<PathBuf>,

    pub mlflow: MlflowSettings,
    pub provider: ProviderSettings,
}

impl Default for LexicConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            default_model: DEFAULT_MODEL.to_string(),
            extraction_model: DEFAULT_MODEL.to_string(),
            generation_model: DEFAULT_MODEL.to_string(),
            judge_model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            judge_temperature: 0.0,
            max_tokens: 32_000,
            judge_max_tokens: 2_048,
            max_retries: 3,
            request_timeout: Duration::from_secs(300),
            cache_capacity: 1_000,
            cache_ttl: Duration::from_secs(3600),
            predict_judgment: true,
            prompts_dir: None,
            rubrics_dir: None,
            mlflow: MlflowSettings::default(),
            provider: ProviderSettings::default(),
        }
    }
}

impl LexicConfig {
    /// Defaults, then the YAML file if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Override fields from environment variables.
    ///
    /// `lookup` is the variable source; `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LEXIC_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("DEFAULT_MODEL") {
            self.default_model = v;
        }
        if let Some(v) = get("EXTRACTION_MODEL") {
            self.extraction_model = v;
        }
        if let Some(v) = get("GENERATION_MODEL") {
            self.generation_model = v;
        }
        if let Some(v) = get("JUDGE_MODEL") {
            self.judge_model = v;
        }
        if let Some(v) = get("MAX_RETRIES") {
            self.max_retries = parse_env("MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("TEMPERATURE") {
            self.temperature = parse_env("TEMPERATURE", &v)?;
        }
        if let Some(v) = get("MLFLOW_TRACKING_URI") {
            self.mlflow.tracking_uri = v;
        }
        if let Some(v) = get("MLFLOW_EXPERIMENT_NAME") {
            self.mlflow.experiment = v;
        }
        if let Some(v) = get(ANTHROPIC_API_KEY_ENV) {
            self.provider.api_key = Some(v);
            self.provider.api_key_source = CredentialSource::Environment;
        }
        Ok(())
    }

    /// Check that a provider credential exists and create the data
    /// directories.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !ApiCredential::is_available(self.provider.api_key.as_deref(), ANTHROPIC_API_KEY_ENV) {
            return Err(ConfigError::MissingApiKey(ANTHROPIC_API_KEY_ENV));
        }
        self.store().ensure_dirs()?;
        Ok(())
    }

    pub fn store(&self) -> CaseStore {
        CaseStore::new(&self.data_dir)
    }

    pub fn model_for(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Agent => &self.default_model,
            ModelRole::Judge => &self.judge_model,
            ModelRole::Generation => &self.generation_model,
            ModelRole::Extraction => &self.extraction_model,
        }
    }

    /// Completion settings for a role.
    pub fn completion_config(&self, role: ModelRole) -> CompletionConfig {
        let (temperature, max_tokens) = match role {
            ModelRole::Judge => (self.judge_temperature, self.judge_max_tokens),
            _ => (self.temperature, self.max_tokens),
        };
        CompletionConfig {
            model: self.model_for(role).to_string(),
            max_tokens,
            temperature,
            timeout: self.request_timeout,
            prompt_caching: false,
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Serde adapter for `"5m"`-style durations.
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LexicConfig::default();
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.judge_temperature, 0.0);
        assert_eq!(config.max_tokens, 32_000);
        assert_eq!(config.judge_max_tokens, 2_048);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert_eq!(config.mlflow.tracking_uri, "http://localhost:5000");
        assert_eq!(config.mlflow.experiment, "lexic-evaluation");
    }

    #[test]
    fn test_yaml_partial_override() {
        let config = LexicConfig::from_yaml(
            "judge_model: claude-3-opus\nrequest_timeout: 90s\nmlflow:\n  experiment: nightly\n",
        )
        .unwrap();
        assert_eq!(config.judge_model, "claude-3-opus");
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(config.mlflow.experiment, "nightly");
        assert_eq!(config.mlflow.tracking_uri, "http://localhost:5000");
    }

    #[test]
    fn test_yaml_bad_duration() {
        assert!(LexicConfig::from_yaml("request_timeout: soon\n").is_err());
    }

    #[test]
    fn test_env_overrides_yaml() {
        let mut config = LexicConfig::from_yaml("default_model: from-yaml\n").unwrap();
        config
            .apply_env(env(&[
                ("DEFAULT_MODEL", "from-env"),
                ("MAX_RETRIES", "5"),
                ("TEMPERATURE", "0.2"),
                ("LEXIC_DATA_DIR", "/tmp/lexic"),
                ("MLFLOW_EXPERIMENT_NAME", "exp"),
            ]))
            .unwrap();
        assert_eq!(config.default_model, "from-env");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/lexic"));
        assert_eq!(config.mlflow.experiment, "exp");
    }

    #[test]
    fn test_env_api_key_overrides_yaml_and_keeps_origin() {
        let mut config = LexicConfig::from_yaml("provider:\n  api_key: sk-yaml\n").unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-yaml"));
        assert_eq!(config.provider.api_key_source, CredentialSource::Config);

        config.apply_env(env(&[(ANTHROPIC_API_KEY_ENV, "sk-env")])).unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.provider.api_key_source, CredentialSource::Environment);

        let mut untouched = LexicConfig::from_yaml("provider:\n  api_key: sk-yaml\n").unwrap();
        untouched.apply_env(env(&[(ANTHROPIC_API_KEY_ENV, "  ")])).unwrap();
        assert_eq!(untouched.provider.api_key.as_deref(), Some("sk-yaml"));
        assert_eq!(untouched.provider.api_key_source, CredentialSource::Config);
    }

    #[test]
    fn test_env_invalid_number() {
        let mut config = LexicConfig::default();
        let err = config.apply_env(env(&[("MAX_RETRIES", "many")])).unwrap_err();
        assert!(err.to_string().contains("MAX_RETRIES"));
    }

    #[test]
    fn test_completion_config_per_role() {
        let mut config = LexicConfig::default();
        config.judge_model = "judge".to_string();

        let judge = config.completion_config(ModelRole::Judge);
        assert_eq!(judge.model, "judge");
        assert_eq!(judge.temperature, 0.0);
        assert_eq!(judge.max_tokens, 2_048);

        let agent = config.completion_config(ModelRole::Agent);
        assert_eq!(agent.model, DEFAULT_MODEL);
        assert_eq!(agent.max_tokens, 32_000);
    }

    #[test]
    fn test_validate_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = LexicConfig {
            data_dir: dir.path().join("data"),
            provider: ProviderSettings {
                api_key: Some("sk-test".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        config.validate().unwrap();
        assert!(config.store().cases_dir().is_dir());
        assert!(config.store().eval_runs_dir().is_dir());
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let settings = ProviderSettings {
            api_key: Some("sk-ant-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("api_key_source: Config"));
    }
}
