use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inference::InferenceConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub inference: InferenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub data: DataConfig,
}

fn default_enabled_true() -> bool {
    true
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

/// Upper bound on loop turns regardless of configuration.
pub const MAX_ITERATIONS_CAP: u32 = 10;

fn default_max_iterations() -> u32 {
    MAX_ITERATIONS_CAP
}

fn default_readiness_forced_iteration() -> u32 {
    3
}

fn default_success_confidence() -> f64 {
    75.0
}

fn default_phase_timeout_ms() -> u64 {
    120_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// From this iteration on, synthesis runs even without findings.
    #[serde(default = "default_readiness_forced_iteration")]
    pub readiness_forced_iteration: u32,
    #[serde(default = "default_success_confidence")]
    pub success_confidence: f64,
    /// Zero disables the per-phase timeout.
    #[serde(default = "default_phase_timeout_ms")]
    pub phase_timeout_ms: u64,
    #[serde(default)]
    pub token_budgets: PhaseTokenBudgets,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            readiness_forced_iteration: default_readiness_forced_iteration(),
            success_confidence: default_success_confidence(),
            phase_timeout_ms: default_phase_timeout_ms(),
            token_budgets: PhaseTokenBudgets::default(),
        }
    }
}

fn default_planner_tokens() -> u64 {
    1_500
}

fn default_evidence_analyst_tokens() -> u64 {
    2_000
}

fn default_synthesizer_tokens() -> u64 {
    1_500
}

fn default_reflector_tokens() -> u64 {
    1_500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTokenBudgets {
    #[serde(default = "default_planner_tokens")]
    pub planner: u64,
    #[serde(default = "default_evidence_analyst_tokens")]
    pub evidence_analyst: u64,
    #[serde(default = "default_synthesizer_tokens")]
    pub synthesizer: u64,
    #[serde(default = "default_reflector_tokens")]
    pub reflector: u64,
}

impl Default for PhaseTokenBudgets {
    fn default() -> Self {
        Self {
            planner: default_planner_tokens(),
            evidence_analyst: default_evidence_analyst_tokens(),
            synthesizer: default_synthesizer_tokens(),
            reflector: default_reflector_tokens(),
        }
    }
}

fn default_hypothesis_tokens() -> u64 {
    3_000
}

fn default_evidence_tokens() -> u64 {
    4_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_hypothesis_tokens")]
    pub hypothesis_max_tokens: u64,
    #[serde(default = "default_evidence_tokens")]
    pub evidence_max_tokens: u64,
    /// Wall-clock bound on one hypothesis evaluation; zero disables it.
    #[serde(default = "default_phase_timeout_ms")]
    pub evaluation_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            hypothesis_max_tokens: default_hypothesis_tokens(),
            evidence_max_tokens: default_evidence_tokens(),
            evaluation_timeout_ms: default_phase_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    #[default]
    Memory,
    JsonFile {
        state_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub fixture_path: PathBuf,
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema_path = resolve_schema_path(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema_path)?;

        let mut config: Config =
            serde_json::from_value(config_value).context("failed to deserialize config")?;

        if !config.logging.dir.is_absolute() {
            config.logging.dir = config_base.join(&config.logging.dir);
        }
        if !config.data.fixture_path.is_absolute() {
            config.data.fixture_path = config_base.join(&config.data.fixture_path);
        }
        if let StoreConfig::JsonFile { state_dir } = &mut config.store
            && !state_dir.is_absolute()
        {
            *state_dir = config_base.join(&*state_dir);
        }

        Ok(config)
    }
}

fn resolve_schema_path(config_base: &Path, config_value: &Value) -> Result<PathBuf> {
    if let Some(path_text) = config_value.get("$schema").and_then(|value| value.as_str()) {
        let configured = PathBuf::from(path_text);
        if configured.is_absolute() {
            return Ok(configured);
        }
        return Ok(config_base.join(&configured));
    }

    let local_default = config_base.join("fieldpilot.schema.json");
    if local_default.exists() {
        return Ok(local_default);
    }

    Err(anyhow!(
        "unable to resolve schema path: expected $schema in config or fieldpilot.schema.json next to it"
    ))
}

fn validate_against_schema(config_value: &Value, schema_path: &Path) -> Result<()> {
    let schema_content = fs::read_to_string(schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))?;

    let compiled =
        JSONSchema::compile(&schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors_iter) => {
            let validation_errors: Vec<ValidationError> = errors_iter.collect();
            let messages: Vec<String> = validation_errors
                .into_iter()
                .map(|error| error.to_string())
                .collect();
            Err(anyhow!("config validation failed: {}", messages.join("; ")))
        }
    }
}
