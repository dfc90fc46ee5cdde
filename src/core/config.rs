//! Configuration types for the wiki generator and Q&A engine.
//!
//! Serde-backed configuration with YAML load/save and per-field validation.
//! A `.oya.yml` at the repository root is picked up automatically by the CLI.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{OyaError, Result};

/// Default config file name looked up at the repository root.
pub const CONFIG_FILE: &str = ".oya.yml";

/// Main configuration for wiki generation and retrieval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OyaConfig {
    /// Generation pipeline settings
    pub generation: GenerationConfig,

    /// Retrieval and Q&A settings
    pub retrieval: RetrievalConfig,

    /// Prompt firewall settings
    pub firewall: FirewallConfig,

    /// LLM provider settings
    pub llm: LlmConfig,
}

impl OyaConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            OyaError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            OyaError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Load `.oya.yml` from `root` when present, falling back to defaults.
    pub fn discover(root: &std::path::Path) -> Result<Self> {
        let candidate = root.join(CONFIG_FILE);
        if candidate.is_file() {
            Self::from_yaml_file(candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration settings.
    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        self.retrieval.validate()?;
        self.firewall.validate()?;
        self.llm.validate()?;
        Ok(())
    }
}

/// Generation pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum concurrent LLM calls within the Files and Directories phases
    pub parallel_limit: usize,

    /// Token budget for a single synthesis LLM call
    pub context_limit: usize,

    /// Maximum source file size considered by the scanner, in kilobytes
    pub max_file_size_kb: u64,

    /// Per-LLM-call timeout in seconds
    pub llm_timeout_secs: u64,

    /// Retry attempts for rate-limited and transient LLM failures
    pub max_retries: u32,

    /// Output language for all generated pages
    pub language: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            parallel_limit: 10,
            context_limit: 100_000,
            max_file_size_kb: 500,
            llm_timeout_secs: 120,
            max_retries: 3,
            language: "English".to_string(),
        }
    }
}

impl GenerationConfig {
    fn validate(&self) -> Result<()> {
        if self.parallel_limit == 0 {
            return Err(OyaError::config_field(
                "parallel_limit must be at least 1",
                "generation.parallel_limit",
            ));
        }
        if self.context_limit < 1_000 {
            return Err(OyaError::config_field(
                "context_limit below 1000 tokens cannot fit a synthesis batch",
                "generation.context_limit",
            ));
        }
        if self.language.trim().is_empty() {
            return Err(OyaError::config_field(
                "language must not be empty",
                "generation.language",
            ));
        }
        Ok(())
    }
}

/// Evidence-gate behavior when retrieval comes back thin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    /// Refuse to answer without sufficient evidence.
    Gated,
    /// Answer anyway, attaching a limited-evidence disclaimer.
    Loose,
}

/// Retrieval and Q&A configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results requested from each of the semantic and lexical subqueries
    pub top_k: usize,

    /// Maximum semantic distance for a result to count as evidence
    pub distance_threshold: f32,

    /// Minimum number of sufficiently-close results required to answer
    pub min_evidence: usize,

    /// Gate behavior on insufficient evidence
    pub gate_mode: GateMode,

    /// Token budget for the assembled answer context
    pub context_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            distance_threshold: 0.8,
            min_evidence: 2,
            gate_mode: GateMode::Gated,
            context_tokens: 12_000,
        }
    }
}

impl RetrievalConfig {
    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(OyaError::config_field(
                "top_k must be at least 1",
                "retrieval.top_k",
            ));
        }
        if !(0.0..=2.0).contains(&self.distance_threshold) {
            return Err(OyaError::config_field(
                "distance_threshold must be within [0, 2]",
                "retrieval.distance_threshold",
            ));
        }
        Ok(())
    }
}

/// Prompt firewall configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    /// Non-ASCII character density above which an English-bound prompt is
    /// scrubbed before dispatch
    pub outbound_density_threshold: f64,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            outbound_density_threshold: 0.10,
        }
    }
}

impl FirewallConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.outbound_density_threshold) {
            return Err(OyaError::config_field(
                "outbound_density_threshold must be within [0, 1]",
                "firewall.outbound_density_threshold",
            ));
        }
        Ok(())
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name recorded in embedding provenance
    pub provider: String,

    /// Base endpoint for an OpenAI-compatible API
    pub api_endpoint: String,

    /// Generation model name
    pub model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Sampling temperature for page generation
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key_env: "OYA_API_KEY".to_string(),
            temperature: 0.2,
        }
    }
}

impl LlmConfig {
    fn validate(&self) -> Result<()> {
        if self.api_endpoint.trim().is_empty() {
            return Err(OyaError::config_field(
                "api_endpoint must not be empty",
                "llm.api_endpoint",
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(OyaError::config_field(
                "temperature must be within [0, 2]",
                "llm.temperature",
            ));
        }
        Ok(())
    }
}
