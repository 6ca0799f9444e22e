//! Pipeline configuration loaded from the environment, plus a TOML user
//! config for the generation collaborator. Change behavior without code edits.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Runtime tuning for the decision pipeline.
///
/// | Env | Default | Description |
/// |-----|---------|-------------|
/// | SOLACE_CRISIS_THRESHOLD | 5 | Crisis score at or above which the gate short-circuits. |
/// | SOLACE_CAG_THRESHOLD | 0.85 | Curated score always admitted by fusion. |
/// | SOLACE_RAG_THRESHOLD | 0.70 | Minimum score for any other fusion admission. |
/// | SOLACE_FUSION_LIMIT | 3 | Maximum fused results. |
/// | SOLACE_SEMANTIC_TOP_K | 5 | Candidates requested from the semantic index. |
/// | SOLACE_SEMANTIC_THRESHOLD | 0.0 | Minimum similarity at the semantic index (fusion filters further). |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub crisis_threshold: u8,
    pub cag_threshold: f32,
    pub rag_threshold: f32,
    pub fusion_limit: usize,
    pub semantic_top_k: usize,
    pub semantic_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crisis_threshold: 5,
            cag_threshold: 0.85,
            rag_threshold: 0.70,
            fusion_limit: 3,
            semantic_top_k: 5,
            semantic_threshold: 0.0,
        }
    }
}

impl PipelineConfig {
    /// Load tuning from environment. Unset or invalid => defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            crisis_threshold: env_u8("SOLACE_CRISIS_THRESHOLD", defaults.crisis_threshold)
                .min(10),
            cag_threshold: env_f32("SOLACE_CAG_THRESHOLD", defaults.cag_threshold),
            rag_threshold: env_f32("SOLACE_RAG_THRESHOLD", defaults.rag_threshold),
            fusion_limit: env_usize("SOLACE_FUSION_LIMIT", defaults.fusion_limit),
            semantic_top_k: env_usize("SOLACE_SEMANTIC_TOP_K", defaults.semantic_top_k),
            semantic_threshold: env_f32("SOLACE_SEMANTIC_THRESHOLD", defaults.semantic_threshold),
        }
    }
}

fn env_u8(name: &str, default: u8) -> u8 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_f32(name: &str, default: f32) -> f32 {
    match std::env::var(name) {
        Ok(v) => v.trim().parse::<f32>().unwrap_or(default).clamp(0.0, 1.0),
        Err(_) => default,
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// User-specific configuration for the generation collaborator, stored in
/// `solace_config.toml`. Lets deployments supply their own key and model
/// without code or environment edits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API key for the chat-completions endpoint.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Preferred model identifier.
    #[serde(default)]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[serde(default)]
    pub api_url: Option<String>,
}

impl GenerationConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from("solace_config.toml")
    }

    /// Load from the default path, or an empty config when the file is absent.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_from_path(&Self::default_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// API key with environment fallback.
    /// Priority: solace_config.toml > SOLACE_LLM_API_KEY > OPENROUTER_API_KEY.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("SOLACE_LLM_API_KEY").ok())
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn resolve_model(&self) -> Option<String> {
        self.model
            .clone()
            .or_else(|| std::env::var("SOLACE_LLM_MODEL").ok())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn resolve_api_url(&self) -> Option<String> {
        self.api_url
            .clone()
            .or_else(|| std::env::var("SOLACE_LLM_API_URL").ok())
            .filter(|s| !s.trim().is_empty())
    }
}
