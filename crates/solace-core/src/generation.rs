//! Text-generation collaborator: the trait the pipeline calls against, plus
//! an OpenAI-compatible HTTP bridge implementation.
//!
//! The bridge receives a fully grounded prompt (the pipeline attaches
//! retrieved content and history before calling) and is used for wording
//! only; selection and safety decisions stay local.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";

/// Result type for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("generation response parse failed: {0}")]
    Parse(String),
}

/// External text-generation collaborator. The pipeline makes exactly one call
/// per request and does not retry.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> GenerationResult<String>;
}

// OpenAI-compatible request/response shapes.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

const SYSTEM_PROMPT: &str = "You are the response stage of a therapeutic support system. \
    You will receive the active protocol, a primary technique, vetted therapeutic content, \
    and optional session history. Respond in plain prose: a short opening reflection first, \
    one sentence acknowledging how the user feels, then up to three concrete suggestions, \
    each on its own line starting with 'Try'. Do not diagnose, and do not invent clinical facts \
    beyond the provided content.";

/// HTTP bridge to an OpenAI-compatible chat-completions endpoint.
pub struct GenerationBridge {
    api_key: String,
    model: String,
    api_base: String,
    client: reqwest::Client,
}

impl GenerationBridge {
    /// Builds a bridge from user config / environment. `None` when no API key
    /// is configured anywhere.
    pub fn from_config(config: &GenerationConfig) -> Option<Self> {
        let key = config.resolve_api_key()?;
        let mut bridge = Self::new(key);
        if let Some(model) = config.resolve_model() {
            bridge = bridge.with_model(&model);
        }
        if let Some(url) = config.resolve_api_url() {
            bridge = bridge.with_api_base(&url);
        }
        Some(bridge)
    }

    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.trim().to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            client,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TextGenerator for GenerationBridge {
    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(0.6),
            max_tokens: Some(512),
        };

        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status, body });
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| GenerationError::Parse("response contained no choices".to_string()))
    }
}
