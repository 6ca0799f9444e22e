//! Shared types used across the solace pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -----------------------------------------------------------------------------
// Emotional context, produced upstream by the emotion-analysis collaborator
// -----------------------------------------------------------------------------

/// Emotional state estimate for one incoming utterance. Immutable per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalState {
    /// Dominant emotion label (e.g. "sadness", "fear", "anger").
    pub dominant_emotion: String,
    /// 0.0 = barely present, 1.0 = overwhelming.
    pub intensity: f32,
}

impl EmotionalState {
    pub fn new(dominant_emotion: &str, intensity: f32) -> Self {
        Self {
            dominant_emotion: dominant_emotion.to_string(),
            intensity: intensity.clamp(0.0, 1.0),
        }
    }

    /// True when the response should adopt a gentle, low-pressure tone.
    #[inline]
    pub fn needs_supportive_tone(&self) -> bool {
        self.intensity > 0.7
    }

    /// Hidden instruction appended to the generation prompt when
    /// `needs_supportive_tone()` is true. Never logged as raw emotional data.
    pub const SUPPORTIVE_TONE_INSTRUCTION: &'static str = "The user is under high emotional load. Keep the response gentle, brief, and reassuring. Avoid demands, homework lists, or complex tasks.";
}

/// Read-only context for one request through the decision pipeline.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub user_input: String,
    pub emotional_state: EmotionalState,
    /// Past utterances of the current session, oldest first.
    pub session_history: Option<Vec<String>>,
    pub user_id: Option<String>,
    /// Protocol the session is already running, when one was chosen earlier.
    pub current_protocol: Option<Protocol>,
}

impl QueryContext {
    pub fn new(user_input: &str, emotional_state: EmotionalState) -> Self {
        Self {
            user_input: user_input.to_string(),
            emotional_state,
            session_history: None,
            user_id: None,
            current_protocol: None,
        }
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_session_history(mut self, history: Vec<String>) -> Self {
        self.session_history = Some(history);
        self
    }

    pub fn with_current_protocol(mut self, protocol: Protocol) -> Self {
        self.current_protocol = Some(protocol);
        self
    }
}

// -----------------------------------------------------------------------------
// Protocols and techniques
// -----------------------------------------------------------------------------

/// Named therapeutic framework. `Crisis` is reserved for the safety gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "CBT")]
    Cbt,
    #[serde(rename = "DBT")]
    Dbt,
    #[serde(rename = "ACT")]
    Act,
    Mindfulness,
    Integrative,
    #[serde(rename = "CRISIS")]
    Crisis,
}

impl Protocol {
    /// Stable display label, used in responses and interaction records.
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Cbt => "CBT",
            Protocol::Dbt => "DBT",
            Protocol::Act => "ACT",
            Protocol::Mindfulness => "Mindfulness",
            Protocol::Integrative => "Integrative",
            Protocol::Crisis => "CRISIS",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CBT" => Some(Protocol::Cbt),
            "DBT" => Some(Protocol::Dbt),
            "ACT" => Some(Protocol::Act),
            "MINDFULNESS" => Some(Protocol::Mindfulness),
            "INTEGRATIVE" => Some(Protocol::Integrative),
            "CRISIS" => Some(Protocol::Crisis),
            _ => None,
        }
    }
}

/// Evidence grading for a technique; feeds into curated relevance scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceLevel {
    High,
    Medium,
    Low,
}

impl EvidenceLevel {
    pub fn label(&self) -> &'static str {
        match self {
            EvidenceLevel::High => "high",
            EvidenceLevel::Medium => "medium",
            EvidenceLevel::Low => "low",
        }
    }

    /// Additive relevance bonus in the curated scoring formula.
    #[inline]
    pub fn relevance_bonus(&self) -> f32 {
        match self {
            EvidenceLevel::High => 0.1,
            EvidenceLevel::Medium => 0.05,
            EvidenceLevel::Low => 0.0,
        }
    }
}

/// One intervention in the curated library. Static after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technique {
    pub name: String,
    /// Content template handed to the synthesizer when the technique is selected.
    pub content: String,
    pub protocol: Protocol,
    pub evidence_level: EvidenceLevel,
    /// Emotion labels this technique is indicated for (lowercase).
    #[serde(default)]
    pub applicable_emotions: Vec<String>,
}

impl Technique {
    /// Case-insensitive membership test against `applicable_emotions`.
    pub fn applies_to(&self, emotion: &str) -> bool {
        self.applicable_emotions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(emotion.trim()))
    }
}

// -----------------------------------------------------------------------------
// Retrieval results
// -----------------------------------------------------------------------------

/// Which retriever produced a result. Tagged variant, not a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    Curated,
    Semantic,
}

impl RetrievalSource {
    pub fn label(&self) -> &'static str {
        match self {
            RetrievalSource::Curated => "curated",
            RetrievalSource::Semantic => "semantic",
        }
    }
}

/// One retrieved content candidate. Never mutated after creation; the fusion
/// stage only reorders and truncates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    pub source: RetrievalSource,
    /// 0.0 to 1.0, higher is better.
    pub relevance_score: f32,
    pub protocol: Option<Protocol>,
    /// Open metadata (technique name, evidence level, arbitrary tags).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

// -----------------------------------------------------------------------------
// Terminal output
// -----------------------------------------------------------------------------

/// Terminal output of the pipeline; immutable once returned. Exactly one is
/// produced per QueryContext. Crisis responses never carry retrieval metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapeuticResponse {
    pub timestamp: DateTime<Utc>,
    /// Protocol label ("CBT", "CRISIS", ...).
    pub protocol: String,
    pub technique: String,
    pub response_text: String,
    pub emotional_validation: String,
    /// Up to 3 actionable suggestions, in order.
    pub therapeutic_suggestions: Vec<String>,
    pub is_crisis: bool,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

// -----------------------------------------------------------------------------
// History collaborator records
// -----------------------------------------------------------------------------

/// Structured summary of past sessions, supplied by the history collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySummary {
    #[serde(default)]
    pub recent_themes: Vec<String>,
    /// Free-text trend (e.g. "gradually improving", "volatile this week").
    #[serde(default)]
    pub emotional_trajectory: String,
    #[serde(default)]
    pub progress_indicators: Vec<String>,
    #[serde(default)]
    pub previous_protocols: Vec<Protocol>,
}

/// One completed interaction, sent fire-and-forget to the logging collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub dominant_emotion: String,
    pub protocol: String,
    pub technique: String,
    pub response_text: String,
    pub is_crisis: bool,
}

impl InteractionRecord {
    /// Builds a record from the request context and the finished response.
    pub fn from_response(
        user_id: &str,
        ctx: &QueryContext,
        response: &TherapeuticResponse,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            timestamp: response.timestamp,
            user_input: ctx.user_input.clone(),
            dominant_emotion: ctx.emotional_state.dominant_emotion.clone(),
            protocol: response.protocol.clone(),
            technique: response.technique.clone(),
            response_text: response.response_text.clone(),
            is_crisis: response.is_crisis,
        }
    }
}
