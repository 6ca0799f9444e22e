//! Curated technique library (CAG): protocol-keyed retrieval over a fixed,
//! pre-vetted technique set with additive relevance scoring.
//!
//! The library is an explicitly constructed, immutable value owned by the
//! orchestrator rather than process-wide state, so tests can inject alternates.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::shared::{
    EmotionalState, EvidenceLevel, Protocol, RetrievalResult, RetrievalSource, Technique,
};

/// Result type for curated store operations.
pub type CuratedResult<T> = Result<T, CuratedError>;

#[derive(Debug, thiserror::Error)]
pub enum CuratedError {
    /// The store was used before a technique library was loaded. Fatal for
    /// the request; never retried.
    #[error("technique library not initialized")]
    NotInitialized,

    #[error("failed to load technique library: {0}")]
    LibraryLoad(String),
}

/// Maximum results returned per retrieval.
pub const CURATED_RESULT_LIMIT: usize = 3;

/// Relevance assigned to the synthesized default technique when a protocol
/// has no library entries.
pub const DEFAULT_TECHNIQUE_RELEVANCE: f32 = 0.85;

const BASE_RELEVANCE: f32 = 0.5;
const EMOTION_MATCH_BONUS: f32 = 0.2;
const OVERLAP_WEIGHT: f32 = 0.3;

/// Tokens excluded from keyword-overlap scoring.
const STOP_WORDS: &[&str] = &[
    "this", "that", "these", "those", "with", "from", "have", "been", "what", "when", "where",
    "which", "will", "would", "could", "about", "just", "like", "them", "then", "than", "there",
    "here", "your", "yours", "some", "very", "into", "over", "because", "really",
];

#[derive(Debug, Deserialize)]
struct TechniqueLibraryFile {
    #[serde(default)]
    techniques: Vec<Technique>,
}

/// Static protocol→technique library with relevance scoring.
#[derive(Debug)]
pub struct CuratedKnowledgeStore {
    techniques: Vec<Technique>,
}

impl CuratedKnowledgeStore {
    /// Builds a store over an explicit technique set.
    pub fn new(techniques: Vec<Technique>) -> Self {
        Self { techniques }
    }

    /// Builds a store over the built-in default library.
    pub fn with_default_library() -> Self {
        let store = Self::new(default_technique_library());
        info!(
            target: "solace::curated",
            "curated store loaded with {} built-in techniques",
            store.techniques.len()
        );
        store
    }

    /// Parses a technique library from TOML (`[[techniques]]` tables).
    pub fn from_toml_str(raw: &str) -> CuratedResult<Self> {
        let file: TechniqueLibraryFile =
            toml::from_str(raw).map_err(|e| CuratedError::LibraryLoad(e.to_string()))?;
        Ok(Self::new(file.techniques))
    }

    /// Loads a technique library from a TOML file on disk.
    pub fn from_toml_path(path: &Path) -> CuratedResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CuratedError::LibraryLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    /// Retrieves up to [`CURATED_RESULT_LIMIT`] results for the protocol,
    /// highest relevance first.
    ///
    /// A protocol with no library entries yields one synthesized default
    /// technique at fixed relevance [`DEFAULT_TECHNIQUE_RELEVANCE`], so a
    /// protocol always has retrievable content.
    pub fn retrieve(
        &self,
        protocol: Protocol,
        user_input: &str,
        state: &EmotionalState,
    ) -> CuratedResult<Vec<RetrievalResult>> {
        if self.techniques.is_empty() {
            return Err(CuratedError::NotInitialized);
        }

        let matching: Vec<&Technique> = self
            .techniques
            .iter()
            .filter(|t| t.protocol == protocol)
            .collect();

        if matching.is_empty() {
            let fallback = default_technique(protocol);
            return Ok(vec![to_result(&fallback, DEFAULT_TECHNIQUE_RELEVANCE)]);
        }

        let mut results: Vec<RetrievalResult> = matching
            .into_iter()
            .map(|t| to_result(t, relevance(t, user_input, state)))
            .collect();
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(CURATED_RESULT_LIMIT);
        Ok(results)
    }
}

impl Default for CuratedKnowledgeStore {
    fn default() -> Self {
        Self::with_default_library()
    }
}

/// Additive relevance: base 0.5; +0.2 on emotion match; +0.3 x keyword
/// overlap; evidence bonus; clamped to 1.0.
fn relevance(technique: &Technique, user_input: &str, state: &EmotionalState) -> f32 {
    let mut score = BASE_RELEVANCE;
    if technique.applies_to(&state.dominant_emotion) {
        score += EMOTION_MATCH_BONUS;
    }
    score += OVERLAP_WEIGHT * keyword_overlap(user_input, &technique.content);
    score += technique.evidence_level.relevance_bonus();
    score.min(1.0)
}

/// Ratio of shared content tokens to the larger token set.
fn keyword_overlap(a: &str, b: &str) -> f32 {
    let ta = content_tokens(a);
    let tb = content_tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    shared as f32 / ta.len().max(tb.len()) as f32
}

/// Lowercased tokens longer than 3 characters, stop words removed.
fn content_tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3 && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

fn to_result(technique: &Technique, score: f32) -> RetrievalResult {
    RetrievalResult {
        content: technique.content.clone(),
        source: RetrievalSource::Curated,
        relevance_score: score,
        protocol: Some(technique.protocol),
        metadata: serde_json::json!({
            "technique": technique.name,
            "evidence_level": technique.evidence_level.label(),
            "applicable_emotions": technique.applicable_emotions,
        }),
    }
}

/// Default technique name when no curated result supplies one.
pub fn default_technique_name(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Cbt => "Cognitive Restructuring",
        Protocol::Dbt => "Distress Tolerance",
        Protocol::Act => "Values Clarification",
        Protocol::Mindfulness => "Mindful Breathing",
        Protocol::Integrative => "Supportive Reflection",
        Protocol::Crisis => "Crisis Intervention",
    }
}

/// Synthesized entry for a protocol with no library content.
fn default_technique(protocol: Protocol) -> Technique {
    let content = match protocol {
        Protocol::Cbt => {
            "Notice the thought, write it down, and weigh the evidence for and against it before drafting a more balanced alternative."
        }
        Protocol::Dbt => {
            "When emotion runs high, slow the moment down: cold water on the face, paced breathing, or intense brief exercise before deciding anything."
        }
        Protocol::Act => {
            "Name what you value in this situation, and pick one small action that moves toward it even while the difficult feeling is present."
        }
        Protocol::Mindfulness => {
            "Settle attention on the breath for a few minutes, noticing when the mind wanders and gently returning without judgment."
        }
        Protocol::Integrative => {
            "Reflect back what was heard, validate the feeling underneath it, and explore what a small next step could look like."
        }
        Protocol::Crisis => {
            "Stay with the person, keep them talking, and connect them to immediate professional support."
        }
    };
    Technique {
        name: default_technique_name(protocol).to_string(),
        content: content.to_string(),
        protocol,
        evidence_level: EvidenceLevel::Medium,
        applicable_emotions: Vec::new(),
    }
}

/// Built-in technique library. Static after load.
fn default_technique_library() -> Vec<Technique> {
    fn t(
        name: &str,
        content: &str,
        protocol: Protocol,
        evidence_level: EvidenceLevel,
        emotions: &[&str],
    ) -> Technique {
        Technique {
            name: name.to_string(),
            content: content.to_string(),
            protocol,
            evidence_level,
            applicable_emotions: emotions.iter().map(|e| e.to_string()).collect(),
        }
    }

    vec![
        // CBT
        t(
            "Cognitive Restructuring",
            "Catch the automatic thought, name the distortion behind it, and weigh the real evidence for and against it before writing a more balanced alternative.",
            Protocol::Cbt,
            EvidenceLevel::High,
            &["sadness", "anxiety", "anger"],
        ),
        t(
            "Thought Record",
            "Keep a thought record: the situation, the automatic thought, the emotion and its strength, the evidence each way, and a balanced re-rating afterward.",
            Protocol::Cbt,
            EvidenceLevel::High,
            &["sadness", "anxiety"],
        ),
        t(
            "Behavioral Activation",
            "Schedule one small, concrete activity that used to bring satisfaction and do it regardless of motivation; mood tends to follow action in low-energy states.",
            Protocol::Cbt,
            EvidenceLevel::High,
            &["sadness"],
        ),
        // DBT
        t(
            "Distress Tolerance",
            "Ride out the emotional wave without making it worse: cold water, paced breathing, or brief intense movement until the surge passes.",
            Protocol::Dbt,
            EvidenceLevel::High,
            &["anger", "fear"],
        ),
        t(
            "Opposite Action",
            "When the urge pushed by the emotion would make things worse, deliberately act opposite to it: approach instead of avoid, soften instead of attack.",
            Protocol::Dbt,
            EvidenceLevel::Medium,
            &["anger", "shame"],
        ),
        t(
            "Wise Mind",
            "Find the overlap between emotional mind and reasonable mind before responding; pause until both perspectives are in the room.",
            Protocol::Dbt,
            EvidenceLevel::Medium,
            &["anger", "confusion"],
        ),
        // ACT
        t(
            "Cognitive Defusion",
            "Put distance between yourself and the thought: say it slowly, sing it, or prefix it with 'I am having the thought that...' until it loosens its grip.",
            Protocol::Act,
            EvidenceLevel::Medium,
            &["anxiety", "sadness"],
        ),
        t(
            "Values Clarification",
            "Name what matters most in this area of life, and choose one action this week that serves it even while the difficult feeling is present.",
            Protocol::Act,
            EvidenceLevel::Medium,
            &["sadness", "confusion"],
        ),
        t(
            "Expansion",
            "Instead of fighting the feeling, make room for it: observe where it sits in the body, breathe into it, and allow it to be there while you act.",
            Protocol::Act,
            EvidenceLevel::Medium,
            &["anxiety", "grief"],
        ),
        // Mindfulness
        t(
            "Mindful Breathing",
            "Rest attention on the breath for five minutes; each time the mind wanders, note where it went and return to the breath without judgment.",
            Protocol::Mindfulness,
            EvidenceLevel::High,
            &["anxiety", "anger"],
        ),
        t(
            "Body Scan",
            "Move attention slowly from head to toe, noticing sensations without trying to change them; useful before sleep or after a stressful day.",
            Protocol::Mindfulness,
            EvidenceLevel::High,
            &["anxiety", "sadness"],
        ),
        t(
            "Grounding 5-4-3-2-1",
            "Anchor to the present through the senses: five things seen, four touched, three heard, two smelled, one tasted.",
            Protocol::Mindfulness,
            EvidenceLevel::Medium,
            &["fear", "anxiety"],
        ),
        // Integrative
        t(
            "Supportive Reflection",
            "Reflect the core of what was said, validate the feeling underneath it, and gently explore what a manageable next step could look like.",
            Protocol::Integrative,
            EvidenceLevel::Medium,
            &["sadness", "confusion", "anger"],
        ),
        t(
            "Strength Inventory",
            "List moments this month that took effort or courage, however small, and what they say about the resources already present.",
            Protocol::Integrative,
            EvidenceLevel::Low,
            &["sadness"],
        ),
    ]
}
