//! Decision pipeline integration tests: verifies the full request flow with
//! scripted collaborators.
//!
//! 1. Crisis inputs short-circuit before any collaborator is touched
//! 2. Distortion language forces CBT / Cognitive Restructuring
//! 3. Hybrid and semantic flows synthesize complete responses
//! 4. Recoverable collaborator failures never fail the request
//!
//! Run with: `cargo test --test decision_pipeline_test`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use solace_core::{
    CuratedKnowledgeStore, EmotionalState, GenerationError, GenerationResult, HistoryError,
    HistoryResult, HistoryStore, HistorySummary, InteractionRecord, NullHistoryStore,
    PipelineConfig, PipelineError, Protocol, QueryContext, SemanticError, SemanticIndex,
    TextGenerator, TherapyPipeline,
};

const SCRIPTED_REPLY: &str = "It sounds like that conversation took a real toll on you.\n\
Your feelings about this are valid.\n\
Try naming what you needed from them in one sentence.\n\
It might help to write down what you want to say next time.";

/// Generator that returns a fixed reply and counts invocations.
struct ScriptedGenerator {
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> GenerationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SCRIPTED_REPLY.to_string())
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> GenerationResult<String> {
        Err(GenerationError::Request("connection refused".to_string()))
    }
}

/// History store with scriptable failures and captured interactions.
struct RecordingHistoryStore {
    summary: Option<HistorySummary>,
    fail_fetch: bool,
    fail_append: bool,
    interactions: Mutex<Vec<InteractionRecord>>,
}

impl RecordingHistoryStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            summary: None,
            fail_fetch: false,
            fail_append: false,
            interactions: Mutex::new(Vec::new()),
        })
    }

    fn with_summary(summary: HistorySummary) -> Arc<Self> {
        Arc::new(Self {
            summary: Some(summary),
            fail_fetch: false,
            fail_append: false,
            interactions: Mutex::new(Vec::new()),
        })
    }

    fn failing(fail_fetch: bool, fail_append: bool) -> Arc<Self> {
        Arc::new(Self {
            summary: None,
            fail_fetch,
            fail_append,
            interactions: Mutex::new(Vec::new()),
        })
    }

    fn recorded(&self) -> Vec<InteractionRecord> {
        self.interactions.lock().expect("interactions lock").clone()
    }
}

#[async_trait]
impl HistoryStore for RecordingHistoryStore {
    async fn fetch_history(&self, _user_id: &str) -> HistoryResult<Option<HistorySummary>> {
        if self.fail_fetch {
            return Err(HistoryError::Unavailable("store offline".to_string()));
        }
        Ok(self.summary.clone())
    }

    async fn append_interaction(&self, record: &InteractionRecord) -> HistoryResult<()> {
        if self.fail_append {
            return Err(HistoryError::WriteFailed("store offline".to_string()));
        }
        self.interactions
            .lock()
            .expect("interactions lock")
            .push(record.clone());
        Ok(())
    }
}

fn build_pipeline(
    generator: Arc<dyn TextGenerator>,
    history: Arc<dyn HistoryStore>,
    initialize_semantic: bool,
) -> TherapyPipeline {
    let semantic = Arc::new(SemanticIndex::new());
    if initialize_semantic {
        semantic.initialize();
    }
    TherapyPipeline::new(
        PipelineConfig::default(),
        CuratedKnowledgeStore::with_default_library(),
        semantic,
        generator,
        history,
    )
}

#[tokio::test]
async fn crisis_input_short_circuits_every_collaborator() {
    let generator = ScriptedGenerator::new();
    let history = RecordingHistoryStore::new();
    let pipeline = build_pipeline(generator.clone(), history.clone(), true);

    let ctx = QueryContext::new("I want to kill myself", EmotionalState::new("sadness", 0.95))
        .with_user_id("user-1");
    let response = pipeline.respond(&ctx).await.expect("crisis response");

    assert!(response.is_crisis);
    assert_eq!(response.protocol, "CRISIS");
    assert_eq!(response.technique, "Crisis Intervention");
    assert!(!response.therapeutic_suggestions.is_empty());
    // Crisis responses never carry retrieval metadata.
    assert!(response.metadata.is_none());
    // No generation call, no interaction logging.
    assert_eq!(generator.call_count(), 0);
    assert!(history.recorded().is_empty());
}

#[tokio::test]
async fn distortion_language_forces_cbt_and_cognitive_restructuring() {
    let generator = ScriptedGenerator::new();
    let history = RecordingHistoryStore::new();
    let pipeline = build_pipeline(generator.clone(), history, true);

    let ctx = QueryContext::new(
        "I always mess everything up, I'm a failure",
        EmotionalState::new("sadness", 0.6),
    );
    let response = pipeline.respond(&ctx).await.expect("response");

    assert!(!response.is_crisis);
    assert_eq!(response.protocol, "CBT");
    assert_eq!(response.technique, "Cognitive Restructuring");
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn hybrid_flow_synthesizes_and_logs_a_complete_response() {
    let generator = ScriptedGenerator::new();
    let history = RecordingHistoryStore::with_summary(HistorySummary {
        recent_themes: vec!["family".to_string()],
        emotional_trajectory: "steady".to_string(),
        progress_indicators: vec![],
        previous_protocols: vec![Protocol::Integrative],
    });
    let pipeline = build_pipeline(generator.clone(), history.clone(), true);

    let ctx = QueryContext::new(
        "I had a hard conversation with my sister",
        EmotionalState::new("sadness", 0.4),
    )
    .with_user_id("user-7");
    let response = pipeline.respond(&ctx).await.expect("response");

    assert!(!response.is_crisis);
    assert_eq!(response.protocol, "Integrative");
    assert_eq!(
        response.response_text,
        "It sounds like that conversation took a real toll on you."
    );
    assert_eq!(response.emotional_validation, "Your feelings about this are valid.");
    assert_eq!(response.therapeutic_suggestions.len(), 2);
    assert!(response.therapeutic_suggestions.len() <= 3);

    let metadata = response.metadata.expect("retrieval metadata");
    assert_eq!(metadata.get("strategy").and_then(|v| v.as_str()), Some("hybrid"));

    let recorded = history.recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].user_id, "user-7");
    assert_eq!(recorded[0].protocol, "Integrative");
    assert!(!recorded[0].is_crisis);
}

#[tokio::test]
async fn semantic_strategy_draws_from_the_index() {
    let generator = ScriptedGenerator::new();

    // Index a document whose content matches the query exactly: the
    // deterministic embedder scores it 1.0, clearing the fusion threshold.
    let query = "recent research on sleep and mood";
    let semantic = Arc::new(SemanticIndex::new());
    semantic.initialize();
    semantic
        .add_document("doc-query", query, serde_json::json!({ "topic": "sleep" }))
        .expect("add document");
    let pipeline = TherapyPipeline::new(
        PipelineConfig::default(),
        CuratedKnowledgeStore::with_default_library(),
        semantic,
        generator.clone(),
        RecordingHistoryStore::new(),
    );

    let ctx = QueryContext::new(query, EmotionalState::new("neutral", 0.3));
    let response = pipeline.respond(&ctx).await.expect("response");

    let metadata = response.metadata.expect("retrieval metadata");
    assert_eq!(
        metadata.get("strategy").and_then(|v| v.as_str()),
        Some("semantic")
    );
    let sources: Vec<String> = metadata
        .get("sources")
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|s| s.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    assert!(sources.contains(&"semantic".to_string()));
}

#[tokio::test]
async fn history_fetch_failure_never_fails_the_request() {
    let generator = ScriptedGenerator::new();
    let history = RecordingHistoryStore::failing(true, false);
    let pipeline = build_pipeline(generator, history, true);

    let ctx = QueryContext::new(
        "work has been heavy this month",
        EmotionalState::new("sadness", 0.5),
    )
    .with_user_id("user-2");
    let response = pipeline.respond(&ctx).await.expect("response despite history failure");
    assert!(!response.is_crisis);
}

#[tokio::test]
async fn interaction_logging_failure_never_fails_the_request() {
    let generator = ScriptedGenerator::new();
    let history = RecordingHistoryStore::failing(false, true);
    let pipeline = build_pipeline(generator, history, true);

    let ctx = QueryContext::new(
        "work has been heavy this month",
        EmotionalState::new("sadness", 0.5),
    )
    .with_user_id("user-3");
    let response = pipeline.respond(&ctx).await.expect("response despite logging failure");
    assert!(!response.is_crisis);
}

#[tokio::test]
async fn generation_failure_surfaces_as_request_error() {
    let history = RecordingHistoryStore::new();
    let pipeline = build_pipeline(Arc::new(FailingGenerator), history.clone(), true);

    let ctx = QueryContext::new(
        "I keep replaying the argument",
        EmotionalState::new("anger", 0.5),
    )
    .with_user_id("user-4");
    let err = pipeline.respond(&ctx).await.expect_err("generation error");
    assert!(matches!(err, PipelineError::Generation(_)));
    // A failed request logs nothing.
    assert!(history.recorded().is_empty());
}

#[tokio::test]
async fn semantic_search_before_initialize_is_fatal_for_the_request() {
    let generator = ScriptedGenerator::new();
    let history = RecordingHistoryStore::new();
    let pipeline = build_pipeline(generator.clone(), history, false);

    // Temporal markers route this to the semantic index.
    let ctx = QueryContext::new(
        "What do recent studies say about mindfulness?",
        EmotionalState::new("neutral", 0.2),
    );
    let err = pipeline.respond(&ctx).await.expect_err("initialization error");
    assert!(matches!(
        err,
        PipelineError::Semantic(SemanticError::NotInitialized)
    ));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn anonymous_requests_skip_history_and_logging() {
    let generator = ScriptedGenerator::new();
    let pipeline = TherapyPipeline::new(
        PipelineConfig::default(),
        CuratedKnowledgeStore::with_default_library(),
        {
            let semantic = Arc::new(SemanticIndex::new());
            semantic.initialize();
            semantic
        },
        generator.clone(),
        Arc::new(NullHistoryStore),
    );

    // No user_id: no history fetch, no interaction logging, still one response.
    let ctx = QueryContext::new(
        "I had a hard conversation with my sister",
        EmotionalState::new("sadness", 0.4),
    );
    let response = pipeline.respond(&ctx).await.expect("response");
    assert!(!response.is_crisis);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn session_protocol_reaches_dbt_content() {
    let generator = ScriptedGenerator::new();
    let history = RecordingHistoryStore::new();
    let pipeline = build_pipeline(generator, history, true);

    let ctx = QueryContext::new(
        "everything at once is too much for me",
        EmotionalState::new("anger", 0.6),
    )
    .with_current_protocol(Protocol::Dbt);
    let response = pipeline.respond(&ctx).await.expect("response");
    assert_eq!(response.protocol, "DBT");
}
