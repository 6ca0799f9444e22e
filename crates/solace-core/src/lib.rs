//! solace-core: the therapeutic decision pipeline.
//!
//! Turns one user utterance plus an emotional-state estimate into a single
//! therapeutic response: crisis safety gate, retrieval-strategy selection,
//! curated (CAG) and semantic (RAG) retrieval, fusion/ranking, history
//! augmentation, and response synthesis against an external text-generation
//! collaborator.
//!
//! Persistence, UI, and the collaborators themselves live outside this crate;
//! only the seams the pipeline calls against ([`TextGenerator`],
//! [`HistoryStore`]) are defined here.

mod config;
mod crisis;
mod generation;
mod history;
mod pipeline;
mod retrieval;
mod routing;
mod shared;

// Shared pipeline types
pub use shared::{
    EmotionalState, EvidenceLevel, HistorySummary, InteractionRecord, Protocol, QueryContext,
    RetrievalResult, RetrievalSource, Technique, TherapeuticResponse,
};

// Crisis safety gate (single crisis authority)
pub use crisis::{crisis_response, CrisisGate, CRISIS_KEYWORDS, CRISIS_RESOURCES, CRISIS_TECHNIQUE};

// Routing: retrieval strategy + protocol cascade
pub use routing::{
    has_restructuring_trigger, matches_distortion, ProtocolSelector, RetrievalStrategy,
    StrategySelector,
};

// Curated retrieval (CAG)
pub use retrieval::curated::{
    default_technique_name, CuratedError, CuratedKnowledgeStore, CuratedResult,
    CURATED_RESULT_LIMIT, DEFAULT_TECHNIQUE_RELEVANCE,
};

// Semantic retrieval (RAG) + deterministic placeholder embeddings
pub use retrieval::embedding::{cosine_similarity, embed, EMBEDDING_DIM};
pub use retrieval::semantic::{
    SearchOptions, SemanticError, SemanticIndex, SemanticResult, VectorDocument,
};

// Fusion/ranking
pub use retrieval::fusion::{FusionRanker, CAG_THRESHOLD, FUSION_LIMIT, RAG_THRESHOLD};

// Collaborator seams
pub use generation::{GenerationBridge, GenerationError, GenerationResult, TextGenerator};
pub use history::{HistoryError, HistoryResult, HistoryStore, NullHistoryStore};

// Orchestrator + synthesis seam
pub use pipeline::synthesis::{build_prompt, ParsedResponse, ResponseParser};
pub use pipeline::{PipelineError, PipelineResult, TherapyPipeline};

// Configuration
pub use config::{GenerationConfig, PipelineConfig};
