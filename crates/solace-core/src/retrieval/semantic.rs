//! Semantic index (RAG): cosine nearest-neighbor search over an embedded
//! document set, with metadata filters and serialized mutations.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::embedding::{cosine_similarity, embed, EMBEDDING_DIM};
use crate::shared::{Protocol, RetrievalResult, RetrievalSource};

/// Result type for semantic index operations.
pub type SemanticResult<T> = Result<T, SemanticError>;

/// Errors that can occur during semantic index operations.
#[derive(Debug, thiserror::Error)]
pub enum SemanticError {
    #[error("semantic index used before initialize()")]
    NotInitialized,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unknown document: {0}")]
    UnknownDocument(String),
}

/// One indexed document with its cached embedding. The embedding is recomputed
/// whenever the content changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDocument {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Search tuning for one query.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results.
    pub top_k: usize,
    /// Minimum cosine similarity to admit a result.
    pub threshold: f32,
    /// Exact-match equality filters applied against document metadata.
    pub filters: serde_json::Map<String, serde_json::Value>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.0,
            filters: serde_json::Map::new(),
        }
    }
}

/// Fixed seed corpus loaded by `initialize()`.
const SEED_DOCUMENTS: &[(&str, &str, &str, &str)] = &[
    (
        "doc-cbt-evidence",
        "Cognitive behavioral therapy consistently outperforms waitlist controls for depression and anxiety across dozens of randomized trials, with effects maintained at one-year follow-up.",
        "CBT",
        "evidence",
    ),
    (
        "doc-cbt-distortions",
        "Common cognitive distortions include all-or-nothing thinking, overgeneralization, catastrophizing, and labeling. Naming the distortion is the first step of restructuring.",
        "CBT",
        "psychoeducation",
    ),
    (
        "doc-dbt-skills",
        "Dialectical behavior therapy teaches distress tolerance and emotion regulation skills, originally developed for intense, rapidly shifting emotional states.",
        "DBT",
        "psychoeducation",
    ),
    (
        "doc-act-values",
        "Acceptance and commitment therapy emphasizes willingness to experience difficult feelings while moving toward chosen values rather than fighting internal experience.",
        "ACT",
        "psychoeducation",
    ),
    (
        "doc-mindfulness-studies",
        "Recent meta-analyses of mindfulness-based stress reduction report moderate reductions in anxiety and rumination after eight weeks of regular practice.",
        "Mindfulness",
        "evidence",
    ),
    (
        "doc-sleep-hygiene",
        "Sleep deprivation amplifies next-day negative affect. Consistent wake times, reduced evening screen exposure, and a wind-down routine improve sleep quality within weeks.",
        "Integrative",
        "psychoeducation",
    ),
    (
        "doc-grounding-research",
        "Brief sensory grounding exercises lower acute physiological arousal within minutes and are a recommended first response to panic symptoms.",
        "Mindfulness",
        "evidence",
    ),
    (
        "doc-behavioral-activation",
        "Scheduling small, achievable activities reliably improves mood in low-energy depressive states, even before motivation returns.",
        "CBT",
        "evidence",
    ),
];

struct IndexState {
    documents: HashMap<String, VectorDocument>,
    initialized: bool,
}

/// In-memory semantic index. Mutations (add/update/delete) serialize against
/// reads behind one lock so a document is never observed without its embedding.
pub struct SemanticIndex {
    state: RwLock<IndexState>,
}

impl SemanticIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState {
                documents: HashMap::new(),
                initialized: false,
            }),
        }
    }

    /// Loads and embeds the fixed seed document set. Idempotent.
    pub fn initialize(&self) {
        let mut state = self.state.write().expect("semantic index lock poisoned");
        if state.initialized {
            return;
        }
        for (id, content, protocol, topic) in SEED_DOCUMENTS {
            let doc = VectorDocument {
                id: id.to_string(),
                content: content.to_string(),
                embedding: embed(content),
                metadata: serde_json::json!({ "protocol": protocol, "topic": topic }),
                timestamp: Utc::now(),
            };
            state.documents.insert(doc.id.clone(), doc);
        }
        state.initialized = true;
        info!(
            target: "solace::semantic",
            "semantic index initialized with {} seed documents",
            state.documents.len()
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().expect("semantic index lock poisoned").initialized
    }

    pub fn len(&self) -> usize {
        self.state.read().expect("semantic index lock poisoned").documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexes a new document, embedding its content.
    pub fn add_document(
        &self,
        id: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> SemanticResult<()> {
        let mut state = self.state.write().expect("semantic index lock poisoned");
        if !state.initialized {
            return Err(SemanticError::NotInitialized);
        }
        let doc = VectorDocument {
            id: id.to_string(),
            content: content.to_string(),
            embedding: embed(content),
            metadata,
            timestamp: Utc::now(),
        };
        state.documents.insert(doc.id.clone(), doc);
        Ok(())
    }

    /// Replaces a document's content and recomputes its embedding in one step.
    pub fn update_document(&self, id: &str, content: &str) -> SemanticResult<()> {
        let mut state = self.state.write().expect("semantic index lock poisoned");
        if !state.initialized {
            return Err(SemanticError::NotInitialized);
        }
        let doc = state
            .documents
            .get_mut(id)
            .ok_or_else(|| SemanticError::UnknownDocument(id.to_string()))?;
        doc.content = content.to_string();
        doc.embedding = embed(content);
        doc.timestamp = Utc::now();
        Ok(())
    }

    /// Removes a document and its cached embedding.
    pub fn delete_document(&self, id: &str) -> SemanticResult<()> {
        let mut state = self.state.write().expect("semantic index lock poisoned");
        if !state.initialized {
            return Err(SemanticError::NotInitialized);
        }
        state
            .documents
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SemanticError::UnknownDocument(id.to_string()))
    }

    /// Returns a snapshot of one document, mainly for inspection in tests.
    pub fn get_document(&self, id: &str) -> Option<VectorDocument> {
        self.state
            .read()
            .expect("semantic index lock poisoned")
            .documents
            .get(id)
            .cloned()
    }

    /// Nearest-neighbor search by query embedding.
    ///
    /// Every key in `options.filters` must equal the document metadata value
    /// exactly. Results with similarity >= threshold are returned descending,
    /// truncated to `top_k`.
    pub fn search(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> SemanticResult<Vec<RetrievalResult>> {
        if query_embedding.len() != EMBEDDING_DIM {
            return Err(SemanticError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: query_embedding.len(),
            });
        }
        let state = self.state.read().expect("semantic index lock poisoned");
        if !state.initialized {
            return Err(SemanticError::NotInitialized);
        }

        let mut scored: Vec<(f32, &VectorDocument)> = Vec::new();
        for doc in state.documents.values() {
            if !metadata_matches(&doc.metadata, &options.filters) {
                continue;
            }
            let score = cosine_similarity(query_embedding, &doc.embedding)?;
            if score >= options.threshold {
                scored.push((score, doc));
            }
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(options.top_k);

        Ok(scored
            .into_iter()
            .map(|(score, doc)| RetrievalResult {
                content: doc.content.clone(),
                source: RetrievalSource::Semantic,
                relevance_score: score,
                protocol: doc
                    .metadata
                    .get("protocol")
                    .and_then(|v| v.as_str())
                    .and_then(Protocol::from_label),
                metadata: doc.metadata.clone(),
            })
            .collect())
    }

    /// Convenience: embed the query text, then search.
    pub fn search_text(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> SemanticResult<Vec<RetrievalResult>> {
        self.search(&embed(query), options)
    }
}

impl Default for SemanticIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn metadata_matches(
    metadata: &serde_json::Value,
    filters: &serde_json::Map<String, serde_json::Value>,
) -> bool {
    filters
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}
