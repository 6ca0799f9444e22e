//! Therapeutic decision pipeline orchestrator.
//!
//! Per request: crisis gate first (always, synchronously), then strategy and
//! protocol selection, retrieval fan-out, fusion, history augmentation,
//! prompt synthesis, one generation call, heuristic extraction, and optional
//! interaction logging. Exactly one response per context.

pub mod synthesis;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::crisis::{crisis_response, CrisisGate};
use crate::generation::{GenerationError, TextGenerator};
use crate::history::HistoryStore;
use crate::retrieval::curated::{default_technique_name, CuratedError, CuratedKnowledgeStore};
use crate::retrieval::fusion::FusionRanker;
use crate::retrieval::semantic::{SearchOptions, SemanticError, SemanticIndex};
use crate::routing::{
    has_restructuring_trigger, matches_distortion, ProtocolSelector, RetrievalStrategy,
    StrategySelector,
};
use crate::shared::{
    HistorySummary, InteractionRecord, Protocol, QueryContext, RetrievalResult, RetrievalSource,
    TherapeuticResponse,
};
use synthesis::ResponseParser;

/// Result type for pipeline requests.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Request-level failures. Recoverable collaborator errors (history fetch,
/// interaction logging) never appear here; they are swallowed at the call
/// site.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Curated(#[from] CuratedError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error("generation collaborator failed: {0}")]
    Generation(#[from] GenerationError),
}

/// The assembled decision pipeline. All components are injected; the curated
/// library is an immutable value owned here, not global state.
pub struct TherapyPipeline {
    config: PipelineConfig,
    curated: CuratedKnowledgeStore,
    semantic: Arc<SemanticIndex>,
    fusion: FusionRanker,
    generator: Arc<dyn TextGenerator>,
    history: Arc<dyn HistoryStore>,
}

impl TherapyPipeline {
    pub fn new(
        config: PipelineConfig,
        curated: CuratedKnowledgeStore,
        semantic: Arc<SemanticIndex>,
        generator: Arc<dyn TextGenerator>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let fusion = FusionRanker::new(
            config.cag_threshold,
            config.rag_threshold,
            config.fusion_limit,
        );
        Self {
            config,
            curated,
            semantic,
            fusion,
            generator,
            history,
        }
    }

    /// Runs one request through the pipeline and returns its single response.
    pub async fn respond(&self, ctx: &QueryContext) -> PipelineResult<TherapeuticResponse> {
        // The gate is unconditional and completes before anything else runs.
        let crisis_score = CrisisGate::score(&ctx.user_input, &ctx.emotional_state);
        if crisis_score >= self.config.crisis_threshold {
            warn!(
                target: "solace::pipeline",
                score = crisis_score,
                "crisis gate tripped; returning fixed crisis response"
            );
            return Ok(crisis_response());
        }

        let strategy = StrategySelector::select(ctx);
        let protocol = ProtocolSelector::select(ctx);
        debug!(
            target: "solace::pipeline",
            strategy = strategy.as_str(),
            protocol = protocol.label(),
            "routing decided"
        );

        // History is independent of retrieval; run both concurrently.
        let (retrieved, history) =
            tokio::join!(self.retrieve(strategy, protocol, ctx), self.fetch_history(ctx));
        let retrieved = retrieved?;

        let fused = self.fusion.select(retrieved);
        let (protocol, technique) = apply_overrides(ctx, protocol, &fused);

        let prompt = synthesis::build_prompt(ctx, protocol, &technique, &fused, history.as_ref());
        let raw = self.generator.generate(&prompt).await?;
        let parsed = ResponseParser::parse(&raw);

        let sources: Vec<&str> = fused.iter().map(|r| r.source.label()).collect();
        let response = TherapeuticResponse {
            timestamp: Utc::now(),
            protocol: protocol.label().to_string(),
            technique,
            response_text: parsed.response_text,
            emotional_validation: parsed.emotional_validation,
            therapeutic_suggestions: parsed.suggestions,
            is_crisis: false,
            metadata: Some(serde_json::json!({
                "strategy": strategy.as_str(),
                "crisis_score": crisis_score,
                "result_count": fused.len(),
                "sources": sources,
            })),
        };

        if let Some(user_id) = ctx.user_id.as_deref() {
            let record = InteractionRecord::from_response(user_id, ctx, &response);
            if let Err(e) = self.history.append_interaction(&record).await {
                warn!(
                    target: "solace::pipeline",
                    "interaction logging failed: {}; response is unaffected", e
                );
            }
        }

        info!(
            target: "solace::pipeline",
            protocol = response.protocol.as_str(),
            technique = response.technique.as_str(),
            "response synthesized"
        );
        Ok(response)
    }

    /// Fan-out to the selected retriever(s). Curated and semantic retrieval
    /// are independent; Hybrid issues both and joins before fusion.
    async fn retrieve(
        &self,
        strategy: RetrievalStrategy,
        protocol: Protocol,
        ctx: &QueryContext,
    ) -> PipelineResult<Vec<RetrievalResult>> {
        match strategy {
            RetrievalStrategy::Curated => Ok(self.curated.retrieve(
                protocol,
                &ctx.user_input,
                &ctx.emotional_state,
            )?),
            RetrievalStrategy::Semantic => Ok(self.semantic_search(ctx)?),
            RetrievalStrategy::Hybrid => {
                let (curated, semantic) = tokio::join!(
                    async { self.curated.retrieve(protocol, &ctx.user_input, &ctx.emotional_state) },
                    async { self.semantic_search(ctx) }
                );
                let mut all = curated?;
                all.extend(semantic?);
                Ok(all)
            }
        }
    }

    fn semantic_search(&self, ctx: &QueryContext) -> Result<Vec<RetrievalResult>, SemanticError> {
        let options = SearchOptions {
            top_k: self.config.semantic_top_k,
            threshold: self.config.semantic_threshold,
            filters: serde_json::Map::new(),
        };
        self.semantic.search_text(&ctx.user_input, &options)
    }

    /// History failures are collaborator-side-effect-only: logged, never
    /// propagated.
    async fn fetch_history(&self, ctx: &QueryContext) -> Option<HistorySummary> {
        let user_id = ctx.user_id.as_deref()?;
        match self.history.fetch_history(user_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(
                    target: "solace::pipeline",
                    "history fetch failed: {}; continuing without history", e
                );
                None
            }
        }
    }
}

/// Post-fusion overrides: cognitive-distortion language forces CBT, and the
/// high-salience triggers force Cognitive Restructuring, regardless of which
/// retriever supplied the content.
fn apply_overrides(
    ctx: &QueryContext,
    selected: Protocol,
    fused: &[RetrievalResult],
) -> (Protocol, String) {
    let mut protocol = selected;
    let mut technique = choose_technique(fused, protocol);

    if matches_distortion(&ctx.user_input) {
        protocol = Protocol::Cbt;
        if has_restructuring_trigger(&ctx.user_input) {
            technique = "Cognitive Restructuring".to_string();
        } else if !fused
            .iter()
            .any(|r| r.source == RetrievalSource::Curated && r.protocol == Some(Protocol::Cbt))
        {
            technique = default_technique_name(Protocol::Cbt).to_string();
        }
    }

    (protocol, technique)
}

/// The highest-ranked curated result names the technique; otherwise the
/// protocol's default technique applies.
fn choose_technique(fused: &[RetrievalResult], protocol: Protocol) -> String {
    fused
        .iter()
        .find(|r| r.source == RetrievalSource::Curated)
        .and_then(|r| r.metadata.get("technique").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .unwrap_or_else(|| default_technique_name(protocol).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::EmotionalState;

    fn result(source: RetrievalSource, technique: Option<&str>, protocol: Protocol) -> RetrievalResult {
        RetrievalResult {
            content: "content".into(),
            source,
            relevance_score: 0.9,
            protocol: Some(protocol),
            metadata: match technique {
                Some(name) => serde_json::json!({ "technique": name }),
                None => serde_json::Value::Null,
            },
        }
    }

    fn ctx(input: &str) -> QueryContext {
        QueryContext::new(input, EmotionalState::new("neutral", 0.3))
    }

    #[test]
    fn technique_comes_from_top_curated_result() {
        let fused = vec![
            result(RetrievalSource::Semantic, None, Protocol::Cbt),
            result(RetrievalSource::Curated, Some("Thought Record"), Protocol::Cbt),
        ];
        assert_eq!(choose_technique(&fused, Protocol::Cbt), "Thought Record");
    }

    #[test]
    fn technique_falls_back_to_protocol_default() {
        let fused = vec![result(RetrievalSource::Semantic, None, Protocol::Act)];
        assert_eq!(
            choose_technique(&fused, Protocol::Act),
            default_technique_name(Protocol::Act)
        );
    }

    #[test]
    fn distortion_override_forces_cbt_and_restructuring() {
        let fused = vec![result(
            RetrievalSource::Curated,
            Some("Body Scan"),
            Protocol::Mindfulness,
        )];
        let (protocol, technique) =
            apply_overrides(&ctx("I always fail at this"), Protocol::Mindfulness, &fused);
        assert_eq!(protocol, Protocol::Cbt);
        assert_eq!(technique, "Cognitive Restructuring");
    }

    #[test]
    fn no_override_without_distortion_language() {
        let fused = vec![result(
            RetrievalSource::Curated,
            Some("Body Scan"),
            Protocol::Mindfulness,
        )];
        let (protocol, technique) =
            apply_overrides(&ctx("a calm check-in"), Protocol::Mindfulness, &fused);
        assert_eq!(protocol, Protocol::Mindfulness);
        assert_eq!(technique, "Body Scan");
    }
}
