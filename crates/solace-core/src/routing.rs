//! Retrieval-strategy selection and protocol cascade.
//!
//! Keyword gating: protocol-specific or crisis-adjacent language draws from
//! the vetted curated library; requests referencing external or time-bound
//! facts draw from the semantic index; everything else blends both.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::shared::{Protocol, QueryContext};

/// Which retriever(s) to consult for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    Curated,
    Semantic,
    /// Consult both retrievers and concatenate their output before fusion.
    Hybrid,
}

impl RetrievalStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalStrategy::Curated => "curated",
            RetrievalStrategy::Semantic => "semantic",
            RetrievalStrategy::Hybrid => "hybrid",
        }
    }
}

/// Protocol-specific or crisis-adjacent language: route to the vetted library.
const CURATED_PATTERNS: &[&str] = &[
    "panic attack",
    "anxiety attack",
    "thought record",
    "grounding",
    "breathing exercise",
    "coping skill",
    "intrusive thought",
    "relapse",
    "overwhelmed",
    "crisis",
];

/// Markers for external or time-bound information: route to the semantic index.
const SEMANTIC_PATTERNS: &[&str] = &[
    "today",
    "yesterday",
    "recently",
    "recent",
    "last week",
    "last night",
    "this week",
    "latest",
    "news",
    "research",
    "studies",
    "study",
];

/// Cognitive-distortion vocabulary (all-or-nothing, labeling, catastrophizing).
/// Word-bounded so short terms do not match inside longer words.
static DISTORTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(always|never|should|must|everyone|nobody|no one|failure|worthless|stupid|hopeless|ruined)\b",
    )
    .expect("distortion pattern compiles")
});

/// High-salience CBT trigger vocabulary that forces Cognitive Restructuring.
static RESTRUCTURING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(always|failure|stupid)\b").expect("trigger pattern compiles"));

/// Acceptance-struggle language routed to ACT.
const ACCEPTANCE_PATTERNS: &[&str] = &[
    "can't accept",
    "cannot accept",
    "why me",
    "fighting with",
    "refuse to believe",
    "wish it never happened",
];

/// Explicit CBT technique phrases.
const CBT_PHRASES: &[&str] = &["thought record", "cognitive distortion", "reframe"];

/// True when the input matches the cognitive-distortion pattern set.
pub fn matches_distortion(text: &str) -> bool {
    DISTORTION_RE.is_match(text)
}

/// True when the input carries a high-salience trigger for Cognitive Restructuring.
pub fn has_restructuring_trigger(text: &str) -> bool {
    RESTRUCTURING_RE.is_match(text)
}

/// Chooses which retriever(s) to consult. First matching rule wins.
pub struct StrategySelector;

impl StrategySelector {
    pub fn select(ctx: &QueryContext) -> RetrievalStrategy {
        let input = ctx.user_input.to_lowercase();
        if CURATED_PATTERNS.iter().any(|p| input.contains(p)) || matches_distortion(&ctx.user_input)
        {
            return RetrievalStrategy::Curated;
        }
        if SEMANTIC_PATTERNS.iter().any(|p| input.contains(p)) {
            return RetrievalStrategy::Semantic;
        }
        // Ambiguous or multi-faceted queries benefit from blending both.
        RetrievalStrategy::Hybrid
    }
}

/// Chooses a protocol label via a first-match rule cascade. No scoring is
/// combined across rules.
pub struct ProtocolSelector;

impl ProtocolSelector {
    /// An explicit session protocol is honored ahead of the text cascade;
    /// that is the only route that selects DBT.
    pub fn select(ctx: &QueryContext) -> Protocol {
        if let Some(current) = ctx.current_protocol {
            return current;
        }
        let input = ctx.user_input.to_lowercase();
        if matches_distortion(&ctx.user_input) || CBT_PHRASES.iter().any(|p| input.contains(p)) {
            return Protocol::Cbt;
        }
        if ACCEPTANCE_PATTERNS.iter().any(|p| input.contains(p)) {
            return Protocol::Act;
        }
        if input.contains("mindful") {
            return Protocol::Mindfulness;
        }
        Protocol::Integrative
    }
}
