//! Prompt assembly and heuristic extraction of the generated text.
//!
//! Extraction is fragile line-pattern matching kept behind this narrow seam
//! so a structured-output contract from the generation collaborator can
//! replace it without touching the rest of the pipeline.

use crate::shared::{EmotionalState, HistorySummary, Protocol, QueryContext, RetrievalResult};

/// Session-history lines included in the prompt, newest last.
const HISTORY_LINE_LIMIT: usize = 5;

/// Validation fallback when no line of the generated text qualifies.
const DEFAULT_VALIDATION: &str = "What you're feeling makes sense, and it's okay to feel this way.";

const MAX_SUGGESTIONS: usize = 3;

/// Builds the structured generation prompt from everything the pipeline has
/// decided so far.
pub fn build_prompt(
    ctx: &QueryContext,
    protocol: Protocol,
    technique: &str,
    content: &[RetrievalResult],
    history: Option<&HistorySummary>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("Active protocol: {}\n", protocol.label()));
    prompt.push_str(&format!("Primary technique: {}\n", technique));

    if !content.is_empty() {
        prompt.push_str("\nRelevant therapeutic content:\n");
        for (i, result) in content.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. [{}] {}\n",
                i + 1,
                result.source.label(),
                result.content
            ));
        }
    }

    if let Some(summary) = history {
        prompt.push_str("\nSession history summary:\n");
        if !summary.recent_themes.is_empty() {
            prompt.push_str(&format!("- Recent themes: {}\n", summary.recent_themes.join(", ")));
        }
        if !summary.emotional_trajectory.is_empty() {
            prompt.push_str(&format!(
                "- Emotional trajectory: {}\n",
                summary.emotional_trajectory
            ));
        }
        if !summary.progress_indicators.is_empty() {
            prompt.push_str(&format!(
                "- Progress: {}\n",
                summary.progress_indicators.join("; ")
            ));
        }
        if !summary.previous_protocols.is_empty() {
            let labels: Vec<&str> = summary.previous_protocols.iter().map(|p| p.label()).collect();
            prompt.push_str(&format!("- Previous protocols: {}\n", labels.join(", ")));
        }
    }

    if let Some(lines) = ctx.session_history.as_ref().filter(|l| !l.is_empty()) {
        prompt.push_str("\nRecent conversation:\n");
        let start = lines.len().saturating_sub(HISTORY_LINE_LIMIT);
        for line in &lines[start..] {
            prompt.push_str(&format!("- {}\n", line));
        }
    }

    prompt.push_str(&format!(
        "\nCurrent emotional state: {} (intensity {:.2})\n",
        ctx.emotional_state.dominant_emotion, ctx.emotional_state.intensity
    ));
    prompt.push_str(&format!("User message: {}\n", ctx.user_input));

    if ctx.emotional_state.needs_supportive_tone() {
        prompt.push('\n');
        prompt.push_str(EmotionalState::SUPPORTIVE_TONE_INSTRUCTION);
        prompt.push('\n');
    }

    prompt
}

/// Structured view over the raw generated text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub response_text: String,
    pub emotional_validation: String,
    pub suggestions: Vec<String>,
}

/// Line-pattern extraction: first non-empty line is the main response, a line
/// containing "feel" or "valid" is the validation, lines containing "try",
/// "might help", or "technique" are suggestions (at most 3).
pub struct ResponseParser;

impl ResponseParser {
    pub fn parse(raw: &str) -> ParsedResponse {
        let lines: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

        let response_text = lines
            .first()
            .map(|l| l.to_string())
            .unwrap_or_else(|| raw.trim().to_string());

        let emotional_validation = lines
            .iter()
            .find(|l| {
                let lower = l.to_lowercase();
                lower.contains("feel") || lower.contains("valid")
            })
            .map(|l| l.to_string())
            .unwrap_or_else(|| DEFAULT_VALIDATION.to_string());

        let suggestions: Vec<String> = lines
            .iter()
            .filter(|l| {
                let lower = l.to_lowercase();
                lower.contains("try") || lower.contains("might help") || lower.contains("technique")
            })
            .take(MAX_SUGGESTIONS)
            .map(|l| l.to_string())
            .collect();

        ParsedResponse {
            response_text,
            emotional_validation,
            suggestions,
        }
    }
}
