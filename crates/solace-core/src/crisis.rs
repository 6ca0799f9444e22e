//! Crisis safety gate: keyword and emotional-state risk scoring.
//!
//! The gate is the single crisis authority. It runs first for every request,
//! has no external dependencies, and its fixed response is deliverable even
//! when every other subsystem is degraded.

use chrono::Utc;

use crate::shared::{EmotionalState, Protocol, TherapeuticResponse};

/// Fixed crisis phrase list, matched case-insensitively as substrings.
/// Each hit contributes +5 to the score; multiple hits are additive.
pub const CRISIS_KEYWORDS: &[&str] = &[
    "kill myself",
    "suicide",
    "suicidal",
    "end my life",
    "end it all",
    "want to die",
    "hurt myself",
    "harm myself",
    "self-harm",
    "self harm",
    "no reason to live",
    "better off without me",
];

/// Ordered crisis resources returned in every crisis response.
pub const CRISIS_RESOURCES: &[&str] = &[
    "Call or text 988 (Suicide & Crisis Lifeline, available 24/7)",
    "Text HOME to 741741 (Crisis Text Line)",
    "If you are in immediate danger, call 911",
];

pub const CRISIS_TECHNIQUE: &str = "Crisis Intervention";

const CRISIS_RESPONSE_TEXT: &str = "I'm really glad you told me. You don't have to carry this alone, and you deserve support from a real person right now.";

const CRISIS_VALIDATION: &str = "What you are feeling right now matters, and reaching out takes courage.";

/// Scores crisis risk for a single utterance. Pure function, no side effects.
pub struct CrisisGate;

impl CrisisGate {
    /// Returns an integer risk score in [0, 10].
    ///
    /// Keyword hits contribute +5 each (case-insensitive substring match,
    /// multiple hits allowed). High-intensity sadness adds +2, high-intensity
    /// fear adds +1. The result is clamped and never negative.
    pub fn score(text: &str, state: &EmotionalState) -> u8 {
        let lower = text.to_lowercase();
        let keyword_hits = CRISIS_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
        let mut score = keyword_hits as i32 * 5;

        if state.dominant_emotion.eq_ignore_ascii_case("sadness") && state.intensity > 0.9 {
            score += 2;
        }
        if state.dominant_emotion.eq_ignore_ascii_case("fear") && state.intensity > 0.8 {
            score += 1;
        }

        score.clamp(0, 10) as u8
    }
}

/// The fixed crisis response. No retrieval metadata is ever attached.
pub fn crisis_response() -> TherapeuticResponse {
    TherapeuticResponse {
        timestamp: Utc::now(),
        protocol: Protocol::Crisis.label().to_string(),
        technique: CRISIS_TECHNIQUE.to_string(),
        response_text: CRISIS_RESPONSE_TEXT.to_string(),
        emotional_validation: CRISIS_VALIDATION.to_string(),
        therapeutic_suggestions: CRISIS_RESOURCES.iter().map(|r| r.to_string()).collect(),
        is_crisis: true,
        metadata: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(emotion: &str, intensity: f32) -> EmotionalState {
        EmotionalState::new(emotion, intensity)
    }

    #[test]
    fn keyword_plus_high_sadness_scores_seven() {
        let s = CrisisGate::score("I want to kill myself", &state("sadness", 0.95));
        assert_eq!(s, 7);
    }

    #[test]
    fn every_keyword_scores_at_least_five() {
        let neutral = state("neutral", 0.1);
        for k in CRISIS_KEYWORDS {
            let text = format!("I keep thinking about {}", k);
            assert!(
                CrisisGate::score(&text, &neutral) >= 5,
                "keyword {:?} did not trip the gate",
                k
            );
        }
    }

    #[test]
    fn empty_input_scores_emotion_contribution_only() {
        assert_eq!(CrisisGate::score("", &state("sadness", 0.95)), 2);
        assert_eq!(CrisisGate::score("", &state("fear", 0.85)), 1);
        assert_eq!(CrisisGate::score("", &state("neutral", 0.95)), 0);
    }

    #[test]
    fn score_is_monotonic_in_keyword_hits_and_clamped() {
        let neutral = state("neutral", 0.1);
        let one = CrisisGate::score("suicide", &neutral);
        let two = CrisisGate::score("suicide, I want to die", &neutral);
        let many = CrisisGate::score("suicide, want to die, end it all, hurt myself", &neutral);
        assert!(two >= one);
        assert!(many >= two);
        assert_eq!(many, 10);
    }

    #[test]
    fn score_is_idempotent() {
        let s = state("fear", 0.9);
        let first = CrisisGate::score("I want to end it all", &s);
        for _ in 0..10 {
            assert_eq!(CrisisGate::score("I want to end it all", &s), first);
        }
    }

    #[test]
    fn matching_is_case_insensitive() {
        let neutral = state("neutral", 0.1);
        assert!(CrisisGate::score("I Want To KILL MYSELF", &neutral) >= 5);
    }

    #[test]
    fn crisis_response_is_fixed_and_carries_no_retrieval_metadata() {
        let r = crisis_response();
        assert!(r.is_crisis);
        assert_eq!(r.protocol, "CRISIS");
        assert_eq!(r.technique, CRISIS_TECHNIQUE);
        assert_eq!(r.therapeutic_suggestions.len(), CRISIS_RESOURCES.len());
        assert!(r.metadata.is_none());
    }
}
