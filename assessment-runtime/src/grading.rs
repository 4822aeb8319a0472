use crate::types::{ChoiceFeedbackRequest, ChoiceSet, EssayFeedbackRequest, InteractionDefinition};
use std::collections::BTreeSet;

/// Completion value reported for accepted file and URL submissions.
pub const COMPLETION_PERCENT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChoiceScore {
    /// Correct picks net of wrong picks, never below zero
    pub matched: usize,
    pub percent_correct: f64,
}

/// Partial credit for a choice answer. Every wrong pick cancels one right
/// pick, clamped at zero. An empty selection is not scored.
pub fn score_choices(selected: &BTreeSet<usize>, correct: &BTreeSet<usize>) -> Option<ChoiceScore> {
    if selected.is_empty() {
        return None;
    }

    let hits = selected.intersection(correct).count();
    let misses = selected.difference(correct).count();
    let matched = hits.saturating_sub(misses);

    let percent_correct = if correct.is_empty() {
        0.0
    } else {
        (matched as f64 / correct.len() as f64 * 100.0).round()
    };

    Some(ChoiceScore {
        matched,
        percent_correct,
    })
}

/// Structured payload describing a graded choice answer.
pub fn package_choice(
    definition: &InteractionDefinition,
    choices: &ChoiceSet,
    selected: &BTreeSet<usize>,
    percent_correct: f64,
) -> ChoiceFeedbackRequest {
    ChoiceFeedbackRequest {
        title: definition.title.clone(),
        kind: definition.kind.to_string(),
        question: choices.prompt.clone(),
        choices: choices.choices.iter().map(|choice| choice.text.clone()).collect(),
        answers: choices.texts(selected),
        correct_answers: choices.texts(&choices.correct_indices()),
        percent_correct,
    }
}

/// Essays are graded externally; this only packages the answer.
pub fn package_essay(definition: &InteractionDefinition, answer: &str) -> EssayFeedbackRequest {
    EssayFeedbackRequest {
        title: definition.title.clone(),
        question: definition.body.trim().to_string(),
        answer: answer.trim().to_string(),
    }
}

/// Pull the "Understanding Score" out of a teaching reply. The last mention
/// wins; the value is clamped to 0-100.
pub fn extract_understanding_score(reply: &str) -> Option<f64> {
    const MARKER: &str = "understanding score";

    let lower = reply.to_lowercase();
    let start = lower.rfind(MARKER)? + MARKER.len();
    let rest = lower.get(start..)?;

    let number_start = rest.find(|c: char| c.is_ascii_digit())?;
    // Only punctuation and markup may sit between the marker and the number.
    if rest[..number_start]
        .chars()
        .any(|c| c.is_alphanumeric())
    {
        return None;
    }

    let digits: String = rest[number_start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = digits.trim_end_matches('.').parse().ok()?;
    Some(value.clamp(0.0, 100.0))
}
