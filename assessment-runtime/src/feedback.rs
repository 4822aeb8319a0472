use crate::types::{ChoiceFeedbackRequest, EssayFeedbackRequest, GenerativeText, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CORRECT_FEEDBACK: &str = "Correct!";
pub const FALLBACK_FEEDBACK: &str = "Sorry, that's not quite right.";

/// Feedback text plus whether the "Explain further" affordance is offered.
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub text: String,
    pub explain_available: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EssayFeedback {
    pub text: String,
    pub percent_correct: Option<f64>,
    pub explain_available: bool,
}

/// Turns graded answers into learner-facing feedback through the generative
/// text collaborator, falling back to canned text when it fails.
#[derive(Clone)]
pub struct FeedbackClient {
    generator: Arc<dyn GenerativeText>,
}

impl FeedbackClient {
    pub fn new(generator: Arc<dyn GenerativeText>) -> Self {
        Self { generator }
    }

    pub async fn choice_feedback(&self, request: &ChoiceFeedbackRequest) -> Feedback {
        if request.percent_correct >= 100.0 {
            return Feedback {
                text: CORRECT_FEEDBACK.to_string(),
                explain_available: true,
            };
        }

        match self.explain_choice(request).await {
            Ok(text) => Feedback {
                text,
                explain_available: false,
            },
            Err(e) => {
                warn!("Choice feedback failed for '{}': {}", request.title, e);
                Feedback {
                    text: FALLBACK_FEEDBACK.to_string(),
                    explain_available: true,
                }
            }
        }
    }

    /// The "Explain further" call: always asks the collaborator.
    pub async fn explain_choice(&self, request: &ChoiceFeedbackRequest) -> Result<String> {
        debug!("Requesting choice feedback for '{}'", request.title);
        let text = self.generator.get_choice_interaction_feedback(request).await?;
        Ok(text.trim().to_string())
    }

    pub async fn essay_feedback(&self, request: &EssayFeedbackRequest) -> EssayFeedback {
        match self.explain_essay(request).await {
            Ok((percent_correct, text)) => EssayFeedback {
                text,
                percent_correct,
                explain_available: false,
            },
            Err(e) => {
                warn!("Essay feedback failed for '{}': {}", request.title, e);
                EssayFeedback {
                    text: FALLBACK_FEEDBACK.to_string(),
                    percent_correct: None,
                    explain_available: true,
                }
            }
        }
    }

    pub async fn explain_essay(&self, request: &EssayFeedbackRequest) -> Result<(Option<f64>, String)> {
        debug!("Requesting essay feedback for '{}'", request.title);
        let raw = self.generator.get_essay_interaction_feedback(request).await?;
        Ok(parse_essay_feedback(&raw))
    }
}

/// Split a raw essay reply into its leading `{"percentCorrect": N}` score and
/// the text shown to the learner. A missing fragment leaves the score unset;
/// a malformed one is ignored and the reply is shown as is.
pub fn parse_essay_feedback(raw: &str) -> (Option<f64>, String) {
    let trimmed = raw.trim_start();
    if !trimmed.starts_with('{') {
        return (None, raw.trim().to_string());
    }

    let mut stream = serde_json::Deserializer::from_str(trimmed).into_iter::<Value>();
    match stream.next() {
        Some(Ok(Value::Object(fragment))) => {
            let percent = fragment
                .get("percentCorrect")
                .and_then(Value::as_f64)
                .map(|p| p.clamp(0.0, 100.0));
            let text = trimmed[stream.byte_offset()..].trim().to_string();
            (percent, text)
        }
        _ => {
            debug!("Essay feedback starts with an unreadable score fragment");
            (None, raw.trim().to_string())
        }
    }
}
