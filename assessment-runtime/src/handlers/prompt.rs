use super::{HandlerBase, InteractionHandler};
use crate::feedback::FALLBACK_FEEDBACK;
use crate::types::{GradeSignal, ProgressRecord, Rejection, Response, Result, SubmitOutcome};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Open-ended prompt: the learner's text is sent to the model along with the
/// block's instructions and the reply is shown back. Never graded.
pub struct PromptHandler {
    base: HandlerBase,
}

impl PromptHandler {
    pub fn new(base: HandlerBase) -> Self {
        Self { base }
    }

    fn compose(&self, input: &str) -> String {
        let instructions = self.base.definition.body.trim();
        if instructions.is_empty() {
            input.trim().to_string()
        } else {
            format!("{}\n\n{}", instructions, input.trim())
        }
    }

    async fn respond(&self, input: &str) -> Result<String> {
        let text = self.compose(input);
        debug!("Sending prompt for '{}' ({} chars)", self.base.id(), text.len());
        let reply = self.base.services.generator.get_prompt_response(&text).await?;
        Ok(reply.trim().to_string())
    }
}

#[async_trait]
impl InteractionHandler for PromptHandler {
    fn base(&self) -> &HandlerBase {
        &self.base
    }

    fn validate(&self, response: &Response) -> Option<Rejection> {
        match response {
            Response::Text(text) if text.trim().is_empty() => Some(Rejection::EmptyResponse),
            Response::Text(_) => None,
            _ => Some(Rejection::UnsupportedResponse),
        }
    }

    async fn submit(&self, response: Response) -> SubmitOutcome {
        if let Some(rejection) = self.base.write_gate().or_else(|| self.validate(&response)) {
            return SubmitOutcome::Rejected(rejection);
        }
        let Response::Text(input) = response else {
            return SubmitOutcome::Rejected(Rejection::UnsupportedResponse);
        };
        let submission = match self.base.begin() {
            Ok(submission) => submission,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        let (reply, explain_available) = match self.respond(&input).await {
            Ok(reply) => (reply, false),
            Err(e) => {
                warn!("Prompt response failed for '{}': {}", self.base.id(), e);
                (FALLBACK_FEEDBACK.to_string(), true)
            }
        };

        let record = ProgressRecord::new(self.base.definition.kind.clone())
            .with_answer(input.trim())
            .with_feedback(reply)
            .with_explain(explain_available);
        let record = self.base.commit(record).await;

        submission.accept(record, GradeSignal::Ungraded)
    }

    async fn explain(&self) -> SubmitOutcome {
        let current = match self.base.explain_gate() {
            Ok(record) => record,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };
        let submission = match self.base.begin() {
            Ok(submission) => submission,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        let input = current.answer.clone().unwrap_or_default();
        let record = match self.respond(&input).await {
            Ok(reply) => {
                let mut refreshed = (*current).clone();
                refreshed.feedback = Some(reply);
                refreshed.explain_available = false;
                self.base.commit(refreshed).await
            }
            Err(e) => {
                warn!("Prompt retry failed for '{}': {}", self.base.id(), e);
                current
            }
        };

        submission.accept(record, GradeSignal::Ungraded)
    }
}
