use super::{HandlerBase, InteractionHandler};
use crate::feedback::FeedbackClient;
use crate::grading::package_essay;
use crate::types::{GradeSignal, ProgressRecord, Rejection, Response, SubmitOutcome};
use async_trait::async_trait;
use tracing::{info, warn};

/// Free-text answers graded by the generative text collaborator.
pub struct EssayHandler {
    base: HandlerBase,
    feedback: FeedbackClient,
}

impl EssayHandler {
    pub fn new(base: HandlerBase) -> Self {
        let feedback = base.services.feedback_client();
        Self { base, feedback }
    }
}

#[async_trait]
impl InteractionHandler for EssayHandler {
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
        let Response::Text(answer) = response else {
            return SubmitOutcome::Rejected(Rejection::UnsupportedResponse);
        };
        let submission = match self.base.begin() {
            Ok(submission) => submission,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        let request = package_essay(&self.base.definition, &answer);
        let feedback = self.feedback.essay_feedback(&request).await;

        let record = ProgressRecord::new(self.base.definition.kind.clone())
            .with_answer(answer.trim())
            .with_percent_correct(feedback.percent_correct)
            .with_feedback(feedback.text)
            .with_explain(feedback.explain_available);
        let record = self.base.commit(record).await;

        info!("Essay '{}' graded at {:?}", self.base.id(), record.percent_correct);
        let signal = GradeSignal::from_record(&record);
        submission.accept(record, signal)
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

        let answer = current.answer.clone().unwrap_or_default();
        let request = package_essay(&self.base.definition, &answer);

        let record = match self.feedback.explain_essay(&request).await {
            Ok((percent_correct, text)) => {
                let mut refreshed = (*current).clone();
                refreshed.feedback = Some(text);
                // A reply without a score keeps the earlier grade.
                if percent_correct.is_some() {
                    refreshed.percent_correct = percent_correct;
                }
                refreshed.explain_available = false;
                self.base.commit(refreshed).await
            }
            Err(e) => {
                warn!("Explain failed for essay '{}': {}", self.base.id(), e);
                current
            }
        };

        let signal = GradeSignal::from_record(&record);
        submission.accept(record, signal)
    }
}
