use super::{HandlerBase, InteractionHandler};
use crate::extractor::split_choices;
use crate::feedback::FeedbackClient;
use crate::grading::{package_choice, score_choices};
use crate::types::{ChoiceSet, GradeSignal, InteractionKind, ProgressRecord, Rejection, Response, SubmitOutcome};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Radio (`multiple-choice`) and checkbox (`multiple-select`) questions.
pub struct ChoiceHandler {
    base: HandlerBase,
    choices: ChoiceSet,
    feedback: FeedbackClient,
}

impl ChoiceHandler {
    pub fn new(base: HandlerBase) -> Self {
        let choices = split_choices(&base.definition.body);
        let feedback = base.services.feedback_client();
        Self {
            base,
            choices,
            feedback,
        }
    }

    pub fn choices(&self) -> &ChoiceSet {
        &self.choices
    }

    fn is_single_answer(&self) -> bool {
        self.base.definition.kind == InteractionKind::MultipleChoice
    }
}

#[async_trait]
impl InteractionHandler for ChoiceHandler {
    fn base(&self) -> &HandlerBase {
        &self.base
    }

    fn validate(&self, response: &Response) -> Option<Rejection> {
        let Response::Choices(selected) = response else {
            return Some(Rejection::UnsupportedResponse);
        };
        if selected.is_empty() {
            return Some(Rejection::EmptyResponse);
        }
        if selected.iter().any(|index| *index >= self.choices.len()) {
            return Some(Rejection::InvalidSelection);
        }
        if self.is_single_answer() && selected.len() > 1 {
            return Some(Rejection::TooManySelections);
        }
        None
    }

    async fn submit(&self, response: Response) -> SubmitOutcome {
        if let Some(rejection) = self.base.write_gate().or_else(|| self.validate(&response)) {
            return SubmitOutcome::Rejected(rejection);
        }
        let Response::Choices(selected) = response else {
            return SubmitOutcome::Rejected(Rejection::UnsupportedResponse);
        };
        let submission = match self.base.begin() {
            Ok(submission) => submission,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        let correct = self.choices.correct_indices();
        let Some(score) = score_choices(&selected, &correct) else {
            return SubmitOutcome::Rejected(Rejection::EmptyResponse);
        };

        let request = package_choice(&self.base.definition, &self.choices, &selected, score.percent_correct);
        let feedback = self.feedback.choice_feedback(&request).await;

        let record = ProgressRecord::new(self.base.definition.kind.clone())
            .with_selection(&selected, Some(&correct))
            .with_percent_correct(Some(score.percent_correct))
            .with_feedback(feedback.text)
            .with_explain(feedback.explain_available);
        let record = self.base.commit(record).await;

        info!(
            "Graded '{}' at {}% ({} net correct)",
            self.base.id(),
            score.percent_correct,
            score.matched
        );
        submission.accept(record, GradeSignal::Graded(score.percent_correct))
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

        let selected: BTreeSet<usize> = current.selected_set();
        let percent = current.percent_correct.unwrap_or(0.0);
        let request = package_choice(&self.base.definition, &self.choices, &selected, percent);

        let record = match self.feedback.explain_choice(&request).await {
            Ok(text) => {
                let mut refreshed = (*current).clone();
                refreshed.feedback = Some(text);
                refreshed.explain_available = false;
                self.base.commit(refreshed).await
            }
            Err(e) => {
                warn!("Explain failed for '{}': {}", self.base.id(), e);
                current
            }
        };

        let signal = GradeSignal::from_record(&record);
        submission.accept(record, signal)
    }
}
