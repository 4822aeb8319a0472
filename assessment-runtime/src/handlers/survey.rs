use super::{HandlerBase, InteractionHandler};
use crate::aggregator::{SurveyAggregator, SurveyTally};
use crate::extractor::split_choices;
use crate::types::{ChoiceSet, GradeSignal, ProgressRecord, Rejection, Response, SubmitOutcome};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

pub const SURVEY_THANKS: &str = "Thanks for your response!";

/// Ungraded poll. Results are shown from collaborator tallies only.
pub struct SurveyHandler {
    base: HandlerBase,
    choices: ChoiceSet,
    aggregator: SurveyAggregator,
    tally: Mutex<Option<SurveyTally>>,
}

impl SurveyHandler {
    pub fn new(base: HandlerBase) -> Self {
        let choices = split_choices(&base.definition.body);
        let aggregator = base.services.survey_aggregator();
        Self {
            base,
            choices,
            aggregator,
            tally: Mutex::new(None),
        }
    }

    pub fn choices(&self) -> &ChoiceSet {
        &self.choices
    }

    /// Most recent tally fetched for this survey
    pub fn latest_tally(&self) -> Option<SurveyTally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Re-fetch the tally. A failed fetch keeps the previous one.
    pub async fn refresh_tally(&self) -> Option<SurveyTally> {
        if self.base.definition.is_transient() {
            return None;
        }
        match self.aggregator.refresh(self.base.id(), &self.choices).await {
            Ok(tally) => {
                *self.tally.lock().unwrap_or_else(PoisonError::into_inner) = Some(tally.clone());
                Some(tally)
            }
            Err(e) => {
                warn!("Could not load survey summary for '{}': {}", self.base.id(), e);
                self.latest_tally()
            }
        }
    }
}

#[async_trait]
impl InteractionHandler for SurveyHandler {
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

        let record = ProgressRecord::new(self.base.definition.kind.clone())
            .with_selection(&selected, None)
            .with_feedback(SURVEY_THANKS);
        let record = self.base.commit(record).await;

        self.refresh_tally().await;
        submission.accept(record, GradeSignal::Ungraded)
    }

    async fn mount(&self) {
        if self.base.services.config.privileged_viewer {
            debug!("Loading survey results for '{}'", self.base.id());
            self.refresh_tally().await;
        }
    }
}
