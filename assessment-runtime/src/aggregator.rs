use crate::types::{ChoiceSet, ProgressCollaborator, Result, SurveySummary};
use std::sync::Arc;
use tracing::debug;

/// One bar of a survey chart.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyBar {
    pub index: usize,
    pub text: String,
    pub count: u64,
    /// `count / total_votes`, 0 when nobody voted
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurveyTally {
    pub interaction_id: String,
    pub bars: Vec<SurveyBar>,
    pub total_votes: u64,
    pub voters: u64,
}

/// Fetches survey tallies from the progress collaborator. Counts always come
/// from there since they must cover every user, not just this session.
#[derive(Clone)]
pub struct SurveyAggregator {
    progress: Arc<dyn ProgressCollaborator>,
}

impl SurveyAggregator {
    pub fn new(progress: Arc<dyn ProgressCollaborator>) -> Self {
        Self { progress }
    }

    pub async fn refresh(&self, interaction_id: &str, choices: &ChoiceSet) -> Result<SurveyTally> {
        let summary = self.progress.get_survey_summary(interaction_id).await?;
        debug!(
            "Survey '{}' summary: {} voters, {} votes",
            interaction_id,
            summary.voters,
            summary.total_votes()
        );
        Ok(Self::tally(interaction_id, choices, &summary))
    }

    /// Lay a summary out over the options in canonical order.
    pub fn tally(interaction_id: &str, choices: &ChoiceSet, summary: &SurveySummary) -> SurveyTally {
        let total_votes = summary.total_votes();
        let bars = choices
            .choices
            .iter()
            .enumerate()
            .map(|(index, choice)| {
                let count = summary.votes.get(&index).copied().unwrap_or(0);
                let fraction = if total_votes == 0 {
                    0.0
                } else {
                    count as f64 / total_votes as f64
                };
                SurveyBar {
                    index,
                    text: choice.text.clone(),
                    count,
                    fraction,
                }
            })
            .collect();

        SurveyTally {
            interaction_id: interaction_id.to_string(),
            bars,
            total_votes,
            voters: summary.voters,
        }
    }
}
