use super::{HandlerBase, InteractionHandler};
use crate::feedback::FALLBACK_FEEDBACK;
use crate::grading::extract_understanding_score;
use crate::types::{
    GradeSignal, ProgressRecord, Rejection, Response, Result, Speaker, SubmitOutcome, TeachingRequest, TeachingTurn,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The learner explains the block's concept to a simulated student. The
/// dialogue is graded once the model's reply carries an "Understanding Score".
pub struct TeachingHandler {
    base: HandlerBase,
}

impl TeachingHandler {
    pub fn new(base: HandlerBase) -> Self {
        Self { base }
    }

    /// Transcript to continue from: empty once a dialogue has been scored.
    fn open_transcript(&self) -> Vec<TeachingTurn> {
        match self.base.record() {
            Some(record) if record.percent_correct.is_none() => record.transcript.clone().unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    async fn reply(&self, transcript: &[TeachingTurn]) -> Result<String> {
        let learner_turns = transcript
            .iter()
            .filter(|turn| turn.speaker == Speaker::Learner)
            .count();
        let request = TeachingRequest {
            title: self.base.definition.title.clone(),
            concept: self.base.definition.body.trim().to_string(),
            transcript: transcript.to_vec(),
            finalize: learner_turns >= self.base.services.config.teaching_max_turns,
        };

        debug!(
            "Teaching turn {} for '{}' (finalize: {})",
            learner_turns,
            self.base.id(),
            request.finalize
        );
        let reply = self.base.services.generator.get_teaching_response(&request).await?;
        Ok(reply.trim().to_string())
    }

    /// Ask for the next student turn and store the resulting dialogue state.
    async fn advance(&self, mut transcript: Vec<TeachingTurn>) -> Arc<ProgressRecord> {
        let kind = self.base.definition.kind.clone();
        let record = match self.reply(&transcript).await {
            Ok(reply) => {
                let score = extract_understanding_score(&reply);
                transcript.push(TeachingTurn {
                    speaker: Speaker::Student,
                    text: reply.clone(),
                });
                let record = ProgressRecord::new(kind)
                    .with_transcript(transcript)
                    .with_percent_correct(score);
                match score {
                    Some(score) => {
                        info!("Teaching dialogue '{}' scored {}", self.base.id(), score);
                        record.with_feedback(reply)
                    }
                    None => record,
                }
            }
            Err(e) => {
                warn!("Teaching reply failed for '{}': {}", self.base.id(), e);
                ProgressRecord::new(kind)
                    .with_transcript(transcript)
                    .with_feedback(FALLBACK_FEEDBACK)
                    .with_explain(true)
            }
        };
        self.base.commit(record).await
    }
}

#[async_trait]
impl InteractionHandler for TeachingHandler {
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
        let Response::Text(message) = response else {
            return SubmitOutcome::Rejected(Rejection::UnsupportedResponse);
        };
        let submission = match self.base.begin() {
            Ok(submission) => submission,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        let mut transcript = self.open_transcript();
        // A failed turn left the learner's message unanswered; replace it.
        if transcript.last().is_some_and(|turn| turn.speaker == Speaker::Learner) {
            transcript.pop();
        }
        transcript.push(TeachingTurn {
            speaker: Speaker::Learner,
            text: message.trim().to_string(),
        });

        let record = self.advance(transcript).await;
        let signal = GradeSignal::from_record(&record);
        submission.accept(record, signal)
    }

    /// Retry the student's reply to an unanswered learner turn.
    async fn explain(&self) -> SubmitOutcome {
        let current = match self.base.explain_gate() {
            Ok(record) => record,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };
        let transcript = current.transcript.clone().unwrap_or_default();
        if !transcript.last().is_some_and(|turn| turn.speaker == Speaker::Learner) {
            return SubmitOutcome::Rejected(Rejection::NothingToExplain);
        }
        let submission = match self.base.begin() {
            Ok(submission) => submission,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        let record = self.advance(transcript).await;
        let signal = GradeSignal::from_record(&record);
        submission.accept(record, signal)
    }
}
