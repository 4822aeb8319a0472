use std::collections::{BTreeMap, HashMap};
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Kind of event recorded by the progress collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    QuizSubmit,
    Exam,
    Note,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::QuizSubmit => "quizSubmit",
            EventType::Exam => "exam",
            EventType::Note => "note",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "quizSubmit" => Some(EventType::QuizSubmit),
            "exam" => Some(EventType::Exam),
            "note" => Some(EventType::Note),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub user_id: Option<String>,
    pub interaction_id: Option<String>,
    pub event_type: EventType,
    pub duration: u64,
    pub details: serde_json::Value,
}

/// Latest submitted state for one interaction, as handed back on topic load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizProgress {
    pub details: serde_json::Value,
}

/// Anonymized survey tallies across every user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveySummary {
    /// option index -> number of votes
    pub votes: BTreeMap<usize, u64>,
    pub voters: u64,
}

impl SurveySummary {
    pub fn total_votes(&self) -> u64 {
        self.votes.values().sum()
    }
}

/// Payload sent when asking for feedback on a choice answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceFeedbackRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub question: String,
    pub choices: Vec<String>,
    pub answers: Vec<String>,
    pub correct_answers: Vec<String>,
    pub percent_correct: f64,
}

/// Payload sent when asking the model to grade an essay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EssayFeedbackRequest {
    pub title: String,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Learner,
    Student,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeachingTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Payload for one turn of a teaching dialogue. The model plays a student
/// being taught `concept`; when `finalize` is set it must close the dialogue
/// with an "Understanding Score".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingRequest {
    pub title: String,
    pub concept: String,
    pub transcript: Vec<TeachingTurn>,
    pub finalize: bool,
}

/// Persistence and progress tracking service.
#[async_trait]
pub trait ProgressCollaborator: Send + Sync {
    /// Record one event. Callers treat this as fire-and-forget.
    async fn add_progress(
        &self,
        user_id: Option<&str>,
        interaction_id: Option<&str>,
        event_type: EventType,
        duration: u64,
        details: serde_json::Value,
    ) -> Result<()>;

    /// Latest quiz submission per interaction id, used to rehydrate a topic.
    async fn get_quiz_progress(&self) -> Result<HashMap<String, QuizProgress>>;

    /// Survey tallies across all users for one interaction.
    async fn get_survey_summary(&self, interaction_id: &str) -> Result<SurveySummary>;
}

/// Generative text service used for feedback, prompts and teaching dialogues.
#[async_trait]
pub trait GenerativeText: Send + Sync {
    async fn get_choice_interaction_feedback(&self, request: &ChoiceFeedbackRequest) -> Result<String>;

    /// Raw reply, expected to start with a `{"percentCorrect": N}` fragment.
    async fn get_essay_interaction_feedback(&self, request: &EssayFeedbackRequest) -> Result<String>;

    async fn get_prompt_response(&self, text: &str) -> Result<String>;

    async fn get_teaching_response(&self, request: &TeachingRequest) -> Result<String>;
}

/// Source of lesson documents.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_document(&self, topic: &str) -> Result<String>;
}

// Object style note:
// Collaborators are shared across every interaction on a page, so they are
// held as `Arc<dyn Trait>` and must not assume exclusive access. Anything that
// needs per-user scoping takes it at construction time.
