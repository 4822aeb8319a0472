use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
// Collaborator contracts live in the interfaces crate
pub use interfaces::defs::{ChoiceFeedbackRequest, EssayFeedbackRequest, TeachingRequest, TeachingTurn, Speaker};
pub use interfaces::defs::{
    ContentSource, EventType, GenerativeText, ProgressCollaborator, ProgressEvent, QuizProgress, SurveySummary,
};

/// The closed set of interaction variants, plus an explicit escape hatch for
/// well-formed headers that name something this runtime does not handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InteractionKind {
    MultipleChoice,
    MultipleSelect,
    Essay,
    Survey,
    FileSubmission,
    UrlSubmission,
    Teaching,
    Prompt,
    Unknown(String),
}

impl InteractionKind {
    pub const SUPPORTED: [InteractionKind; 8] = [
        InteractionKind::MultipleChoice,
        InteractionKind::MultipleSelect,
        InteractionKind::Essay,
        InteractionKind::Survey,
        InteractionKind::FileSubmission,
        InteractionKind::UrlSubmission,
        InteractionKind::Teaching,
        InteractionKind::Prompt,
    ];

    /// Case-insensitive parse of a header `type` value.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "multiple-choice" => InteractionKind::MultipleChoice,
            "multiple-select" => InteractionKind::MultipleSelect,
            "essay" => InteractionKind::Essay,
            "survey" => InteractionKind::Survey,
            "file-submission" => InteractionKind::FileSubmission,
            "url-submission" => InteractionKind::UrlSubmission,
            "teaching" => InteractionKind::Teaching,
            "prompt" => InteractionKind::Prompt,
            _ => InteractionKind::Unknown(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InteractionKind::MultipleChoice => "multiple-choice",
            InteractionKind::MultipleSelect => "multiple-select",
            InteractionKind::Essay => "essay",
            InteractionKind::Survey => "survey",
            InteractionKind::FileSubmission => "file-submission",
            InteractionKind::UrlSubmission => "url-submission",
            InteractionKind::Teaching => "teaching",
            InteractionKind::Prompt => "prompt",
            InteractionKind::Unknown(name) => name,
        }
    }

    /// Scored by the partial-credit formula
    pub fn is_choice(&self) -> bool {
        matches!(self, InteractionKind::MultipleChoice | InteractionKind::MultipleSelect)
    }

    /// Body carries `- [ ]` option lines
    pub fn has_options(&self) -> bool {
        self.is_choice() || matches!(self, InteractionKind::Survey)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, InteractionKind::Unknown(_))
    }
}

impl Default for InteractionKind {
    fn default() -> Self {
        InteractionKind::MultipleChoice
    }
}

impl From<String> for InteractionKind {
    fn from(value: String) -> Self {
        InteractionKind::parse(&value)
    }
}

impl From<InteractionKind> for String {
    fn from(kind: InteractionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the metadata header of a block was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    Parsed,
    /// No JSON object at the start of the block
    Missing,
    /// Looked like a header but did not parse as a JSON object
    Malformed,
}

/// One interaction as extracted from a document block.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionDefinition {
    pub id: String,
    pub title: String,
    pub kind: InteractionKind,
    pub body: String,
    pub header: HeaderStatus,
}

impl InteractionDefinition {
    pub fn new(id: impl Into<String>, kind: InteractionKind, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            kind,
            body: body.into(),
            header: HeaderStatus::Parsed,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn is_transient(&self) -> bool {
        self.id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub correct: bool,
}

/// Body of a choice or survey block split into prose and options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceSet {
    pub prompt: String,
    pub choices: Vec<Choice>,
}

impl ChoiceSet {
    pub fn correct_indices(&self) -> BTreeSet<usize> {
        self.choices
            .iter()
            .enumerate()
            .filter(|(_, choice)| choice.correct)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn texts(&self, indices: &BTreeSet<usize>) -> Vec<String> {
        indices
            .iter()
            .filter_map(|index| self.choices.get(*index))
            .map(|choice| choice.text.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Learning,
    Exam,
    ExamReview,
    Preview,
}

impl Mode {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Mode::ExamReview)
    }

    pub fn persists(&self) -> bool {
        !matches!(self, Mode::Preview)
    }
}

/// Visual grading state of one interaction instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradeSignal {
    Pending,
    Graded(f64),
    Ungraded,
}

impl GradeSignal {
    pub fn from_record(record: &ProgressRecord) -> Self {
        match record.percent_correct {
            Some(percent) => GradeSignal::Graded(percent),
            None => GradeSignal::Ungraded,
        }
    }

    /// Numeric form: the percentage, -1 for ungraded, `None` while pending.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            GradeSignal::Pending => None,
            GradeSignal::Graded(percent) => Some(*percent),
            GradeSignal::Ungraded => Some(-1.0),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GradeSignal::Pending)
    }
}

/// Learner input handed to a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Choices(BTreeSet<usize>),
    Text(String),
    File { name: String, content: Vec<u8> },
    Url(String),
}

impl Response {
    pub fn choices(indices: impl IntoIterator<Item = usize>) -> Self {
        Response::Choices(indices.into_iter().collect())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Response::Text(text.into())
    }
}

/// Why a submission was turned into a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyResponse,
    TooManySelections,
    InvalidSelection,
    InvalidUrl,
    SubmissionInFlight,
    ReadOnly,
    AlreadyAnswered,
    NothingToExplain,
    UnsupportedResponse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted {
        signal: GradeSignal,
        record: Arc<ProgressRecord>,
    },
    Rejected(Rejection),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }

    pub fn signal(&self) -> Option<GradeSignal> {
        match self {
            SubmitOutcome::Accepted { signal, .. } => Some(*signal),
            SubmitOutcome::Rejected(_) => None,
        }
    }

    pub fn record(&self) -> Option<&Arc<ProgressRecord>> {
        match self {
            SubmitOutcome::Accepted { record, .. } => Some(record),
            SubmitOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            SubmitOutcome::Accepted { .. } => None,
            SubmitOutcome::Rejected(rejection) => Some(*rejection),
        }
    }
}

/// Outcome of one submission as persisted. Replaced wholesale on every
/// resubmission or explain refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_correct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TeachingTurn>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub explain_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn new(kind: InteractionKind) -> Self {
        Self {
            kind,
            feedback: None,
            percent_correct: None,
            selected: None,
            correct: None,
            answer: None,
            transcript: None,
            explain_available: false,
            submitted_at: Some(Utc::now()),
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    pub fn with_percent_correct(mut self, percent: Option<f64>) -> Self {
        self.percent_correct = percent;
        self
    }

    pub fn with_selection(mut self, selected: &BTreeSet<usize>, correct: Option<&BTreeSet<usize>>) -> Self {
        self.selected = Some(selected.iter().copied().collect());
        self.correct = correct.map(|c| c.iter().copied().collect());
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    pub fn with_transcript(mut self, transcript: Vec<TeachingTurn>) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn with_explain(mut self, available: bool) -> Self {
        self.explain_available = available;
        self
    }

    /// Counted as answered once any feedback was recorded
    pub fn is_answered(&self) -> bool {
        self.feedback.is_some()
    }

    pub fn is_graded(&self) -> bool {
        self.is_answered() && self.percent_correct.is_some()
    }

    pub fn selected_set(&self) -> BTreeSet<usize> {
        self.selected.iter().flatten().copied().collect()
    }

    pub fn to_details(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExamPhase {
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for ExamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExamPhase::NotStarted => "notStarted",
            ExamPhase::InProgress => "inProgress",
            ExamPhase::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamStats {
    pub total_questions: usize,
    pub total_answered_questions: usize,
    pub total_graded_questions: usize,
    pub percent_correct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResults {
    pub ai: ExamStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamState {
    pub state: ExamPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ExamResults>,
}

impl Default for ExamState {
    fn default() -> Self {
        Self {
            state: ExamPhase::NotStarted,
            results: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid exam transition from {from} to {to}")]
    InvalidTransition { from: ExamPhase, to: ExamPhase },

    #[error("Interaction not found: {id}")]
    InteractionNotFound { id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
