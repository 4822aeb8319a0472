pub mod aggregator;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod exam;
pub mod extractor;
pub mod feedback;
pub mod grading;
pub mod handlers;
pub mod pipeline;
pub mod progress_store;
pub mod registry;
pub mod types;

pub use aggregator::{SurveyAggregator, SurveyBar, SurveyTally};
pub use config::{HttpConfig, RuntimeConfig};
pub use exam::{compute_stats, ExamSession};
pub use extractor::{extract_block, split_choices, BlockExtractor};
pub use feedback::{parse_essay_feedback, FeedbackClient};
pub use grading::{extract_understanding_score, score_choices, ChoiceScore};
pub use handlers::{HandlerBase, InteractionHandler, Services};
pub use pipeline::{Lesson, LessonRuntime};
pub use progress_store::{CompletionView, ProgressStore, Subscription};
pub use registry::Dispatcher;
pub use types::*;
