pub mod choice;
pub mod essay;
pub mod prompt;
pub mod submission;
pub mod survey;
pub mod teaching;

pub use choice::ChoiceHandler;
pub use essay::EssayHandler;
pub use prompt::PromptHandler;
pub use submission::{FileSubmissionHandler, UrlSubmissionHandler};
pub use survey::SurveyHandler;
pub use teaching::TeachingHandler;

use crate::aggregator::SurveyAggregator;
use crate::config::RuntimeConfig;
use crate::feedback::FeedbackClient;
use crate::progress_store::ProgressStore;
use crate::types::{
    EventType, GenerativeText, GradeSignal, InteractionDefinition, InteractionKind, Mode, ProgressCollaborator,
    ProgressRecord, Rejection, Response, SubmitOutcome,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Behaviour shared by every interaction variant.
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    fn base(&self) -> &HandlerBase;

    fn id(&self) -> &str {
        &self.base().definition.id
    }

    fn kind(&self) -> &InteractionKind {
        &self.base().definition.kind
    }

    fn mode(&self) -> Mode {
        self.base().mode
    }

    fn record(&self) -> Option<Arc<ProgressRecord>> {
        self.base().record()
    }

    fn signal(&self) -> Option<GradeSignal> {
        self.base().signal()
    }

    fn watch_signal(&self) -> watch::Receiver<Option<GradeSignal>> {
        self.base().watch_signal()
    }

    /// `None` when `response` may be submitted; drives the submit affordance.
    fn validate(&self, response: &Response) -> Option<Rejection>;

    async fn submit(&self, response: Response) -> SubmitOutcome;

    /// Repeat the feedback call for the current answer.
    async fn explain(&self) -> SubmitOutcome {
        SubmitOutcome::Rejected(Rejection::NothingToExplain)
    }

    /// Called once after the handler is rendered.
    async fn mount(&self) {}
}

/// Collaborators and shared state handed to every handler on a page.
#[derive(Clone)]
pub struct Services {
    pub store: ProgressStore,
    pub progress: Arc<dyn ProgressCollaborator>,
    pub generator: Arc<dyn GenerativeText>,
    pub config: RuntimeConfig,
}

impl Services {
    pub fn new(
        store: ProgressStore,
        progress: Arc<dyn ProgressCollaborator>,
        generator: Arc<dyn GenerativeText>,
    ) -> Self {
        Self {
            store,
            progress,
            generator,
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn feedback_client(&self) -> FeedbackClient {
        FeedbackClient::new(self.generator.clone())
    }

    pub fn survey_aggregator(&self) -> SurveyAggregator {
        SurveyAggregator::new(self.progress.clone())
    }
}

/// State every handler carries: its definition, the page services, the mode
/// it was rendered in, and its grading signal.
pub struct HandlerBase {
    pub definition: InteractionDefinition,
    pub services: Services,
    pub mode: Mode,
    signal: watch::Sender<Option<GradeSignal>>,
    submitting: AtomicBool,
    /// Records of transient (id-less) blocks never enter the shared store.
    local: Mutex<Option<Arc<ProgressRecord>>>,
    mounted_at: Instant,
}

impl HandlerBase {
    pub fn new(definition: InteractionDefinition, mode: Mode, services: Services) -> Self {
        let initial = if definition.is_transient() {
            None
        } else {
            services.store.get(&definition.id).map(|record| GradeSignal::from_record(&record))
        };
        let (signal, _) = watch::channel(initial);

        Self {
            definition,
            services,
            mode,
            signal,
            submitting: AtomicBool::new(false),
            local: Mutex::new(None),
            mounted_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn record(&self) -> Option<Arc<ProgressRecord>> {
        if self.definition.is_transient() {
            self.local.lock().unwrap_or_else(PoisonError::into_inner).clone()
        } else {
            self.services.store.get(&self.definition.id)
        }
    }

    pub fn signal(&self) -> Option<GradeSignal> {
        *self.signal.borrow()
    }

    pub fn watch_signal(&self) -> watch::Receiver<Option<GradeSignal>> {
        self.signal.subscribe()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Mode-level write checks: review is read-only, exam items take one
    /// answer (an unfinished teaching dialogue is not yet an answer).
    pub fn write_gate(&self) -> Option<Rejection> {
        if self.mode.is_read_only() {
            return Some(Rejection::ReadOnly);
        }
        if self.mode == Mode::Exam && self.record().is_some_and(|record| record.is_answered()) {
            return Some(Rejection::AlreadyAnswered);
        }
        None
    }

    /// Explain needs a writable view and an existing answer.
    pub fn explain_gate(&self) -> Result<Arc<ProgressRecord>, Rejection> {
        if self.mode.is_read_only() {
            return Err(Rejection::ReadOnly);
        }
        self.record().ok_or(Rejection::NothingToExplain)
    }

    /// Start a submission: claims the in-flight flag and signals pending.
    pub fn begin(&self) -> Result<Submission<'_>, Rejection> {
        if self.submitting.swap(true, Ordering::AcqRel) {
            debug!("Submission already in flight for '{}'", self.id());
            return Err(Rejection::SubmissionInFlight);
        }

        let previous = self.signal.send_replace(Some(GradeSignal::Pending));
        Ok(Submission {
            base: self,
            previous,
            resolved: false,
        })
    }

    /// Store the record and hand it to the progress collaborator.
    pub async fn commit(&self, record: ProgressRecord) -> Arc<ProgressRecord> {
        if self.definition.is_transient() {
            let record = Arc::new(record);
            *self.local.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
            return record;
        }

        let record = self.services.store.set(&self.definition.id, record);
        self.persist(&record).await;
        record
    }

    async fn persist(&self, record: &ProgressRecord) {
        if !self.mode.persists() {
            return;
        }

        let details = match record.to_details() {
            Ok(details) => details,
            Err(e) => {
                warn!("Could not serialize progress for '{}': {}", self.id(), e);
                return;
            }
        };

        let result = self
            .services
            .progress
            .add_progress(
                self.services.config.user_id.as_deref(),
                Some(self.id()),
                EventType::QuizSubmit,
                self.mounted_at.elapsed().as_secs(),
                details,
            )
            .await;

        if let Err(e) = result {
            warn!("Failed to persist progress for '{}': {}", self.id(), e);
        }
    }
}

/// An in-flight submission. Dropping it without [`Submission::finish`] (an
/// early return, a panic, a cancelled future) restores the signal that was
/// showing before and releases the in-flight flag.
pub struct Submission<'a> {
    base: &'a HandlerBase,
    previous: Option<GradeSignal>,
    resolved: bool,
}

impl Submission<'_> {
    pub fn finish(mut self, signal: GradeSignal) -> GradeSignal {
        self.base.signal.send_replace(Some(signal));
        self.resolved = true;
        signal
    }

    pub fn accept(self, record: Arc<ProgressRecord>, signal: GradeSignal) -> SubmitOutcome {
        let signal = self.finish(signal);
        SubmitOutcome::Accepted { signal, record }
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.base.signal.send_replace(self.previous);
        }
        self.base.submitting.store(false, Ordering::Release);
    }
}
