use crate::config::RuntimeConfig;
use crate::exam::ExamSession;
use crate::extractor::BlockExtractor;
use crate::handlers::{InteractionHandler, Services};
use crate::progress_store::{CompletionView, ProgressStore};
use crate::registry::Dispatcher;
use crate::types::{
    ContentSource, EventType, ExamStats, GenerativeText, InteractionDefinition, Mode, ProgressCollaborator, Result,
    RuntimeError,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opens lesson topics: fetch, extract, rehydrate.
pub struct LessonRuntime {
    content: Arc<dyn ContentSource>,
    progress: Arc<dyn ProgressCollaborator>,
    generator: Arc<dyn GenerativeText>,
    dispatcher: Arc<Dispatcher>,
    config: RuntimeConfig,
}

impl LessonRuntime {
    pub fn new(
        content: Arc<dyn ContentSource>,
        progress: Arc<dyn ProgressCollaborator>,
        generator: Arc<dyn GenerativeText>,
    ) -> Self {
        Self {
            content,
            progress,
            generator,
            dispatcher: Arc::new(Dispatcher::default()),
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Fetch `topic` and restore the learner's earlier answers. Progress that
    /// cannot be loaded leaves the lesson blank rather than failing it.
    pub async fn open_topic(&self, topic: &str) -> Result<Lesson> {
        info!("Opening topic '{}'", topic);
        let document = self.content.fetch_document(topic).await?;
        let lesson = self.open_document(topic, &document);

        match self.progress.get_quiz_progress().await {
            Ok(progress) => {
                let loaded = lesson.services.store.rehydrate(progress);
                debug!("Restored {} answers for '{}'", loaded, topic);
            }
            Err(e) => warn!("Could not load progress for '{}': {}", topic, e),
        }

        Ok(lesson)
    }

    /// A lesson over an already loaded document, with a fresh store.
    pub fn open_document(&self, topic: &str, document: &str) -> Lesson {
        let definitions = BlockExtractor::with_fence_tag(self.config.fence_tag.as_str()).extract_document(document);
        let services = Services::new(ProgressStore::new(), self.progress.clone(), self.generator.clone())
            .with_config(self.config.clone());

        info!("Topic '{}' has {} interactions", topic, definitions.len());
        Lesson {
            topic: topic.to_string(),
            definitions,
            services,
            dispatcher: self.dispatcher.clone(),
            rendered: Vec::new(),
        }
    }
}

/// One opened topic and the handlers rendered for it.
pub struct Lesson {
    topic: String,
    definitions: Vec<InteractionDefinition>,
    services: Services,
    dispatcher: Arc<Dispatcher>,
    rendered: Vec<Arc<dyn InteractionHandler>>,
}

impl Lesson {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn definitions(&self) -> &[InteractionDefinition] {
        &self.definitions
    }

    pub fn store(&self) -> &ProgressStore {
        &self.services.store
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Ids of every persistable interaction, in document order.
    pub fn interaction_ids(&self) -> Vec<String> {
        self.definitions
            .iter()
            .filter(|definition| !definition.is_transient())
            .map(|definition| definition.id.clone())
            .collect()
    }

    pub fn completion(&self) -> CompletionView {
        CompletionView::new(&self.services.store, self.interaction_ids())
    }

    /// Build and mount a handler for every block.
    ///
    /// With an exam session the mode follows its phase and nothing renders
    /// before the exam starts; every id rendered while it is in progress is
    /// registered with it. Without one, `mode` defaults to learning.
    pub async fn render(
        &mut self,
        mode: Option<Mode>,
        mut exam: Option<&mut ExamSession>,
    ) -> Vec<Arc<dyn InteractionHandler>> {
        let mode = match exam.as_deref() {
            Some(session) => session.mode(),
            None => Some(mode.unwrap_or(Mode::Learning)),
        };
        let Some(mode) = mode else {
            debug!("Exam for '{}' not started; rendering nothing", self.topic);
            self.rendered.clear();
            return Vec::new();
        };

        let mut handlers = Vec::with_capacity(self.definitions.len());
        for definition in &self.definitions {
            let Some(handler) = self.dispatcher.dispatch(definition.clone(), mode, &self.services) else {
                continue;
            };
            if let Some(session) = exam.as_deref_mut() {
                session.register(handler.id());
            }
            handler.mount().await;
            handlers.push(handler);
        }

        debug!("Rendered {} handlers for '{}' in {:?}", handlers.len(), self.topic, mode);
        self.rendered = handlers.clone();
        handlers
    }

    /// Handler from the last render.
    pub fn handler(&self, interaction_id: &str) -> Option<Arc<dyn InteractionHandler>> {
        self.rendered
            .iter()
            .find(|handler| handler.id() == interaction_id)
            .cloned()
    }

    pub async fn start_exam(&self, exam: &mut ExamSession) -> Result<()> {
        exam.start(self.services.progress.as_ref(), self.services.config.user_id.as_deref())
            .await
    }

    pub async fn complete_exam(&self, exam: &mut ExamSession) -> Result<ExamStats> {
        exam.complete(
            &self.services.store,
            self.services.progress.as_ref(),
            self.services.config.user_id.as_deref(),
        )
        .await
    }

    /// Persist a free-form learner note against one interaction.
    pub async fn record_note(&self, interaction_id: &str, text: &str) -> Result<()> {
        if interaction_id.is_empty() || !self.definitions.iter().any(|definition| definition.id == interaction_id) {
            return Err(RuntimeError::InteractionNotFound {
                id: interaction_id.to_string(),
            });
        }

        self.services
            .progress
            .add_progress(
                self.services.config.user_id.as_deref(),
                Some(interaction_id),
                EventType::Note,
                0,
                json!({ "note": text }),
            )
            .await?;
        debug!("Recorded note for '{}'", interaction_id);
        Ok(())
    }
}
