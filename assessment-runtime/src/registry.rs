use crate::handlers::{
    ChoiceHandler, EssayHandler, FileSubmissionHandler, HandlerBase, InteractionHandler, PromptHandler, Services,
    SurveyHandler, TeachingHandler, UrlSubmissionHandler,
};
use crate::types::{InteractionDefinition, InteractionKind, Mode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds the handler for one interaction kind.
pub type HandlerFactory = fn(HandlerBase) -> Arc<dyn InteractionHandler>;

/// Maps interaction kinds to handler factories.
pub struct Dispatcher {
    factories: HashMap<InteractionKind, HandlerFactory>,
}

impl Dispatcher {
    /// An empty dispatcher; see `Default` for the standard set.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: InteractionKind, factory: HandlerFactory) {
        debug!("Registering handler for {}", kind);
        self.factories.insert(kind, factory);
    }

    pub fn unregister(&mut self, kind: &InteractionKind) -> bool {
        self.factories.remove(kind).is_some()
    }

    pub fn supports(&self, kind: &InteractionKind) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<InteractionKind> {
        self.factories.keys().cloned().collect()
    }

    /// Handler for `definition`, or `None` when nothing handles its kind (the
    /// block renders nothing).
    pub fn dispatch(
        &self,
        definition: InteractionDefinition,
        mode: Mode,
        services: &Services,
    ) -> Option<Arc<dyn InteractionHandler>> {
        let Some(factory) = self.factories.get(&definition.kind) else {
            debug!("No handler for '{}' ({})", definition.id, definition.kind);
            return None;
        };
        Some(factory(HandlerBase::new(definition, mode, services.clone())))
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        let mut dispatcher = Self::new();

        dispatcher.register(InteractionKind::MultipleChoice, choice);
        dispatcher.register(InteractionKind::MultipleSelect, choice);
        dispatcher.register(InteractionKind::Essay, essay);
        dispatcher.register(InteractionKind::Survey, survey);
        dispatcher.register(InteractionKind::FileSubmission, file_submission);
        dispatcher.register(InteractionKind::UrlSubmission, url_submission);
        dispatcher.register(InteractionKind::Teaching, teaching);
        dispatcher.register(InteractionKind::Prompt, prompt);

        info!("Dispatcher ready with {} interaction kinds", dispatcher.factories.len());
        dispatcher
    }
}

fn choice(base: HandlerBase) -> Arc<dyn InteractionHandler> {
    Arc::new(ChoiceHandler::new(base))
}

fn essay(base: HandlerBase) -> Arc<dyn InteractionHandler> {
    Arc::new(EssayHandler::new(base))
}

fn survey(base: HandlerBase) -> Arc<dyn InteractionHandler> {
    Arc::new(SurveyHandler::new(base))
}

fn file_submission(base: HandlerBase) -> Arc<dyn InteractionHandler> {
    Arc::new(FileSubmissionHandler::new(base))
}

fn url_submission(base: HandlerBase) -> Arc<dyn InteractionHandler> {
    Arc::new(UrlSubmissionHandler::new(base))
}

fn teaching(base: HandlerBase) -> Arc<dyn InteractionHandler> {
    Arc::new(TeachingHandler::new(base))
}

fn prompt(base: HandlerBase) -> Arc<dyn InteractionHandler> {
    Arc::new(PromptHandler::new(base))
}
