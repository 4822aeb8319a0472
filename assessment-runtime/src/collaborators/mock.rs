use crate::types::{
    ChoiceFeedbackRequest, EssayFeedbackRequest, EventType, GenerativeText, ProgressCollaborator, ProgressEvent,
    QuizProgress, SurveySummary, TeachingRequest,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Calls received by a [`MockGenerativeText`], per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub choice: usize,
    pub essay: usize,
    pub prompt: usize,
    pub teaching: usize,
}

/// Scripted generative-text service for development and testing.
pub struct MockGenerativeText {
    choice_reply: String,
    essay_reply: String,
    prompt_reply: Option<String>,
    teaching_replies: Mutex<VecDeque<String>>,
    teaching_reply: String,
    failing: AtomicBool,
    response_delay_ms: u64,
    choice_calls: AtomicUsize,
    essay_calls: AtomicUsize,
    prompt_calls: AtomicUsize,
    teaching_calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    last_teaching: Mutex<Option<TeachingRequest>>,
}

impl MockGenerativeText {
    pub fn new() -> Self {
        Self {
            choice_reply: "Review which options actually apply.".to_string(),
            essay_reply: r#"{"percentCorrect": 75} A reasonable answer."#.to_string(),
            prompt_reply: None,
            teaching_replies: Mutex::new(VecDeque::new()),
            teaching_reply: "Could you give me an example?".to_string(),
            failing: AtomicBool::new(false),
            response_delay_ms: 0,
            choice_calls: AtomicUsize::new(0),
            essay_calls: AtomicUsize::new(0),
            prompt_calls: AtomicUsize::new(0),
            teaching_calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            last_teaching: Mutex::new(None),
        }
    }

    pub fn with_choice_reply(mut self, reply: impl Into<String>) -> Self {
        self.choice_reply = reply.into();
        self
    }

    pub fn with_essay_reply(mut self, reply: impl Into<String>) -> Self {
        self.essay_reply = reply.into();
        self
    }

    /// Fixed prompt reply; without one the prompt is echoed back.
    pub fn with_prompt_reply(mut self, reply: impl Into<String>) -> Self {
        self.prompt_reply = Some(reply.into());
        self
    }

    /// Teaching replies handed out in order before falling back to the default.
    pub fn with_teaching_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.teaching_replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(replies.into_iter().map(Into::into));
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            choice: self.choice_calls.load(Ordering::SeqCst),
            essay: self.essay_calls.load(Ordering::SeqCst),
            prompt: self.prompt_calls.load(Ordering::SeqCst),
            teaching: self.teaching_calls.load(Ordering::SeqCst),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_teaching_request(&self) -> Option<TeachingRequest> {
        self.last_teaching.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn simulate(&self, counter: &AtomicUsize, operation: &str) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.response_delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.response_delay_ms)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            bail!("mock generative text unavailable ({})", operation);
        }
        debug!("Mock generative reply for {}", operation);
        Ok(())
    }
}

impl Default for MockGenerativeText {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeText for MockGenerativeText {
    async fn get_choice_interaction_feedback(&self, _request: &ChoiceFeedbackRequest) -> Result<String> {
        self.simulate(&self.choice_calls, "choice feedback").await?;
        Ok(self.choice_reply.clone())
    }

    async fn get_essay_interaction_feedback(&self, _request: &EssayFeedbackRequest) -> Result<String> {
        self.simulate(&self.essay_calls, "essay feedback").await?;
        Ok(self.essay_reply.clone())
    }

    async fn get_prompt_response(&self, text: &str) -> Result<String> {
        *self.last_prompt.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.to_string());
        self.simulate(&self.prompt_calls, "prompt").await?;
        Ok(self.prompt_reply.clone().unwrap_or_else(|| text.to_string()))
    }

    async fn get_teaching_response(&self, request: &TeachingRequest) -> Result<String> {
        *self.last_teaching.lock().unwrap_or_else(PoisonError::into_inner) = Some(request.clone());
        self.simulate(&self.teaching_calls, "teaching").await?;
        let scripted = self
            .teaching_replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        Ok(scripted.unwrap_or_else(|| self.teaching_reply.clone()))
    }
}

/// Progress service that keeps everything in memory.
///
/// Quiz progress follows the recorded `quizSubmit` events (latest wins).
/// Survey summaries are whatever the test last installed.
#[derive(Default)]
pub struct InMemoryProgress {
    events: Mutex<Vec<ProgressEvent>>,
    quiz: Mutex<HashMap<String, QuizProgress>>,
    surveys: Mutex<HashMap<String, SurveySummary>>,
    failing: AtomicBool,
}

impl InMemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the progress handed back on topic load.
    pub fn with_quiz_progress(self, interaction_id: impl Into<String>, details: Value) -> Self {
        self.quiz
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(interaction_id.into(), QuizProgress { details });
        self
    }

    pub fn set_survey_summary(&self, interaction_id: impl Into<String>, summary: SurveySummary) {
        self.surveys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(interaction_id.into(), summary);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn events_of(&self, event_type: EventType) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.event_type == event_type)
            .collect()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("in-memory progress service unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressCollaborator for InMemoryProgress {
    async fn add_progress(
        &self,
        user_id: Option<&str>,
        interaction_id: Option<&str>,
        event_type: EventType,
        duration: u64,
        details: Value,
    ) -> Result<()> {
        self.check()?;

        if let (EventType::QuizSubmit, Some(id)) = (event_type, interaction_id) {
            self.quiz.lock().unwrap_or_else(PoisonError::into_inner).insert(
                id.to_string(),
                QuizProgress {
                    details: details.clone(),
                },
            );
        }

        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProgressEvent {
                user_id: user_id.map(str::to_string),
                interaction_id: interaction_id.map(str::to_string),
                event_type,
                duration,
                details,
            });
        Ok(())
    }

    async fn get_quiz_progress(&self) -> Result<HashMap<String, QuizProgress>> {
        self.check()?;
        Ok(self.quiz.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn get_survey_summary(&self, interaction_id: &str) -> Result<SurveySummary> {
        self.check()?;
        Ok(self
            .surveys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(interaction_id)
            .cloned()
            .unwrap_or_default())
    }
}
