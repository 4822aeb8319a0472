use crate::progress_store::ProgressStore;
use crate::types::{
    EventType, ExamPhase, ExamResults, ExamState, ExamStats, Mode, ProgressCollaborator, Result, RuntimeError,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One exam sitting over the interactions of a topic.
///
/// `notStarted -> inProgress -> completed`, never backwards. While in
/// progress every rendered interaction id is registered, so unvisited items
/// still count toward the total. Completion snapshots the results and makes
/// the items read-only.
pub struct ExamSession {
    id: Uuid,
    state: ExamState,
    registered: Vec<String>,
    seen: HashSet<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl ExamSession {
    pub fn new() -> Self {
        Self::from_state(ExamState::default())
    }

    /// Resume from a previously persisted state.
    pub fn from_state(state: ExamState) -> Self {
        Self {
            id: Uuid::new_v4(),
            state,
            registered: Vec::new(),
            seen: HashSet::new(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &ExamState {
        &self.state
    }

    pub fn phase(&self) -> ExamPhase {
        self.state.state
    }

    pub fn results(&self) -> Option<&ExamStats> {
        self.state.results.as_ref().map(|results| &results.ai)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Mode items render in; `None` while the exam has not started.
    pub fn mode(&self) -> Option<Mode> {
        match self.state.state {
            ExamPhase::NotStarted => None,
            ExamPhase::InProgress => Some(Mode::Exam),
            ExamPhase::Completed => Some(Mode::ExamReview),
        }
    }

    pub fn registered_ids(&self) -> &[String] {
        &self.registered
    }

    /// Note an interaction rendered during the exam. Returns whether it was new.
    pub fn register(&mut self, interaction_id: &str) -> bool {
        if self.state.state != ExamPhase::InProgress || interaction_id.is_empty() {
            return false;
        }
        if !self.seen.insert(interaction_id.to_string()) {
            return false;
        }
        self.registered.push(interaction_id.to_string());
        true
    }

    pub async fn start(&mut self, progress: &dyn ProgressCollaborator, user_id: Option<&str>) -> Result<()> {
        self.transition(ExamPhase::NotStarted, ExamPhase::InProgress)?;
        self.started_at = Some(Utc::now());

        self.persist(progress, user_id, 0).await;
        info!("Exam {} started", self.id);
        Ok(())
    }

    /// Close the exam and snapshot its statistics.
    pub async fn complete(
        &mut self,
        store: &ProgressStore,
        progress: &dyn ProgressCollaborator,
        user_id: Option<&str>,
    ) -> Result<ExamStats> {
        self.transition(ExamPhase::InProgress, ExamPhase::Completed)?;

        let stats = compute_stats(&self.registered, store);
        self.state.results = Some(ExamResults { ai: stats.clone() });
        let now = Utc::now();
        self.completed_at = Some(now);

        let duration = self
            .started_at
            .map(|started| (now - started).num_seconds().max(0) as u64)
            .unwrap_or(0);
        self.persist(progress, user_id, duration).await;

        info!(
            "Exam {} completed: {}/{} answered, {} graded, {}%",
            self.id,
            stats.total_answered_questions,
            stats.total_questions,
            stats.total_graded_questions,
            stats.percent_correct
        );
        Ok(stats)
    }

    fn transition(&mut self, from: ExamPhase, to: ExamPhase) -> Result<()> {
        if self.state.state != from {
            return Err(RuntimeError::InvalidTransition {
                from: self.state.state,
                to,
            });
        }
        debug!("Exam {} moving {} -> {}", self.id, from, to);
        self.state.state = to;
        Ok(())
    }

    async fn persist(&self, progress: &dyn ProgressCollaborator, user_id: Option<&str>, duration: u64) {
        let mut details = match serde_json::to_value(&self.state) {
            Ok(details) => details,
            Err(e) => {
                warn!("Could not serialize exam state: {}", e);
                return;
            }
        };
        if let Value::Object(map) = &mut details {
            map.insert("examId".to_string(), Value::String(self.id.to_string()));
        }

        if let Err(e) = progress.add_progress(user_id, None, EventType::Exam, duration, details).await {
            warn!("Failed to record exam event for {}: {}", self.id, e);
        }
    }
}

impl Default for ExamSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics over `ids` as currently recorded in `store`.
pub fn compute_stats(ids: &[String], store: &ProgressStore) -> ExamStats {
    let mut answered = 0;
    let mut graded = Vec::new();

    for id in ids {
        let Some(record) = store.get(id) else {
            continue;
        };
        if !record.is_answered() {
            continue;
        }
        answered += 1;
        if let Some(percent) = record.percent_correct {
            graded.push(percent);
        }
    }

    let percent_correct = if graded.is_empty() {
        0.0
    } else {
        let mean = graded.iter().sum::<f64>() / graded.len() as f64;
        (mean * 100.0).round() / 100.0
    };

    ExamStats {
        total_questions: ids.len(),
        total_answered_questions: answered,
        total_graded_questions: graded.len(),
        percent_correct,
    }
}
