use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use crate::defs::EventType;
use crate::defs::ProgressCollaborator;
use crate::defs::ProgressEvent;
use crate::defs::QuizProgress;
use crate::defs::SurveySummary;

/// SQLite-backed progress service. Writes accept any user; reads are scoped
/// to the user the service was opened for.
pub struct SqliteProgressService {
    pool: SqlitePool,
    user_id: Option<String>,
}

impl SqliteProgressService {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url '{}'", database_url))?
            .create_if_missing(true);

        // Every connection to an in-memory database gets its own copy.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let service = Self { pool, user_id: None };
        service.setup_schema().await?;

        info!("Connected progress store at {}", database_url);
        Ok(service)
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS progress_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT,
                    interaction_id TEXT,
                    event_type TEXT NOT NULL,
                    duration INTEGER NOT NULL,
                    details TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_progress_events_interaction ON progress_events (interaction_id, event_type)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Every stored event in insertion order.
    pub async fn events(&self) -> Result<Vec<ProgressEvent>> {
        let mut rows = sqlx::query(
            "SELECT user_id, interaction_id, event_type, duration, details FROM progress_events ORDER BY id",
        )
        .fetch(&self.pool);

        let mut events = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let event_type: String = row.try_get("event_type")?;
            let Some(event_type) = EventType::parse(&event_type) else {
                warn!("Skipping event with unknown type '{}'", event_type);
                continue;
            };
            let details: String = row.try_get("details")?;
            events.push(ProgressEvent {
                user_id: row.try_get("user_id")?,
                interaction_id: row.try_get("interaction_id")?,
                event_type,
                duration: row.try_get::<i64, _>("duration")?.max(0) as u64,
                details: serde_json::from_str(&details)?,
            });
        }

        Ok(events)
    }
}

#[async_trait]
impl ProgressCollaborator for SqliteProgressService {
    async fn add_progress(
        &self,
        user_id: Option<&str>,
        interaction_id: Option<&str>,
        event_type: EventType,
        duration: u64,
        details: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            "
                INSERT INTO progress_events
                    (user_id, interaction_id, event_type, duration, details, created_at)
                VALUES
                    (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(user_id)
        .bind(interaction_id)
        .bind(event_type.as_str())
        .bind(i64::try_from(duration).unwrap_or(i64::MAX))
        .bind(details.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Stored {} event for {:?}", event_type, interaction_id);
        Ok(())
    }

    async fn get_quiz_progress(&self) -> Result<HashMap<String, QuizProgress>> {
        let mut rows = sqlx::query(
            "
                SELECT interaction_id, details FROM progress_events
                WHERE event_type = ?1 AND interaction_id IS NOT NULL AND user_id IS ?2
                ORDER BY id
            ",
        )
        .bind(EventType::QuizSubmit.as_str())
        .bind(self.user_id.as_deref())
        .fetch(&self.pool);

        let mut progress = HashMap::new();
        while let Some(row) = rows.try_next().await? {
            let interaction_id: String = row.try_get("interaction_id")?;
            let details: String = row.try_get("details")?;
            match serde_json::from_str(&details) {
                // Later rows win: only the latest submission counts.
                Ok(details) => {
                    progress.insert(interaction_id, QuizProgress { details });
                }
                Err(e) => warn!("Unreadable details for {}: {}", interaction_id, e),
            }
        }

        Ok(progress)
    }

    async fn get_survey_summary(&self, interaction_id: &str) -> Result<SurveySummary> {
        let mut rows = sqlx::query(
            "
                SELECT user_id, details FROM progress_events
                WHERE event_type = ?1 AND interaction_id = ?2
                ORDER BY id
            ",
        )
        .bind(EventType::QuizSubmit.as_str())
        .bind(interaction_id)
        .fetch(&self.pool);

        let mut latest: HashMap<Option<String>, serde_json::Value> = HashMap::new();
        while let Some(row) = rows.try_next().await? {
            let user_id: Option<String> = row.try_get("user_id")?;
            let details: String = row.try_get("details")?;
            if let Ok(details) = serde_json::from_str::<serde_json::Value>(&details) {
                latest.insert(user_id, details);
            }
        }

        let mut summary = SurveySummary::default();
        for details in latest.values() {
            if details.get("type").and_then(|t| t.as_str()) != Some("survey") {
                continue;
            }
            let selected: Vec<usize> = details
                .get("selected")
                .and_then(|s| s.as_array())
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|v| v.as_u64())
                        .map(|v| v as usize)
                        .collect()
                })
                .unwrap_or_default();
            if selected.is_empty() {
                continue;
            }
            summary.voters += 1;
            for index in selected {
                *summary.votes.entry(index).or_insert(0) += 1;
            }
        }

        debug!(
            "Survey {} has {} voters across {} options",
            interaction_id,
            summary.voters,
            summary.votes.len()
        );
        Ok(summary)
    }
}
