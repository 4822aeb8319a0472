use crate::config::HttpConfig;
use crate::types::{
    ChoiceFeedbackRequest, ContentSource, EssayFeedbackRequest, EventType, GenerativeText, ProgressCollaborator,
    ProgressEvent, QuizProgress, Result, RuntimeError, SurveySummary, TeachingRequest,
};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct TextReply {
    response: String,
}

/// JSON client for a remote progress/feedback service.
///
/// Endpoints are resolved against `base_url`:
/// `POST progress`, `GET progress/quiz`, `GET surveys/{id}/summary`,
/// `POST feedback/choice`, `POST feedback/essay`, `POST prompt`,
/// `POST teaching`, `GET content/{topic}`. Only GETs are retried.
pub struct HttpCollaborator {
    client: Client,
    base_url: Url,
    config: HttpConfig,
    user_id: Option<String>,
}

impl HttpCollaborator {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(RuntimeError::Config(format!("{} cannot be a base URL", base_url)));
        }

        info!("HTTP collaborator targeting {}", base_url);
        Ok(Self {
            client,
            base_url,
            config,
            user_id: None,
        })
    }

    /// Scope quiz progress queries to one user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `segments` (each percent-encoded) under the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RuntimeError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_with_retry(&self, url: Url) -> Result<Response> {
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: delay,
            initial_interval: delay,
            max_interval: delay * 32,
            multiplier: 2.0,
            max_elapsed_time: Some(delay * 60),
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            debug!("GET {} (attempt {})", url, attempt + 1);
            let failure = match self.authorize(self.client.get(url.clone())).send().await {
                Ok(response) if response.status().is_server_error() => {
                    RuntimeError::General(format!("HTTP {} from {}", response.status(), url))
                }
                Ok(response) => return Ok(response.error_for_status()?),
                Err(e) => RuntimeError::Http(e),
            };

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            }

            error!("GET {} failed after {} attempts", url, attempt + 1);
            return Err(failure);
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.get_with_retry(url).await?;
        Ok(response.json().await?)
    }

    async fn post<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<Response> {
        debug!("POST {}", url);
        let response = self.authorize(self.client.post(url)).json(body).send().await?;
        Ok(response.error_for_status()?)
    }

    async fn post_for_text<B: Serialize + ?Sized>(&self, path: &[&str], body: &B) -> Result<String> {
        let url = self.endpoint(path)?;
        let reply: TextReply = self.post(url, body).await?.json().await?;
        Ok(reply.response)
    }
}

#[async_trait]
impl ProgressCollaborator for HttpCollaborator {
    async fn add_progress(
        &self,
        user_id: Option<&str>,
        interaction_id: Option<&str>,
        event_type: EventType,
        duration: u64,
        details: Value,
    ) -> anyhow::Result<()> {
        let event = ProgressEvent {
            user_id: user_id.map(str::to_string),
            interaction_id: interaction_id.map(str::to_string),
            event_type,
            duration,
            details,
        };
        let url = self.endpoint(&["progress"])?;
        self.post(url, &event).await?;
        Ok(())
    }

    async fn get_quiz_progress(&self) -> anyhow::Result<HashMap<String, QuizProgress>> {
        let mut url = self.endpoint(&["progress", "quiz"])?;
        if let Some(user_id) = &self.user_id {
            url.query_pairs_mut().append_pair("userId", user_id);
        }
        Ok(self.get_json(url).await?)
    }

    async fn get_survey_summary(&self, interaction_id: &str) -> anyhow::Result<SurveySummary> {
        let url = self.endpoint(&["surveys", interaction_id, "summary"])?;
        Ok(self.get_json(url).await?)
    }
}

#[async_trait]
impl GenerativeText for HttpCollaborator {
    async fn get_choice_interaction_feedback(&self, request: &ChoiceFeedbackRequest) -> anyhow::Result<String> {
        Ok(self.post_for_text(&["feedback", "choice"], request).await?)
    }

    async fn get_essay_interaction_feedback(&self, request: &EssayFeedbackRequest) -> anyhow::Result<String> {
        Ok(self.post_for_text(&["feedback", "essay"], request).await?)
    }

    async fn get_prompt_response(&self, text: &str) -> anyhow::Result<String> {
        Ok(self.post_for_text(&["prompt"], &json!({ "text": text })).await?)
    }

    async fn get_teaching_response(&self, request: &TeachingRequest) -> anyhow::Result<String> {
        Ok(self.post_for_text(&["teaching"], request).await?)
    }
}

#[async_trait]
impl ContentSource for HttpCollaborator {
    async fn fetch_document(&self, topic: &str) -> anyhow::Result<String> {
        let url = self.endpoint(&["content", topic])?;
        let document = self.get_with_retry(url).await?.text().await?;
        info!("Fetched topic '{}' ({} bytes)", topic, document.len());
        Ok(document)
    }
}
