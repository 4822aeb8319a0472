use super::{HandlerBase, InteractionHandler};
use crate::grading::COMPLETION_PERCENT;
use crate::types::{GradeSignal, ProgressRecord, Rejection, Response, SubmitOutcome};
use async_trait::async_trait;
use tracing::info;
use url::Url;

pub const FILE_SUBMITTED: &str = "File submitted.";
pub const URL_SUBMITTED: &str = "URL submitted.";

/// Accepts any non-empty upload. Shows as complete (100) but the stored
/// record carries no score, so exams count it as answered, not graded.
pub struct FileSubmissionHandler {
    base: HandlerBase,
}

impl FileSubmissionHandler {
    pub fn new(base: HandlerBase) -> Self {
        Self { base }
    }
}

#[async_trait]
impl InteractionHandler for FileSubmissionHandler {
    fn base(&self) -> &HandlerBase {
        &self.base
    }

    fn validate(&self, response: &Response) -> Option<Rejection> {
        match response {
            Response::File { name, content } if name.trim().is_empty() || content.is_empty() => {
                Some(Rejection::EmptyResponse)
            }
            Response::File { .. } => None,
            _ => Some(Rejection::UnsupportedResponse),
        }
    }

    async fn submit(&self, response: Response) -> SubmitOutcome {
        if let Some(rejection) = self.base.write_gate().or_else(|| self.validate(&response)) {
            return SubmitOutcome::Rejected(rejection);
        }
        let Response::File { name, content } = response else {
            return SubmitOutcome::Rejected(Rejection::UnsupportedResponse);
        };
        let submission = match self.base.begin() {
            Ok(submission) => submission,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        let record = ProgressRecord::new(self.base.definition.kind.clone())
            .with_answer(name.trim())
            .with_feedback(FILE_SUBMITTED);
        let record = self.base.commit(record).await;

        info!("File '{}' ({} bytes) submitted for '{}'", name.trim(), content.len(), self.base.id());
        submission.accept(record, GradeSignal::Graded(COMPLETION_PERCENT))
    }
}

/// Accepts an absolute http(s) link.
pub struct UrlSubmissionHandler {
    base: HandlerBase,
}

impl UrlSubmissionHandler {
    pub fn new(base: HandlerBase) -> Self {
        Self { base }
    }
}

pub fn parse_submission_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

#[async_trait]
impl InteractionHandler for UrlSubmissionHandler {
    fn base(&self) -> &HandlerBase {
        &self.base
    }

    fn validate(&self, response: &Response) -> Option<Rejection> {
        match response {
            Response::Url(raw) if raw.trim().is_empty() => Some(Rejection::EmptyResponse),
            Response::Url(raw) if parse_submission_url(raw).is_none() => Some(Rejection::InvalidUrl),
            Response::Url(_) => None,
            _ => Some(Rejection::UnsupportedResponse),
        }
    }

    async fn submit(&self, response: Response) -> SubmitOutcome {
        if let Some(rejection) = self.base.write_gate().or_else(|| self.validate(&response)) {
            return SubmitOutcome::Rejected(rejection);
        }
        let Some(url) = (match &response {
            Response::Url(raw) => parse_submission_url(raw),
            _ => None,
        }) else {
            return SubmitOutcome::Rejected(Rejection::InvalidUrl);
        };
        let submission = match self.base.begin() {
            Ok(submission) => submission,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        let record = ProgressRecord::new(self.base.definition.kind.clone())
            .with_answer(url.as_str())
            .with_feedback(URL_SUBMITTED);
        let record = self.base.commit(record).await;

        info!("URL {} submitted for '{}'", url, self.base.id());
        submission.accept(record, GradeSignal::Graded(COMPLETION_PERCENT))
    }
}
