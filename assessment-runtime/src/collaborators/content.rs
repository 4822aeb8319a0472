use crate::types::ContentSource;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves lesson documents from `<root>/<topic>.md`.
pub struct FsContentSource {
    root: PathBuf,
}

impl FsContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Topics are plain names; anything that could leave `root` is refused.
    pub fn path_for(&self, topic: &str) -> Result<PathBuf> {
        let topic = topic.trim();
        if topic.is_empty() || topic.contains(['/', '\\']) || topic.starts_with('.') {
            bail!("invalid topic name '{}'", topic);
        }
        Ok(self.root.join(format!("{}.md", topic)))
    }
}

#[async_trait]
impl ContentSource for FsContentSource {
    async fn fetch_document(&self, topic: &str) -> Result<String> {
        let path = self.path_for(topic)?;
        debug!("Reading topic '{}' from {}", topic, path.display());
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))
    }
}
