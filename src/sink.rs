use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::document::BANNER;
use crate::error::WriteError;

/// Durable storage for generated documents.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Store `text` at `relative_path` (relative to the content root).
    async fn write(&self, relative_path: &str, text: String) -> Result<(), WriteError>;

    /// Remove previously generated documents from `dirs`. Returns the number
    /// of files removed.
    async fn cleanup(&self, dirs: &[String]) -> Result<usize>;
}

/// Writes documents below a content root on the local filesystem.
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentSink for FsSink {
    async fn write(&self, relative_path: &str, text: String) -> Result<(), WriteError> {
        let path = self.root.join(relative_path);
        let to_err = |source| WriteError {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(to_err)?;
        }
        tokio::fs::write(&path, text).await.map_err(to_err)
    }

    async fn cleanup(&self, dirs: &[String]) -> Result<usize> {
        let mut removed = 0;
        for dir in dirs {
            let dir = self.root.join(dir);
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                // hand-written pages living next to generated ones stay
                let text = tokio::fs::read_to_string(&path).await.unwrap_or_default();
                if !text.contains(BANNER) {
                    continue;
                }
                tokio::fs::remove_file(&path)
                    .await
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                debug!("removed {}", path.display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}


// ── Tests ──
