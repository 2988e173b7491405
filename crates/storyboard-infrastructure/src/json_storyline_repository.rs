//! JSON file-based storyline storage.

use crate::paths::StoryboardPaths;
use crate::storage::LockedJsonFile;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storyboard_core::backend::StorylineSink;
use storyboard_core::scene::StoryDocument;
use storyboard_core::{Result, StoryboardError};

/// Stores saved stories in a single `storylines.json`.
///
/// Responsibilities:
/// - Merge saved documents into the file (same-named stories are replaced)
/// - Keep the file consistent across concurrent writers
///
/// Does NOT:
/// - Talk to the generation server (see `HttpBackend` for remote saves)
#[derive(Clone)]
pub struct JsonStorylineRepository {
    file: Arc<LockedJsonFile<StoryDocument>>,
}

impl JsonStorylineRepository {
    /// Creates a repository at the default path (data dir `storylines.json`).
    pub fn new() -> Result<Self> {
        let path = StoryboardPaths::storylines_file()
            .map_err(|e| StoryboardError::storage(e.to_string()))?;
        Ok(Self::with_path(path))
    }

    /// Creates a repository at a custom path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Arc::new(LockedJsonFile::new(path)),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Reads every stored story. A missing file is an empty document.
    pub fn load_all(&self) -> Result<StoryDocument> {
        Ok(self.file.read()?.unwrap_or_default())
    }

    /// Merges `document` into the file.
    pub fn save_document(&self, document: &StoryDocument) -> Result<()> {
        if document.is_empty() {
            tracing::debug!("[JsonStorylineRepository] nothing to save");
            return Ok(());
        }
        self.file.modify(|stored| {
            stored.merge_from(document);
            Ok(())
        })?;
        tracing::info!(
            "[JsonStorylineRepository] saved {} stor{} to {}",
            document.stories.len(),
            if document.stories.len() == 1 { "y" } else { "ies" },
            self.path().display()
        );
        Ok(())
    }
}

#[async_trait]
impl StorylineSink for JsonStorylineRepository {
    async fn save(&self, document: &StoryDocument) -> Result<()> {
        let repository = self.clone();
        let document = document.clone();
        tokio::task::spawn_blocking(move || repository.save_document(&document))
            .await
            .map_err(|e| StoryboardError::internal(format!("save task failed: {}", e)))?
    }
}
