use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::types::ScanResult;

/// Bounded, newest-first scan history for one category, persisted as a single
/// JSON array that is rewritten on every append.
///
/// No locking in here: callers serialize appends per category.
pub struct ResultJournal {
    path: PathBuf,
    capacity: usize,
}

impl ResultJournal {
    pub fn new(dir: impl AsRef<Path>, category: &str, capacity: usize) -> Self {
        Self {
            path: dir.as_ref().join(format!("{category}.json")),
            capacity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full history, newest first. A missing or unreadable document reads as empty.
    pub async fn load(&self) -> Vec<ScanResult> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "Journal unreadable, treating as empty: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<ScanResult>>(&content) {
            Ok(results) => results,
            Err(e) => {
                warn!(path = %self.path.display(), "Journal corrupt, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    /// Insert at the head and drop everything past capacity.
    pub async fn append(&self, result: &ScanResult) -> Result<()> {
        let mut results = self.load().await;
        results.insert(0, result.clone());
        results.truncate(self.capacity);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&results)?;

        // Write to a sibling temp file then rename over the document.
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), entries = results.len(), "Journal written");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<ScanResult> {
        self.load().await.into_iter().find(|r| r.id == id)
    }

    pub async fn latest(&self) -> Option<ScanResult> {
        self.load().await.into_iter().next()
    }
}
