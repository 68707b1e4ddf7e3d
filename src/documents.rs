//! Reference document loading.
//!
//! Resolves a marker to the set of provider-side documents that discuss it.
//! Every call re-lists; nothing is cached between requests.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::DocumentsConfig;
use crate::llm::DocumentStore;
use crate::models::{DocumentRef, Marker};

/// Where reference documents come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Upload every file under `<root>/<marker>/`.
    Local,
    /// Filter the provider's existing file listing by marker name.
    RemoteListing,
}

impl FromStr for LoadStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" | "disk" => Ok(LoadStrategy::Local),
            "remote" | "server" => Ok(LoadStrategy::RemoteListing),
            other => bail!(
                "Invalid document load strategy: '{}'. Must be local or remote.",
                other
            ),
        }
    }
}

pub struct DocumentLoader {
    strategy: LoadStrategy,
    root: PathBuf,
    store: Arc<dyn DocumentStore>,
}

impl DocumentLoader {
    pub fn new(strategy: LoadStrategy, root: impl Into<PathBuf>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            strategy,
            root: root.into(),
            store,
        }
    }

    pub fn from_config(config: &DocumentsConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let strategy = config.strategy.parse()?;
        Ok(Self::new(strategy, config.root.clone(), store))
    }

    pub fn strategy(&self) -> LoadStrategy {
        self.strategy
    }

    /// Documents for `marker`, deduplicated by filename, in listing order.
    #[instrument(skip(self), fields(strategy = ?self.strategy))]
    pub async fn load(&self, marker: Marker) -> Result<Vec<DocumentRef>> {
        let documents = match self.strategy {
            LoadStrategy::Local => self.load_local(marker).await?,
            LoadStrategy::RemoteListing => {
                let files = self.store.list_files().await?;
                filter_for_marker(files, marker.as_str())
            }
        };
        info!(count = documents.len(), "loaded reference documents");
        Ok(documents)
    }

    async fn load_local(&self, marker: Marker) -> Result<Vec<DocumentRef>> {
        let dir = self.root.join(marker.as_str());
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to list document directory: {}", dir.display()))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut uploaded = Vec::with_capacity(paths.len());
        for path in paths {
            uploaded.push(self.store.upload(&path).await?);
        }
        Ok(dedup_by_filename(uploaded))
    }
}

/// Keep files whose name contains `marker` (case-insensitive), first
/// occurrence of each filename only.
pub fn filter_for_marker(files: Vec<DocumentRef>, marker: &str) -> Vec<DocumentRef> {
    let needle = marker.to_lowercase();
    dedup_by_filename(
        files
            .into_iter()
            .filter(|f| f.filename.to_lowercase().contains(&needle))
            .collect(),
    )
}

fn dedup_by_filename(files: Vec<DocumentRef>) -> Vec<DocumentRef> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.filename.clone()))
        .collect()
}
