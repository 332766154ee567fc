//! Published snapshot and reload.
//!
//! Requests load the current [`ArchIndex`] once and keep that `Arc` for their
//! whole lifetime. A reload builds a complete replacement off to the side and
//! publishes it with one atomic swap, so a reader never sees a half-built
//! index and a failed reload leaves the old one serving.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;

use crate::arch::ArchIndex;
use crate::error::{RepoError, Result};
use crate::repodata::RepoData;
use crate::search::{SearchError, SearchIndexer};

/// Holder of the published [`ArchIndex`].
pub struct Store {
    current: ArcSwap<ArchIndex>,
    indexer: Option<Arc<dyn SearchIndexer>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.current.load_full();
        f.debug_struct("Store")
            .field("current", &current)
            .field("indexer", &self.indexer.is_some())
            .finish()
    }
}

impl Store {
    /// A store serving an empty index until the first reload.
    pub fn new(indexer: Option<Arc<dyn SearchIndexer>>) -> Self {
        Self {
            current: ArcSwap::from_pointee(ArchIndex::default()),
            indexer,
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<ArchIndex> {
        self.current.load_full()
    }

    /// True when reloads also build full-text indices.
    pub fn search_enabled(&self) -> bool {
        self.indexer.is_some()
    }

    /// Rebuild from `paths` and publish the result.
    ///
    /// # Errors
    ///
    /// Any load or indexing failure is returned and the published snapshot
    /// is left untouched.
    pub async fn reload(&self, paths: &[PathBuf]) -> Result<Arc<ArchIndex>> {
        let owned = paths.to_vec();
        let index = tokio::task::spawn_blocking(move || ArchIndex::build(&owned)).await??;

        let index = match &self.indexer {
            Some(indexer) => attach_search(index, Arc::clone(indexer)).await?,
            None => index,
        };

        let index = Arc::new(index);
        self.current.store(Arc::clone(&index));

        tracing::info!(
            archs = index.names().len(),
            packages = index.packages(),
            etag = %index.etag(),
            "published repodata snapshot"
        );
        Ok(index)
    }
}

type IndexOutcome = (String, RepoData, std::result::Result<(), SearchError>);

/// Build one search handle per architecture on the blocking pool.
async fn attach_search(index: ArchIndex, indexer: Arc<dyn SearchIndexer>) -> Result<ArchIndex> {
    let archs = index.into_archs();
    let (tx, mut rx) = mpsc::unbounded_channel::<IndexOutcome>();

    let mut tasks = Vec::with_capacity(archs.len());
    for (arch, mut rd) in archs {
        let tx = tx.clone();
        let indexer = Arc::clone(&indexer);
        tasks.push(tokio::task::spawn_blocking(move || {
            let outcome = indexer.index(&arch, rd.index()).map(|handle| {
                tracing::debug!(arch, docs = handle.len(), "search index built");
                rd.set_search(handle);
            });
            // The receiver outlives every task.
            let _ = tx.send((arch, rd, outcome));
        }));
    }
    drop(tx);

    let mut first_error: Option<RepoError> = None;
    let mut done = std::collections::HashMap::new();
    while let Some((arch, rd, outcome)) = rx.recv().await {
        match outcome {
            Ok(()) => {
                done.insert(arch, rd);
            }
            Err(source) => {
                tracing::error!(arch, "search indexing failed: {source}");
                first_error.get_or_insert(RepoError::Search { arch, source });
            }
        }
    }

    for task in tasks {
        if let Err(err) = task.await {
            first_error.get_or_insert(RepoError::Task(err));
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(ArchIndex::from_archs(done)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_empty() {
        let store = Store::new(None);
        let snap = store.snapshot();
        assert!(snap.is_empty());
        assert!(!store.search_enabled());
    }

    #[tokio::test]
    async fn reload_of_nothing_publishes_empty_index() {
        let store = Store::new(None);
        let before = store.snapshot();
        let published = store.reload(&[]).await.unwrap();

        assert!(published.is_empty());
        assert!(!Arc::ptr_eq(&before, &store.snapshot()));
        assert!(Arc::ptr_eq(&published, &store.snapshot()));
    }

    #[tokio::test]
    async fn failed_reload_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("x86_64-repodata");
        std::fs::write(&bad, b"not an archive").unwrap();

        let store = Store::new(None);
        let before = store.snapshot();
        let err = store.reload(&[bad]).await.unwrap_err();

        assert!(matches!(err, RepoError::Load { .. }), "{err}");
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }
}
