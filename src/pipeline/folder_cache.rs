//! Folder path cache — memoized get-or-create folder resolution.
//!
//! Within one run, a segment path resolves to exactly one handle and
//! triggers at most one backend get-or-create call, even when resolved
//! concurrently. Every intermediate handle is cached, not just the leaf.
//! Locking is per path prefix, not global, so unrelated folders resolve
//! in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;
use crate::pipeline::types::FolderPath;
use crate::storage::{FolderHandle, StorageBackend};

/// One run's mapping of segment paths to folder handles.
pub struct FolderPathCache {
    storage: Arc<dyn StorageBackend>,
    root: FolderHandle,
    resolved: Mutex<HashMap<Vec<String>, FolderHandle>>,
    /// On-demand per-prefix gates serializing get-or-create.
    gates: Mutex<HashMap<Vec<String>, Arc<Mutex<()>>>>,
}

impl FolderPathCache {
    pub fn new(storage: Arc<dyn StorageBackend>, root: FolderHandle) -> Self {
        Self {
            storage,
            root,
            resolved: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a path to a folder handle, creating missing segments.
    pub async fn resolve(&self, path: &FolderPath) -> Result<FolderHandle, StorageError> {
        let mut parent = self.root.clone();
        let mut prefix: Vec<String> = Vec::with_capacity(path.segments().len());
        for segment in path.segments() {
            prefix.push(segment.clone());
            parent = self.resolve_segment(&prefix, &parent, segment).await?;
        }
        Ok(parent)
    }

    async fn resolve_segment(
        &self,
        prefix: &[String],
        parent: &FolderHandle,
        name: &str,
    ) -> Result<FolderHandle, StorageError> {
        if let Some(handle) = self.resolved.lock().await.get(prefix) {
            return Ok(handle.clone());
        }

        let gate = {
            let mut gates = self.gates.lock().await;
            Arc::clone(gates.entry(prefix.to_vec()).or_default())
        };
        let _guard = gate.lock().await;

        // A concurrent resolver may have won the race while we waited.
        if let Some(handle) = self.resolved.lock().await.get(prefix) {
            return Ok(handle.clone());
        }

        let handle = self.storage.find_or_create_folder(parent, name).await?;
        debug!(path = %prefix.join("/"), handle = %handle, "Folder resolved");
        self.resolved
            .lock()
            .await
            .insert(prefix.to_vec(), handle.clone());
        Ok(handle)
    }
}
