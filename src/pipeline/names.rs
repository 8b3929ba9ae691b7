//! Filename reservation — the one impure step of deciding.
//!
//! Collisions are resolved against the destination's *current* contents, so
//! the allocator consults the listing once per folder per run and then
//! serves reservations from memory. Reservations are serialized per
//! destination folder: two concurrent documents can never pick the same
//! suffix.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;
use crate::storage::{FolderHandle, StorageBackend};

/// Names known to be taken in one destination folder.
#[derive(Default)]
struct FolderNames {
    /// Remote listing fetched yet?
    loaded: bool,
    taken: HashSet<String>,
}

/// Decide-and-reserve filename allocator.
pub struct NameAllocator {
    storage: Arc<dyn StorageBackend>,
    folders: Mutex<HashMap<String, Arc<Mutex<FolderNames>>>>,
}

impl NameAllocator {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            folders: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve a collision-free name for `candidate` in `folder`.
    ///
    /// Returns the candidate itself when free, otherwise the candidate with
    /// the smallest positive `-N` suffix not yet present.
    pub async fn reserve(
        &self,
        folder: &FolderHandle,
        candidate: &str,
    ) -> Result<String, StorageError> {
        let slot = {
            let mut folders = self.folders.lock().await;
            Arc::clone(folders.entry(folder.id.clone()).or_default())
        };

        // Per-folder lock held across the listing fetch and the pick, so
        // reservation is observed as atomic within this folder.
        let mut names = slot.lock().await;
        if !names.loaded {
            let listing = self.storage.list_children(folder).await?;
            names
                .taken
                .extend(listing.into_iter().map(|d| d.display_name));
            names.loaded = true;
        }

        let reserved = next_free(&names.taken, candidate);
        names.taken.insert(reserved.clone());
        if reserved != candidate {
            debug!(
                folder = %folder,
                candidate,
                reserved = %reserved,
                "Filename collision, suffixed"
            );
        }
        Ok(reserved)
    }
}

/// Smallest free name: `candidate`, then `stem-1.ext`, `stem-2.ext`, …
fn next_free(taken: &HashSet<String>, candidate: &str) -> String {
    if !taken.contains(candidate) {
        return candidate.to_string();
    }
    let (stem, ext) = match candidate.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (candidate, None),
    };
    for n in 1u32.. {
        let probe = match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        if !taken.contains(&probe) {
            return probe;
        }
    }
    unreachable!("u32 suffix space exhausted")
}
