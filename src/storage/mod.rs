//! Storage backend seam — pure I/O, no routing logic.
//!
//! The pipeline only ever talks to the object-hierarchy store through
//! [`StorageBackend`]; the Drive implementation lives in [`drive`].

use async_trait::async_trait;

use crate::error::StorageError;
use crate::pipeline::types::Document;

pub mod drive;

pub use drive::DriveBackend;

/// Handle to a folder in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderHandle {
    pub id: String,
}

impl FolderHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl std::fmt::Display for FolderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Object-hierarchy store the archiver files documents into.
///
/// `find_or_create_folder` must be idempotent: creating under the same
/// parent and name twice returns the same handle.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List the documents directly inside a folder.
    async fn list_children(&self, folder: &FolderHandle) -> Result<Vec<Document>, StorageError>;

    /// Fetch the content bytes for a document.
    async fn get_content(&self, content_ref: &str) -> Result<Vec<u8>, StorageError>;

    /// Return the folder `name` under `parent`, creating it if absent.
    async fn find_or_create_folder(
        &self,
        parent: &FolderHandle,
        name: &str,
    ) -> Result<FolderHandle, StorageError>;

    /// Move a document into `dest` and rename it in one operation.
    async fn move_and_rename(
        &self,
        document_id: &str,
        dest: &FolderHandle,
        new_name: &str,
    ) -> Result<(), StorageError>;

    /// Create a small plain-text file next to an archived document.
    async fn create_note(
        &self,
        folder: &FolderHandle,
        name: &str,
        content: &str,
    ) -> Result<(), StorageError>;
}
