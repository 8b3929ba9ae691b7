//! Archive pipeline — per-document orchestration.
//!
//! State machine per document:
//! `Discovered → Classified → Decided → Applied → {Succeeded, Failed}`.
//!
//! Flow:
//! 1. Fetch content bytes (storage, retried on transient errors)
//! 2. Classify via the adapter — a `ClassificationError` is terminal for
//!    the document, nothing is moved
//! 3. Decide — pure, never fails
//! 4. Apply — resolve destination, reserve filename, move+rename; transient
//!    storage errors retried with bounded backoff
//!
//! Every document's trajectory is independent: a failed document is logged,
//! left in the Drop folder, and the batch continues.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ArchiveConfig;
use crate::error::{ClassificationError, Error, StorageError};
use crate::oracle::ClassificationOracle;
use crate::pipeline::adapter::ClassificationAdapter;
use crate::pipeline::folder_cache::FolderPathCache;
use crate::pipeline::names::NameAllocator;
use crate::pipeline::routing::RoutingEngine;
use crate::pipeline::types::{
    Classification, Decision, DecisionAction, Destination, DocType, Document, FailureReason,
    FolderPath, Outcome, SpecialBucket,
};
use crate::retry::{RetryPolicy, with_backoff};
use crate::storage::{FolderHandle, StorageBackend};

/// Pipeline tuning, lifted from [`ArchiveConfig`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bounded worker pool size.
    pub max_concurrency: usize,
    /// Timeout for each oracle/storage call; a timeout counts as transient.
    pub call_timeout: Duration,
    /// Backoff policy for transient storage failures.
    pub retry: RetryPolicy,
    /// Folder name of the Invalid bucket under the archive root.
    pub invalid_folder: String,
    /// Folder name of the Irrelevant bucket under the archive root.
    pub irrelevant_folder: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: crate::config::DEFAULT_MAX_CONCURRENCY,
            call_timeout: crate::config::DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
            invalid_folder: "Invalid".to_string(),
            irrelevant_folder: "Irrelevant".to_string(),
        }
    }
}

impl From<&ArchiveConfig> for PipelineConfig {
    fn from(config: &ArchiveConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            call_timeout: config.call_timeout,
            retry: config.retry,
            invalid_folder: config.invalid_folder_name.clone(),
            irrelevant_folder: config.irrelevant_folder_name.clone(),
        }
    }
}

/// Cooperative cancellation: stops new documents from starting, lets
/// in-flight documents reach a terminal state (no half-moved files).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrates one archival run over a Drop folder.
pub struct ArchivePipeline {
    storage: Arc<dyn StorageBackend>,
    adapter: ClassificationAdapter,
    engine: RoutingEngine,
    folders: FolderPathCache,
    names: NameAllocator,
    config: PipelineConfig,
    cancel: CancelToken,
}

impl ArchivePipeline {
    /// Build a pipeline for one run. The folder cache and name allocator are
    /// owned by this instance and die with it — nothing is shared across runs.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        oracle: Arc<dyn ClassificationOracle>,
        engine: RoutingEngine,
        archive_root: FolderHandle,
        config: PipelineConfig,
    ) -> Self {
        Self {
            adapter: ClassificationAdapter::new(oracle),
            engine,
            folders: FolderPathCache::new(Arc::clone(&storage), archive_root),
            names: NameAllocator::new(Arc::clone(&storage)),
            storage,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Token for cooperative cancellation of this run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Process every document currently in the Drop folder.
    ///
    /// Returns one outcome per document that was started. Documents skipped
    /// by cancellation produce no outcome and stay in the Drop folder.
    pub async fn run(&self, drop_folder: &FolderHandle) -> Result<Vec<Outcome>, Error> {
        let run_id = Uuid::new_v4();
        let documents = self
            .retried_storage(|| self.storage.list_children(drop_folder))
            .await
            .map_err(Error::Storage)?;
        info!(%run_id, count = documents.len(), "Drop folder scan complete");

        let outcomes: Vec<Outcome> = stream::iter(documents.into_iter().map(|doc| self.guarded(doc)))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            %run_id,
            succeeded,
            failed = outcomes.len() - succeeded,
            "Run complete"
        );
        Ok(outcomes)
    }

    /// Cancellation gate: checked once before a document starts; after that
    /// the document runs to a terminal state.
    async fn guarded(&self, document: Document) -> Option<Outcome> {
        if self.cancel.is_cancelled() {
            info!(
                id = %document.id,
                name = %document.display_name,
                "Cancellation requested, leaving document for a later run"
            );
            return None;
        }
        Some(self.process_one(document).await)
    }

    /// Drive one document through the full state machine.
    async fn process_one(&self, document: Document) -> Outcome {
        info!(
            id = %document.id,
            name = %document.display_name,
            "Processing document"
        );

        // Discovered → Classified
        let classification = match self.classify(&document).await {
            Ok(c) => c,
            Err(reason) => {
                warn!(id = %document.id, %reason, "Document failed before decision");
                return Outcome::failed(&document.id, None, reason);
            }
        };

        // Classified → Decided (pure, never fails)
        let decision = self.engine.decide(&document, &classification);
        info!(
            id = %document.id,
            destination = %decision.destination,
            filename = %decision.filename,
            action = decision.action.label(),
            "Decision made"
        );

        // Decided → Applied
        match self.apply(&document, &classification, &decision).await {
            Ok(final_name) => {
                info!(id = %document.id, filename = %final_name, "Document archived");
                Outcome::succeeded(&document.id, decision)
            }
            Err(e) => {
                warn!(id = %document.id, error = %e, "Document move failed, left in Drop folder");
                Outcome::failed(
                    &document.id,
                    Some(decision),
                    FailureReason::Storage {
                        detail: e.to_string(),
                    },
                )
            }
        }
    }

    /// Fetch bytes and classify. Storage fetch is retried; the oracle call
    /// is made exactly once (retry policy for classification is "re-scan
    /// later" — the document stays in the Drop folder).
    async fn classify(&self, document: &Document) -> Result<Classification, FailureReason> {
        let content = self
            .retried_storage(|| self.storage.get_content(&document.content_ref))
            .await
            .map_err(|e| FailureReason::Storage {
                detail: e.to_string(),
            })?;

        let classify = self.adapter.classify(document, &content);
        let timeout = self.config.call_timeout;
        match tokio::time::timeout(timeout, classify).await {
            Ok(Ok(classification)) => Ok(classification),
            Ok(Err(e)) => Err(FailureReason::Classification {
                detail: e.to_string(),
            }),
            Err(_) => Err(FailureReason::Classification {
                detail: ClassificationError::Timeout { timeout }.to_string(),
            }),
        }
    }

    /// Resolve the destination, reserve a collision-free name, and move the
    /// document into place. Returns the final filename.
    async fn apply(
        &self,
        document: &Document,
        classification: &Classification,
        decision: &Decision,
    ) -> Result<String, StorageError> {
        let dest = match &decision.destination {
            Destination::Dated { path } => {
                self.retried_storage(|| self.folders.resolve(path)).await?
            }
            Destination::Bucket { bucket } => {
                let path = FolderPath::new([self.bucket_folder(*bucket)]);
                self.retried_storage(|| self.folders.resolve(&path)).await?
            }
        };

        let final_name = self
            .retried_storage(|| self.names.reserve(&dest, &decision.filename))
            .await?;

        self.retried_storage(|| {
            self.storage
                .move_and_rename(&document.id, &dest, &final_name)
        })
        .await?;

        if decision.action == DecisionAction::Quarantine {
            self.write_quarantine_note(document, classification, decision, &dest)
                .await;
        }

        Ok(final_name)
    }

    fn bucket_folder(&self, bucket: SpecialBucket) -> &str {
        match bucket {
            SpecialBucket::Invalid => &self.config.invalid_folder,
            SpecialBucket::Irrelevant => &self.config.irrelevant_folder,
        }
    }

    /// Drop a `<stem>_results.txt` note next to a quarantined document so a
    /// human reviewer sees what the classifier saw. Best-effort: a failed
    /// note never fails the document.
    async fn write_quarantine_note(
        &self,
        document: &Document,
        classification: &Classification,
        decision: &Decision,
        folder: &FolderHandle,
    ) {
        let stem = decision
            .filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&decision.filename);
        let note_name = format!("{stem}_results.txt");

        let reason = if classification.doc_type == DocType::Unknown {
            "unrecognized document type".to_string()
        } else {
            format!(
                "confidence {:.2} below threshold",
                classification.confidence
            )
        };
        let payload =
            serde_json::to_string_pretty(&classification.raw).unwrap_or_else(|_| "{}".to_string());
        let content = format!("{payload}\n\nReason for quarantine: {reason}\n");

        if let Err(e) = self.storage.create_note(folder, &note_name, &content).await {
            warn!(
                id = %document.id,
                error = %e,
                "Could not create quarantine results note"
            );
        }
    }

    /// Wrap a storage call with the configured timeout and retry policy.
    async fn retried_storage<T, F, Fut>(&self, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let timeout = self.config.call_timeout;
        with_backoff(&self.config.retry, StorageError::is_transient, || {
            let fut = op();
            async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(StorageError::Timeout { timeout }),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use crate::config::{CompanyContext, CounterpartyTieBreak};
    use crate::error::ClassificationError;
    use crate::oracle::{RawClassification, RawParty};
    use crate::pipeline::types::OutcomeResult;

    // ── Fakes ───────────────────────────────────────────────────────

    #[derive(Clone)]
    struct FileEntry {
        id: String,
        name: String,
    }

    #[derive(Default)]
    struct Tree {
        /// parent folder id → (child name → folder id)
        folders: HashMap<String, HashMap<String, String>>,
        /// folder id → files
        files: HashMap<String, Vec<FileEntry>>,
        notes: HashMap<String, Vec<String>>,
        next_folder: usize,
    }

    #[derive(Default)]
    struct FakeStorage {
        tree: Mutex<Tree>,
        /// Errors served (in order) by upcoming move calls.
        move_failures: Mutex<VecDeque<StorageError>>,
        move_attempts: AtomicUsize,
    }

    impl FakeStorage {
        fn add_file(&self, folder: &str, id: &str, name: &str) {
            let mut tree = self.tree.lock().unwrap();
            tree.files.entry(folder.to_string()).or_default().push(FileEntry {
                id: id.to_string(),
                name: name.to_string(),
            });
        }

        fn files_in(&self, folder: &str) -> Vec<String> {
            let tree = self.tree.lock().unwrap();
            tree.files
                .get(folder)
                .map(|files| files.iter().map(|f| f.name.clone()).collect())
                .unwrap_or_default()
        }

        fn folder_id(&self, parent: &str, name: &str) -> Option<String> {
            let tree = self.tree.lock().unwrap();
            tree.folders.get(parent).and_then(|c| c.get(name)).cloned()
        }

        fn notes_in(&self, folder: &str) -> Vec<String> {
            let tree = self.tree.lock().unwrap();
            tree.notes.get(folder).cloned().unwrap_or_default()
        }

        fn script_move_failure(&self, error: StorageError) {
            self.move_failures.lock().unwrap().push_back(error);
        }
    }

    #[async_trait]
    impl StorageBackend for FakeStorage {
        async fn list_children(
            &self,
            folder: &FolderHandle,
        ) -> Result<Vec<Document>, StorageError> {
            Ok(self
                .tree
                .lock()
                .unwrap()
                .files
                .get(&folder.id)
                .map(|files| {
                    files
                        .iter()
                        .map(|f| Document {
                            id: f.id.clone(),
                            display_name: f.name.clone(),
                            content_ref: f.id.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn get_content(&self, content_ref: &str) -> Result<Vec<u8>, StorageError> {
            Ok(format!("content of {content_ref}").into_bytes())
        }

        async fn find_or_create_folder(
            &self,
            parent: &FolderHandle,
            name: &str,
        ) -> Result<FolderHandle, StorageError> {
            let mut tree = self.tree.lock().unwrap();
            if let Some(id) = tree.folders.get(&parent.id).and_then(|c| c.get(name)) {
                return Ok(FolderHandle::new(id.clone()));
            }
            tree.next_folder += 1;
            let id = format!("folder-{}", tree.next_folder);
            tree.folders
                .entry(parent.id.clone())
                .or_default()
                .insert(name.to_string(), id.clone());
            Ok(FolderHandle::new(id))
        }

        async fn move_and_rename(
            &self,
            document_id: &str,
            dest: &FolderHandle,
            new_name: &str,
        ) -> Result<(), StorageError> {
            self.move_attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.move_failures.lock().unwrap().pop_front() {
                return Err(error);
            }
            let mut tree = self.tree.lock().unwrap();
            let mut moved = None;
            for files in tree.files.values_mut() {
                if let Some(pos) = files.iter().position(|f| f.id == document_id) {
                    moved = Some(files.remove(pos));
                    break;
                }
            }
            let mut entry = moved.ok_or_else(|| StorageError::NotFound {
                id: document_id.to_string(),
            })?;
            entry.name = new_name.to_string();
            tree.files.entry(dest.id.clone()).or_default().push(entry);
            Ok(())
        }

        async fn create_note(
            &self,
            folder: &FolderHandle,
            name: &str,
            _content: &str,
        ) -> Result<(), StorageError> {
            let mut tree = self.tree.lock().unwrap();
            tree.notes
                .entry(folder.id.clone())
                .or_default()
                .push(name.to_string());
            Ok(())
        }
    }

    enum Script {
        Classify(RawClassification),
        Fail,
    }

    /// Oracle whose answer depends on the file name.
    #[derive(Default)]
    struct ScriptedOracle {
        scripts: HashMap<String, Script>,
    }

    impl ScriptedOracle {
        fn on(mut self, file_name: &str, script: Script) -> Self {
            self.scripts.insert(file_name.to_string(), script);
            self
        }
    }

    #[async_trait]
    impl ClassificationOracle for ScriptedOracle {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn classify(
            &self,
            file_name: &str,
            _content: &[u8],
        ) -> Result<RawClassification, ClassificationError> {
            match self.scripts.get(file_name) {
                Some(Script::Classify(raw)) => Ok(raw.clone()),
                Some(Script::Fail) | None => Err(ClassificationError::RequestFailed {
                    oracle: "scripted".into(),
                    reason: "oracle unreachable".into(),
                }),
            }
        }
    }

    fn commercial_raw(date: &str, issuer: &str) -> RawClassification {
        RawClassification {
            doc_type: "commercial".into(),
            issue_date: Some(date.into()),
            parties: vec![RawParty {
                name: issuer.into(),
                role: "issuer".into(),
                fiscal_id: Some("999".into()),
            }],
            confidence: 0.93,
            document_number: None,
            notes: None,
        }
    }

    fn low_confidence_raw() -> RawClassification {
        RawClassification {
            doc_type: "commercial".into(),
            confidence: 0.1,
            ..Default::default()
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            max_concurrency: 4,
            call_timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            },
            ..Default::default()
        }
    }

    fn pipeline(storage: Arc<FakeStorage>, oracle: ScriptedOracle) -> ArchivePipeline {
        let engine = RoutingEngine::new(
            0.6,
            CompanyContext {
                fiscal_id: "500100200".into(),
                name: "Zafir Trading".into(),
                tie_break: CounterpartyTieBreak::PreferIssuer,
            },
        );
        ArchivePipeline::new(
            storage as Arc<dyn StorageBackend>,
            Arc::new(oracle),
            engine,
            FolderHandle::new("root"),
            test_config(),
        )
    }

    fn drop_folder() -> FolderHandle {
        FolderHandle::new("drop")
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn archives_a_routable_document() {
        let storage = Arc::new(FakeStorage::default());
        storage.add_file("drop", "d1", "invoice.pdf");
        let oracle = ScriptedOracle::default()
            .on("invoice.pdf", Script::Classify(commercial_raw("2024-03-01", "Acme, Lda")));

        let outcomes = pipeline(Arc::clone(&storage), oracle)
            .run(&drop_folder())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_success());

        // Moved out of the Drop folder into root/2024/03 with the template name.
        assert!(storage.files_in("drop").is_empty());
        let year = storage.folder_id("root", "2024").unwrap();
        let month = storage.folder_id(&year, "03").unwrap();
        assert_eq!(storage.files_in(&month), vec!["2024-03-01-COM-acme.pdf"]);
    }

    #[tokio::test]
    async fn batch_isolation_one_failure_does_not_abort() {
        let storage = Arc::new(FakeStorage::default());
        storage.add_file("drop", "d1", "one.pdf");
        storage.add_file("drop", "d2", "two.pdf");
        storage.add_file("drop", "d3", "three.pdf");
        let oracle = ScriptedOracle::default()
            .on("one.pdf", Script::Classify(commercial_raw("2024-03-01", "Acme")))
            .on("two.pdf", Script::Fail)
            .on("three.pdf", Script::Classify(commercial_raw("2024-04-02", "Globex")));

        let outcomes = pipeline(Arc::clone(&storage), oracle)
            .run(&drop_folder())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 2);

        let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].document_id, "d2");
        assert!(matches!(
            failed[0].result,
            OutcomeResult::Failed {
                reason: FailureReason::Classification { .. }
            }
        ));
        assert!(failed[0].decision.is_none());

        // The failed document is left in place for a later re-scan.
        assert_eq!(storage.files_in("drop"), vec!["two.pdf"]);
    }

    #[tokio::test]
    async fn quarantine_moves_to_invalid_bucket_with_note() {
        let storage = Arc::new(FakeStorage::default());
        storage.add_file("drop", "d1", "mystery.pdf");
        let oracle =
            ScriptedOracle::default().on("mystery.pdf", Script::Classify(low_confidence_raw()));

        let outcomes = pipeline(Arc::clone(&storage), oracle)
            .run(&drop_folder())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_success());
        let decision = outcomes[0].decision.as_ref().unwrap();
        assert_eq!(decision.action, DecisionAction::Quarantine);

        let bucket = storage.folder_id("root", "Invalid").unwrap();
        assert_eq!(storage.files_in(&bucket), vec!["mystery.pdf"]);
        assert_eq!(storage.notes_in(&bucket), vec!["mystery_results.txt"]);
    }

    #[tokio::test]
    async fn missing_date_rejects_to_irrelevant_bucket() {
        let storage = Arc::new(FakeStorage::default());
        storage.add_file("drop", "d1", "undated.pdf");
        let raw = RawClassification {
            doc_type: "commercial".into(),
            issue_date: None,
            confidence: 0.9,
            ..Default::default()
        };
        let oracle = ScriptedOracle::default().on("undated.pdf", Script::Classify(raw));

        let outcomes = pipeline(Arc::clone(&storage), oracle)
            .run(&drop_folder())
            .await
            .unwrap();

        assert!(outcomes[0].is_success());
        let bucket = storage.folder_id("root", "Irrelevant").unwrap();
        assert_eq!(storage.files_in(&bucket), vec!["undated.pdf"]);
        // Rejects carry no results note.
        assert!(storage.notes_in(&bucket).is_empty());
    }

    #[tokio::test]
    async fn transient_move_failure_is_retried_to_success() {
        let storage = Arc::new(FakeStorage::default());
        storage.add_file("drop", "d1", "invoice.pdf");
        storage.script_move_failure(StorageError::Unavailable { status: 503 });
        storage.script_move_failure(StorageError::RateLimited { retry_after: None });
        let oracle = ScriptedOracle::default()
            .on("invoice.pdf", Script::Classify(commercial_raw("2024-03-01", "Acme")));

        let outcomes = pipeline(Arc::clone(&storage), oracle)
            .run(&drop_folder())
            .await
            .unwrap();

        assert!(outcomes[0].is_success());
        assert_eq!(storage.move_attempts.load(Ordering::SeqCst), 3);
        assert!(storage.files_in("drop").is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_document() {
        let storage = Arc::new(FakeStorage::default());
        storage.add_file("drop", "d1", "invoice.pdf");
        for _ in 0..3 {
            storage.script_move_failure(StorageError::Unavailable { status: 503 });
        }
        let oracle = ScriptedOracle::default()
            .on("invoice.pdf", Script::Classify(commercial_raw("2024-03-01", "Acme")));

        let outcomes = pipeline(Arc::clone(&storage), oracle)
            .run(&drop_folder())
            .await
            .unwrap();

        assert!(!outcomes[0].is_success());
        assert!(matches!(
            outcomes[0].result,
            OutcomeResult::Failed {
                reason: FailureReason::Storage { .. }
            }
        ));
        // Decision was made before apply failed, so it is recorded.
        assert!(outcomes[0].decision.is_some());
        assert_eq!(storage.move_attempts.load(Ordering::SeqCst), 3);
        assert_eq!(storage.files_in("drop"), vec!["invoice.pdf"]);
    }

    #[tokio::test]
    async fn permanent_storage_failure_is_not_retried() {
        let storage = Arc::new(FakeStorage::default());
        storage.add_file("drop", "d1", "invoice.pdf");
        storage.script_move_failure(StorageError::PermissionDenied {
            detail: "read-only scope".into(),
        });
        let oracle = ScriptedOracle::default()
            .on("invoice.pdf", Script::Classify(commercial_raw("2024-03-01", "Acme")));

        let outcomes = pipeline(Arc::clone(&storage), oracle)
            .run(&drop_folder())
            .await
            .unwrap();

        assert!(!outcomes[0].is_success());
        assert_eq!(storage.move_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn filename_collision_in_destination_is_suffixed() {
        let storage = Arc::new(FakeStorage::default());
        storage.add_file("drop", "d1", "invoice-a.pdf");
        storage.add_file("drop", "d2", "invoice-b.pdf");
        let oracle = ScriptedOracle::default()
            .on("invoice-a.pdf", Script::Classify(commercial_raw("2024-03-01", "Acme")))
            .on("invoice-b.pdf", Script::Classify(commercial_raw("2024-03-01", "Acme")));

        let outcomes = pipeline(Arc::clone(&storage), oracle)
            .run(&drop_folder())
            .await
            .unwrap();

        assert!(outcomes.iter().all(|o| o.is_success()));
        let year = storage.folder_id("root", "2024").unwrap();
        let month = storage.folder_id(&year, "03").unwrap();
        let mut names = storage.files_in(&month);
        names.sort();
        assert_eq!(
            names,
            vec!["2024-03-01-COM-acme-1.pdf", "2024-03-01-COM-acme.pdf"]
        );
    }

    #[tokio::test]
    async fn cancellation_prevents_new_documents() {
        let storage = Arc::new(FakeStorage::default());
        storage.add_file("drop", "d1", "invoice.pdf");
        let oracle = ScriptedOracle::default()
            .on("invoice.pdf", Script::Classify(commercial_raw("2024-03-01", "Acme")));

        let pipeline = pipeline(Arc::clone(&storage), oracle);
        pipeline.cancel_token().cancel();

        let outcomes = pipeline.run(&drop_folder()).await.unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(storage.files_in("drop"), vec!["invoice.pdf"]);
    }

    #[tokio::test]
    async fn empty_drop_folder_is_a_clean_run() {
        let storage = Arc::new(FakeStorage::default());
        let oracle = ScriptedOracle::default();
        let outcomes = pipeline(storage, oracle).run(&drop_folder()).await.unwrap();
        assert!(outcomes.is_empty());
    }
}
