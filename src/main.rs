use std::sync::Arc;

use doc_archiver::config::ArchiveConfig;
use doc_archiver::oracle::{ClassificationOracle, GeminiOracle};
use doc_archiver::pipeline::{ArchivePipeline, PipelineConfig, RoutingEngine};
use doc_archiver::pipeline::types::OutcomeResult;
use doc_archiver::storage::{DriveBackend, FolderHandle, StorageBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Configuration errors are fatal before any document is touched.
    let config = ArchiveConfig::from_env()?;

    eprintln!("📄 doc-archiver v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.gemini_model);
    eprintln!("   Archive root: {}", config.archive_root_id);
    eprintln!("   Company: {} ({})", config.company.name, config.company.fiscal_id);
    eprintln!("   Confidence threshold: {}", config.confidence_threshold);
    eprintln!("   Concurrency: {}\n", config.max_concurrency);

    let storage: Arc<dyn StorageBackend> = Arc::new(DriveBackend::new(config.drive_token.clone()));
    let oracle: Arc<dyn ClassificationOracle> = Arc::new(GeminiOracle::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));

    // Bootstrap the Drop folder under the archive root; bucket folders are
    // created on first use by the pipeline's folder cache.
    let root = FolderHandle::new(config.archive_root_id.clone());
    let drop_folder = storage
        .find_or_create_folder(&root, &config.drop_folder_name)
        .await?;
    tracing::info!(folder = %drop_folder, "Drop folder ready");

    let engine = RoutingEngine::new(config.confidence_threshold, config.company.clone());
    let pipeline = ArchivePipeline::new(
        Arc::clone(&storage),
        oracle,
        engine,
        root,
        PipelineConfig::from(&config),
    );

    // Ctrl-C stops new documents; in-flight ones finish cleanly.
    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, finishing in-flight documents");
            cancel.cancel();
        }
    });

    let outcomes = pipeline.run(&drop_folder).await?;

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    eprintln!("\nProcessed {} document(s): {} ok, {} failed", outcomes.len(), succeeded, outcomes.len() - succeeded);
    for outcome in outcomes.iter().filter(|o| !o.is_success()) {
        if let OutcomeResult::Failed { reason } = &outcome.result {
            eprintln!("   ✗ {}: {}", outcome.document_id, reason);
        }
    }

    Ok(())
}
