//! Document routing & archival pipeline.
//!
//! Flow per document:
//! 1. Adapter — normalize the oracle's classification
//! 2. Routing engine — pure decision (destination, filename, action)
//! 3. Folder cache + name allocator — resolve destination, reserve name
//! 4. Storage — move and rename into place

pub mod adapter;
pub mod folder_cache;
pub mod names;
pub mod processor;
pub mod routing;
pub mod types;

pub use adapter::ClassificationAdapter;
pub use folder_cache::FolderPathCache;
pub use names::NameAllocator;
pub use processor::{ArchivePipeline, CancelToken, PipelineConfig};
pub use routing::RoutingEngine;
