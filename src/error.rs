//! Error types for the document archiver.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Classification error: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration-related errors. Fatal at startup — nothing is processed
/// when one of these is raised.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Oracle call failures. These are document-level and terminal for the
/// document: a low-confidence or unrecognized classification is NOT an
/// error — it is a valid result that routes to a special bucket.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("Oracle {oracle} request failed: {reason}")]
    RequestFailed { oracle: String, reason: String },

    #[error("Invalid response from oracle {oracle}: {reason}")]
    InvalidResponse { oracle: String, reason: String },

    #[error("Oracle call timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Storage backend errors. `is_transient` decides whether the pipeline
/// retries the call with backoff or fails the document immediately.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Storage call timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Storage backend unavailable (status {status})")]
    Unavailable { status: u16 },

    #[error("Storage request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Permission denied: {detail}")]
    PermissionDenied { detail: String },

    #[error("Invalid handle: {id}")]
    InvalidHandle { id: String },

    #[error("Not found: {id}")]
    NotFound { id: String },
}

impl StorageError {
    /// Rate limits, timeouts, 5xx-class outages, and plain network failures
    /// are worth retrying; permission and handle errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::Unavailable { .. }
                | Self::RequestFailed { .. }
        )
    }
}

/// Result type alias for the archiver.
pub type Result<T> = std::result::Result<T, Error>;
