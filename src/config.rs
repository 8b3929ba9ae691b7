//! Run configuration, loaded from the environment at startup.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Default minimum confidence for a classification to be routable.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Default number of documents processed concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default timeout for a single oracle or storage call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default Gemini model for classification.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// How to pick the counterparty when both or neither document party matches
/// the configured company identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterpartyTieBreak {
    PreferIssuer,
    PreferRecipient,
}

/// The "self" company the archive belongs to. Used to tell incoming from
/// outgoing commercial documents: the counterparty is whichever party on the
/// document is NOT this company.
#[derive(Debug, Clone)]
pub struct CompanyContext {
    /// Fiscal identifier (NIF) of the company.
    pub fiscal_id: String,
    /// Registered company name.
    pub name: String,
    /// Tie-break when party matching is ambiguous.
    pub tie_break: CounterpartyTieBreak,
}

/// Archiver configuration.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Folder id of the archive root in the backing store.
    pub archive_root_id: String,
    /// Name of the inbound holding folder under the archive root.
    pub drop_folder_name: String,
    /// Bucket folder for quarantined (non-routable) documents.
    pub invalid_folder_name: String,
    /// Bucket folder for rejected (missing-metadata) documents.
    pub irrelevant_folder_name: String,
    /// Classifications below this confidence are quarantined.
    pub confidence_threshold: f32,
    /// Company identity for counterparty selection.
    pub company: CompanyContext,
    /// Bounded worker pool size for one run.
    pub max_concurrency: usize,
    /// Timeout applied to each oracle/storage call.
    pub call_timeout: Duration,
    /// Backoff policy for transient storage failures.
    pub retry: RetryPolicy,
    /// OAuth bearer token for the storage backend.
    pub drive_token: SecretString,
    /// API key for the classification oracle.
    pub gemini_api_key: SecretString,
    /// Oracle model name.
    pub gemini_model: String,
}

impl ArchiveConfig {
    /// Load configuration from environment variables.
    ///
    /// Required: `DRIVE_ACCESS_TOKEN`, `ARCHIVE_ROOT_FOLDER_ID`,
    /// `GEMINI_API_KEY`, `COMPANY_FISCAL_ID`, `COMPANY_NAME`.
    /// Everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let drive_token = required("DRIVE_ACCESS_TOKEN")?;
        let archive_root_id = required("ARCHIVE_ROOT_FOLDER_ID")?;
        let gemini_api_key = required("GEMINI_API_KEY")?;
        let fiscal_id = required("COMPANY_FISCAL_ID")?;
        let company_name = required("COMPANY_NAME")?;

        let confidence_threshold = optional_parsed(
            "ARCHIVE_CONFIDENCE_THRESHOLD",
            DEFAULT_CONFIDENCE_THRESHOLD,
        )?;
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "ARCHIVE_CONFIDENCE_THRESHOLD".into(),
                message: format!("{confidence_threshold} is not in [0, 1]"),
            });
        }

        let max_concurrency: usize =
            optional_parsed("ARCHIVE_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?;
        let call_timeout_secs: u64 = optional_parsed(
            "ARCHIVE_CALL_TIMEOUT_SECS",
            DEFAULT_CALL_TIMEOUT.as_secs(),
        )?;

        let tie_break = match std::env::var("ARCHIVE_TIE_BREAK").as_deref() {
            Ok("recipient") => CounterpartyTieBreak::PreferRecipient,
            Ok("issuer") | Err(_) => CounterpartyTieBreak::PreferIssuer,
            Ok(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "ARCHIVE_TIE_BREAK".into(),
                    message: format!("'{other}' is neither 'issuer' nor 'recipient'"),
                });
            }
        };

        Ok(Self {
            archive_root_id,
            drop_folder_name: optional("ARCHIVE_DROP_FOLDER", "Drop"),
            invalid_folder_name: optional("ARCHIVE_INVALID_FOLDER", "Invalid"),
            irrelevant_folder_name: optional("ARCHIVE_IRRELEVANT_FOLDER", "Irrelevant"),
            confidence_threshold,
            company: CompanyContext {
                fiscal_id,
                name: company_name,
                tie_break,
            },
            max_concurrency: max_concurrency.max(1),
            call_timeout: Duration::from_secs(call_timeout_secs),
            retry: RetryPolicy::default(),
            drive_token: SecretString::from(drive_token),
            gemini_api_key: SecretString::from(gemini_api_key),
            gemini_model: optional("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_var_is_reported_by_name() {
        let err = required("DOC_ARCHIVER_TEST_UNSET_VAR").unwrap_err();
        match err {
            ConfigError::MissingEnvVar(key) => {
                assert_eq!(key, "DOC_ARCHIVER_TEST_UNSET_VAR");
            }
            other => panic!("Expected MissingEnvVar, got {other:?}"),
        }
    }

    #[test]
    fn optional_parsed_falls_back_to_default() {
        let value: usize = optional_parsed("DOC_ARCHIVER_TEST_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }
}
