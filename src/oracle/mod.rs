//! Classification oracle seam.
//!
//! The oracle reads document bytes and returns structured metadata. Call
//! failures surface as [`ClassificationError`]; an uncertain or unrecognized
//! classification is a *valid* result, reported through the fields of
//! [`RawClassification`] instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassificationError;

pub mod gemini;

pub use gemini::GeminiOracle;

/// A party as reported by the oracle, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawParty {
    #[serde(default)]
    pub name: String,
    /// "issuer" or "recipient"; anything else is kept but unranked.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub fiscal_id: Option<String>,
}

/// Structured oracle output, tolerant of missing fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawClassification {
    #[serde(default)]
    pub doc_type: String,
    /// `YYYY-MM-DD` when present.
    #[serde(default)]
    pub issue_date: Option<String>,
    #[serde(default)]
    pub parties: Vec<RawParty>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// External classifier the adapter calls once per document.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Oracle name for error messages and logs.
    fn name(&self) -> &str;

    /// Classify one document's content bytes.
    async fn classify(
        &self,
        file_name: &str,
        content: &[u8],
    ) -> Result<RawClassification, ClassificationError>;
}
