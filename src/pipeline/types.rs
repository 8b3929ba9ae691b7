//! Shared types for the archival pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ── Document ────────────────────────────────────────────────────────

/// One source file discovered in the Drop folder.
///
/// Created by the listing scan, immutable, and discarded once the pipeline
/// reaches a terminal state for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Backend-native identifier.
    pub id: String,
    /// Filename as shown in the store.
    pub display_name: String,
    /// Reference used to fetch the content bytes.
    pub content_ref: String,
}

impl Document {
    /// File extension (lowercased), if the display name carries one.
    pub fn extension(&self) -> Option<String> {
        self.display_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Closed set of document types the router knows how to file.
///
/// Unrecognized oracle output maps to `Unknown`, never to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Commercial,
    Customs,
    Tax,
    Banking,
    Freight,
    Hr,
    Unknown,
}

impl DocType {
    /// Short filing code used in canonical filenames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Commercial => "COM",
            Self::Customs => "CUS",
            Self::Tax => "TAX",
            Self::Banking => "BNK",
            Self::Freight => "FRT",
            Self::Hr => "HR",
            Self::Unknown => "UNK",
        }
    }

    /// Map an oracle label onto the closed enum.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "commercial" | "comercial" | "documentos_comerciais" => Self::Commercial,
            "customs" | "aduaneiro" | "documentos_aduaneiros" => Self::Customs,
            "tax" | "fiscal" | "documentos_fiscais" => Self::Tax,
            "banking" | "bancario" | "documentos_bancarios" => Self::Banking,
            "freight" | "frete" | "documentos_frete" => Self::Freight,
            "hr" | "rh" | "documentos_rh" => Self::Hr,
            _ => Self::Unknown,
        }
    }
}

/// Role a party plays on the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Issuer,
    Recipient,
    Other,
}

/// A company or person named on the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub role: PartyRole,
    pub fiscal_id: Option<String>,
}

/// Normalized classification of one document.
///
/// Produced once per document by the adapter. `Unknown` type or low
/// confidence marks the document as non-routable, not as failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub doc_type: DocType,
    pub issue_date: Option<NaiveDate>,
    pub parties: Vec<Party>,
    /// Classifier's own counterparty suggestion; the routing engine may
    /// override it using the company context.
    pub counterparty_name: Option<String>,
    /// In [0, 1]; out-of-range oracle values are coerced to 0.
    pub confidence: f32,
    /// Complete oracle payload, kept for audit notes.
    pub raw: serde_json::Value,
}

// ── Decision ────────────────────────────────────────────────────────

/// Ordered folder-name segments relative to the archive root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderPath(pub Vec<String>);

impl FolderPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for FolderPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

/// Non-dated destinations for documents that cannot be archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialBucket {
    /// Unclassifiable or low-confidence documents.
    Invalid,
    /// Documents missing metadata required for dated filing.
    Irrelevant,
}

/// Where a document goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Dated { path: FolderPath },
    Bucket { bucket: SpecialBucket },
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dated { path } => write!(f, "{path}"),
            Self::Bucket { bucket } => match bucket {
                SpecialBucket::Invalid => write!(f, "[Invalid]"),
                SpecialBucket::Irrelevant => write!(f, "[Irrelevant]"),
            },
        }
    }
}

/// What to do with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// File into the dated hierarchy.
    Archive,
    /// Park in the Irrelevant bucket for manual review.
    Reject,
    /// Park in the Invalid bucket with a results note.
    Quarantine,
}

impl DecisionAction {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Reject => "reject",
            Self::Quarantine => "quarantine",
        }
    }
}

/// The engine's output for one classification. Never mutated after creation;
/// the filename here is the collision-free *base* name — the allocator may
/// still append a numeric suffix at apply time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub destination: Destination,
    pub filename: String,
    pub action: DecisionAction,
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Why a document failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    Classification { detail: String },
    Storage { detail: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classification { detail } => write!(f, "classification: {detail}"),
            Self::Storage { detail } => write!(f, "storage: {detail}"),
        }
    }
}

/// Terminal result for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeResult {
    Succeeded,
    Failed { reason: FailureReason },
}

/// Append-only audit record, one per processed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub document_id: String,
    /// Absent when the document failed before a decision existed.
    pub decision: Option<Decision>,
    pub result: OutcomeResult,
    pub timestamp: DateTime<Utc>,
}

impl Outcome {
    pub fn succeeded(document_id: impl Into<String>, decision: Decision) -> Self {
        Self {
            document_id: document_id.into(),
            decision: Some(decision),
            result: OutcomeResult::Succeeded,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(
        document_id: impl Into<String>,
        decision: Option<Decision>,
        reason: FailureReason,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            decision,
            result: OutcomeResult::Failed { reason },
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, OutcomeResult::Succeeded)
    }
}
