//! Classification adapter — normalizes raw oracle output.
//!
//! One oracle call per document, no retry here (retry policy belongs to the
//! pipeline). Validation fails closed: unrecognized types become `Unknown`,
//! unparseable dates become absent, out-of-range confidence becomes zero.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::ClassificationError;
use crate::oracle::{ClassificationOracle, RawClassification};
use crate::pipeline::types::{Classification, DocType, Document, Party, PartyRole};

/// Date formats the oracle is allowed to use. The prompt demands the first;
/// the rest cover common drift.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y"];

/// Normalizes the external classifier's output into a [`Classification`].
pub struct ClassificationAdapter {
    oracle: Arc<dyn ClassificationOracle>,
}

impl ClassificationAdapter {
    pub fn new(oracle: Arc<dyn ClassificationOracle>) -> Self {
        Self { oracle }
    }

    /// Classify one document. Errors only when the oracle call itself fails;
    /// a low-confidence or `Unknown` result is a valid classification.
    pub async fn classify(
        &self,
        document: &Document,
        content: &[u8],
    ) -> Result<Classification, ClassificationError> {
        let raw = self
            .oracle
            .classify(&document.display_name, content)
            .await?;
        let classification = normalize(&document.display_name, raw);
        debug!(
            id = %document.id,
            doc_type = ?classification.doc_type,
            confidence = classification.confidence,
            "Document classified"
        );
        Ok(classification)
    }
}

/// Validate and convert a raw oracle payload.
fn normalize(display_name: &str, raw: RawClassification) -> Classification {
    let doc_type = DocType::from_label(&raw.doc_type);
    if doc_type == DocType::Unknown && !raw.doc_type.trim().is_empty() {
        warn!(
            document = display_name,
            label = %raw.doc_type,
            "Unrecognized document type label, treating as unknown"
        );
    }

    let issue_date = raw.issue_date.as_deref().and_then(|s| parse_date(s));
    if issue_date.is_none() && raw.issue_date.is_some() {
        warn!(
            document = display_name,
            raw_date = raw.issue_date.as_deref().unwrap_or(""),
            "Unparseable issue date, treating as absent"
        );
    }

    let confidence = if (0.0..=1.0).contains(&raw.confidence) && raw.confidence.is_finite() {
        raw.confidence
    } else {
        0.0
    };

    let parties: Vec<Party> = raw
        .parties
        .iter()
        .filter(|p| !p.name.trim().is_empty())
        .map(|p| Party {
            name: p.name.trim().to_string(),
            role: parse_role(&p.role),
            fiscal_id: p.fiscal_id.clone().filter(|id| !id.trim().is_empty()),
        })
        .collect();

    // The classifier's own suggestion; the routing engine refines it
    // against the company context.
    let counterparty_name = parties
        .iter()
        .find(|p| p.role == PartyRole::Issuer)
        .or_else(|| parties.first())
        .map(|p| p.name.clone());

    let raw_value = serde_json::to_value(&raw).unwrap_or_default();

    Classification {
        doc_type,
        issue_date,
        parties,
        counterparty_name,
        confidence,
        raw: raw_value,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

fn parse_role(role: &str) -> PartyRole {
    match role.trim().to_ascii_lowercase().as_str() {
        "issuer" | "emitente" | "vendor" | "supplier" => PartyRole::Issuer,
        "recipient" | "client" | "cliente" | "customer" => PartyRole::Recipient,
        _ => PartyRole::Other,
    }
}
