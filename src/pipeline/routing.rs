//! Routing decision engine — pure `Classification → Decision`.
//!
//! Priority-ordered rules, first match wins:
//! 1. Low confidence or unknown type → Invalid bucket, quarantine
//! 2. Missing issue date → Irrelevant bucket, reject
//! 3. Otherwise → `<root>/<year>/<month>`, archive
//!
//! Filename uniqueness is NOT handled here — the engine emits the base
//! name and `names::NameAllocator` does the decide-and-reserve step.

use chrono::Datelike;
use regex::Regex;
use tracing::debug;

use crate::config::{CompanyContext, CounterpartyTieBreak};
use crate::pipeline::types::{
    Classification, Decision, DecisionAction, Destination, DocType, Document, FolderPath, Party,
    PartyRole, SpecialBucket,
};

/// Token used when no counterparty can be determined.
const FALLBACK_TOKEN: &str = "unknown";

/// Deterministic routing rules. No I/O, no interior state.
pub struct RoutingEngine {
    threshold: f32,
    company: CompanyContext,
    /// Trailing legal-form suffixes stripped from counterparty names.
    legal_suffix: Regex,
}

impl RoutingEngine {
    pub fn new(threshold: f32, company: CompanyContext) -> Self {
        Self {
            threshold,
            company,
            legal_suffix: Regex::new(r"(?i)[,\s]+(lda|limitada|s\.?a\.?|unipessoal(\s+lda)?)\.?\s*$")
                .expect("legal suffix pattern is valid"),
        }
    }

    /// Decide destination, base filename, and action for one classification.
    pub fn decide(&self, document: &Document, classification: &Classification) -> Decision {
        // Rule 1: non-routable — quarantine.
        if classification.confidence < self.threshold
            || classification.doc_type == DocType::Unknown
        {
            debug!(
                id = %document.id,
                confidence = classification.confidence,
                doc_type = ?classification.doc_type,
                "Non-routable classification, quarantining"
            );
            return Decision {
                destination: Destination::Bucket {
                    bucket: SpecialBucket::Invalid,
                },
                filename: document.display_name.clone(),
                action: DecisionAction::Quarantine,
            };
        }

        // Rule 2: every routable type files by date.
        let Some(date) = classification.issue_date else {
            debug!(id = %document.id, "Missing issue date, rejecting");
            return Decision {
                destination: Destination::Bucket {
                    bucket: SpecialBucket::Irrelevant,
                },
                filename: document.display_name.clone(),
                action: DecisionAction::Reject,
            };
        };

        // Rule 3: dated archive.
        let path = FolderPath::new([format!("{:04}", date.year()), format!("{:02}", date.month())]);
        let token = self.counterparty_token(classification);
        let extension = document.extension().unwrap_or_else(|| "pdf".to_string());
        let filename = format!(
            "{}-{}-{}.{}",
            date.format("%Y-%m-%d"),
            classification.doc_type.code(),
            token,
            extension
        );

        Decision {
            destination: Destination::Dated { path },
            filename,
            action: DecisionAction::Archive,
        }
    }

    /// Pick the counterparty: whichever party is not the configured company,
    /// with the configured tie-break when both or neither match.
    fn counterparty_token(&self, classification: &Classification) -> String {
        let issuer = classification
            .parties
            .iter()
            .find(|p| p.role == PartyRole::Issuer);
        let recipient = classification
            .parties
            .iter()
            .find(|p| p.role == PartyRole::Recipient);

        let picked: Option<&str> = match (issuer, recipient) {
            (Some(i), Some(r)) => match (self.is_company(i), self.is_company(r)) {
                (true, false) => Some(&r.name),
                (false, true) => Some(&i.name),
                _ => match self.company.tie_break {
                    CounterpartyTieBreak::PreferIssuer => Some(&i.name),
                    CounterpartyTieBreak::PreferRecipient => Some(&r.name),
                },
            },
            (Some(i), None) if !self.is_company(i) => Some(&i.name),
            (None, Some(r)) if !self.is_company(r) => Some(&r.name),
            _ => classification
                .parties
                .iter()
                .find(|p| !self.is_company(p))
                .map(|p| p.name.as_str()),
        };

        let name = picked
            .or(classification.counterparty_name.as_deref())
            .unwrap_or(FALLBACK_TOKEN);
        self.sanitize_token(name)
    }

    fn is_company(&self, party: &Party) -> bool {
        if let Some(fiscal_id) = &party.fiscal_id
            && fiscal_id.trim() == self.company.fiscal_id.trim()
        {
            return true;
        }
        party
            .name
            .trim()
            .eq_ignore_ascii_case(self.company.name.trim())
    }

    /// Reduce a company name to a filename-safe token: drop the activity /
    /// legal-form tail ("Ubiquus - Representacoes, Lda" → "ubiquus"),
    /// lowercase, collapse everything else to dashes.
    fn sanitize_token(&self, name: &str) -> String {
        let base = name.split(" - ").next().unwrap_or(name);
        let base = self.legal_suffix.replace(base, "");

        let mut token = String::with_capacity(base.len());
        for ch in base.trim().chars() {
            if ch.is_ascii_alphanumeric() {
                token.push(ch.to_ascii_lowercase());
            } else if !token.is_empty() && !token.ends_with('-') {
                token.push('-');
            }
        }
        let token = token.trim_end_matches('-');
        if token.is_empty() {
            FALLBACK_TOKEN.to_string()
        } else {
            token.to_string()
        }
    }
}
