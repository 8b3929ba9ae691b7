//! Gemini-backed classification oracle.
//!
//! One `generateContent` call per document with the PDF bytes inlined.
//! The prompt pins the response to a JSON object; parsing tolerates
//! markdown-wrapped output anyway.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::error::ClassificationError;
use crate::oracle::{ClassificationOracle, RawClassification};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Kept low — classification should be repeatable.
const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// Classification oracle backed by the Gemini API.
pub struct GeminiOracle {
    api_key: SecretString,
    model: String,
    client: reqwest::Client,
}

impl GeminiOracle {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!("{GEMINI_API_BASE}/models/{}:generateContent", self.model)
    }

    fn request_failed(&self, reason: impl Into<String>) -> ClassificationError {
        ClassificationError::RequestFailed {
            oracle: self.model.clone(),
            reason: reason.into(),
        }
    }

    fn invalid_response(&self, reason: impl Into<String>) -> ClassificationError {
        ClassificationError::InvalidResponse {
            oracle: self.model.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl ClassificationOracle for GeminiOracle {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify(
        &self,
        file_name: &str,
        content: &[u8],
    ) -> Result<RawClassification, ClassificationError> {
        let body = json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": "application/pdf",
                            "data": BASE64.encode(content),
                        }
                    },
                    { "text": build_classification_prompt(file_name) },
                ]
            }],
            "generationConfig": {
                "temperature": CLASSIFY_TEMPERATURE,
                "response_mime_type": "application/json",
            },
        });

        let response = self
            .client
            .post(self.api_url())
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(self.request_failed(format!("status {status}: {detail}")));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.invalid_response(format!("body is not JSON: {e}")))?;

        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| self.invalid_response("no candidate text in response"))?;

        parse_classification(text).map_err(|reason| self.invalid_response(reason))
    }
}

// ── Prompt construction ─────────────────────────────────────────────

/// Build the classification prompt for one document.
fn build_classification_prompt(file_name: &str) -> String {
    format!(
        "You are a document classifier for a company archive. Analyze the attached \
         scanned document ({file_name}) and classify it.\n\n\
         Document types:\n\
         - \"commercial\": invoices, receipts, credit/debit notes\n\
         - \"customs\": customs declarations and liquidation notes\n\
         - \"tax\": tax assessments, fiscal statements\n\
         - \"banking\": bank statements, transfer confirmations\n\
         - \"freight\": waybills, bills of lading, shipping documents\n\
         - \"hr\": payroll sheets, employment documents\n\
         - \"unknown\": anything else, or when you cannot tell\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"doc_type\": \"...\", \"issue_date\": \"YYYY-MM-DD\", \
         \"parties\": [{{\"name\": \"...\", \"role\": \"issuer|recipient\", \"fiscal_id\": \"...\"}}], \
         \"confidence\": 0.0, \"document_number\": \"...\", \"notes\": \"...\"}}\n\n\
         Rules:\n\
         - issue_date is the document's emission date; omit the field if not visible\n\
         - List every company on the document with its role and fiscal id (NIF) when printed\n\
         - confidence is your certainty in doc_type AND the extracted fields, 0.0-1.0\n\
         - High confidence (>0.8) only when the type and date are unambiguous\n\
         - Omit fields you cannot read; never invent values"
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse the oracle's text answer into a `RawClassification`.
fn parse_classification(raw: &str) -> Result<RawClassification, String> {
    let json_str = extract_json_object(raw);
    serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))
}

/// Extract a JSON object from model output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
