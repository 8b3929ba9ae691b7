//! Google Drive storage backend.
//!
//! Thin REST glue over the Drive v3 API — no routing logic here. Folder
//! creation is query-then-create, which together with the pipeline's
//! per-path locking keeps get-or-create idempotent within a run.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::error::StorageError;
use crate::pipeline::types::Document;
use crate::storage::{FolderHandle, StorageBackend};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Boundary for multipart/related note uploads.
const UPLOAD_BOUNDARY: &str = "doc_archiver_note_boundary";

/// Drive-backed implementation of [`StorageBackend`].
pub struct DriveBackend {
    token: SecretString,
    client: reqwest::Client,
}

impl DriveBackend {
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            client: reqwest::Client::new(),
        }
    }

    fn bearer(&self) -> &str {
        self.token.expose_secret()
    }

    /// GET a Drive endpoint and decode the JSON payload.
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, StorageError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(request_error)?;
        decode_json(response).await
    }
}

#[async_trait::async_trait]
impl StorageBackend for DriveBackend {
    async fn list_children(&self, folder: &FolderHandle) -> Result<Vec<Document>, StorageError> {
        let query = format!(
            "'{}' in parents and mimeType != '{FOLDER_MIME}' and trashed = false",
            escape_query(&folder.id)
        );
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.as_str()),
                ("fields", "nextPageToken, files(id, name)"),
                ("spaces", "drive"),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }
            let payload = self
                .get_json(&format!("{DRIVE_API_BASE}/files"), &params)
                .await?;

            for file in payload["files"].as_array().into_iter().flatten() {
                let (Some(id), Some(name)) = (file["id"].as_str(), file["name"].as_str()) else {
                    continue;
                };
                documents.push(Document {
                    id: id.to_string(),
                    display_name: name.to_string(),
                    content_ref: id.to_string(),
                });
            }

            page_token = payload["nextPageToken"].as_str().map(String::from);
            if page_token.is_none() {
                break;
            }
        }

        Ok(documents)
    }

    async fn get_content(&self, content_ref: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(format!("{DRIVE_API_BASE}/files/{content_ref}"))
            .query(&[("alt", "media")])
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), detail));
        }
        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }

    async fn find_or_create_folder(
        &self,
        parent: &FolderHandle,
        name: &str,
    ) -> Result<FolderHandle, StorageError> {
        let query = format!(
            "name = '{}' and '{}' in parents and mimeType = '{FOLDER_MIME}' and trashed = false",
            escape_query(name),
            escape_query(&parent.id)
        );
        let payload = self
            .get_json(
                &format!("{DRIVE_API_BASE}/files"),
                &[("q", query.as_str()), ("fields", "files(id)")],
            )
            .await?;

        if let Some(id) = payload["files"][0]["id"].as_str() {
            return Ok(FolderHandle::new(id));
        }

        let body = json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent.id],
        });
        let response = self
            .client
            .post(format!("{DRIVE_API_BASE}/files"))
            .query(&[("fields", "id")])
            .bearer_auth(self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let created = decode_json(response).await?;

        created["id"]
            .as_str()
            .map(FolderHandle::new)
            .ok_or_else(|| StorageError::RequestFailed {
                reason: "folder create response carried no id".to_string(),
            })
    }

    async fn move_and_rename(
        &self,
        document_id: &str,
        dest: &FolderHandle,
        new_name: &str,
    ) -> Result<(), StorageError> {
        // Current parents are needed for removeParents.
        let meta = self
            .get_json(
                &format!("{DRIVE_API_BASE}/files/{document_id}"),
                &[("fields", "parents")],
            )
            .await?;
        let previous_parents: Vec<&str> = meta["parents"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|p| p.as_str())
            .collect();
        let remove = previous_parents.join(",");

        let response = self
            .client
            .patch(format!("{DRIVE_API_BASE}/files/{document_id}"))
            .query(&[
                ("addParents", dest.id.as_str()),
                ("removeParents", remove.as_str()),
                ("fields", "id, parents"),
            ])
            .bearer_auth(self.bearer())
            .json(&json!({ "name": new_name }))
            .send()
            .await
            .map_err(request_error)?;
        decode_json(response).await.map(|_| ())
    }

    async fn create_note(
        &self,
        folder: &FolderHandle,
        name: &str,
        content: &str,
    ) -> Result<(), StorageError> {
        let metadata = json!({
            "name": name,
            "parents": [folder.id],
            "mimeType": "text/plain",
        });
        let body = multipart_related_body(&metadata, content);

        let response = self
            .client
            .post(format!("{DRIVE_UPLOAD_BASE}/files"))
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .bearer_auth(self.bearer())
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={UPLOAD_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await
            .map_err(request_error)?;
        decode_json(response).await.map(|_| ())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Escape a value for embedding in a Drive `q` query string.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Drive multipart upload: a JSON metadata part followed by the media part.
fn multipart_related_body(metadata: &serde_json::Value, content: &str) -> String {
    format!(
        "--{UPLOAD_BOUNDARY}\r\n\
         Content-Type: application/json; charset=UTF-8\r\n\r\n\
         {metadata}\r\n\
         --{UPLOAD_BOUNDARY}\r\n\
         Content-Type: text/plain; charset=UTF-8\r\n\r\n\
         {content}\r\n\
         --{UPLOAD_BOUNDARY}--"
    )
}

fn request_error(e: reqwest::Error) -> StorageError {
    StorageError::RequestFailed {
        reason: e.to_string(),
    }
}

/// Map a Drive HTTP status onto the storage error taxonomy.
fn error_for_status(status: u16, detail: String) -> StorageError {
    match status {
        401 | 403 => StorageError::PermissionDenied { detail },
        404 => StorageError::NotFound { id: detail },
        429 => StorageError::RateLimited { retry_after: None },
        s if s >= 500 => StorageError::Unavailable { status: s },
        _ => StorageError::RequestFailed {
            reason: format!("status {status}: {detail}"),
        },
    }
}

async fn decode_json(response: reqwest::Response) -> Result<serde_json::Value, StorageError> {
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(error_for_status(status.as_u16(), detail));
    }
    response.json().await.map_err(request_error)
}
