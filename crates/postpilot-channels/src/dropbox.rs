//! Dropbox file store client (HTTP API v2).
//!
//! Three operations back the whole daemon: folder listing for image
//! selection, file download for config/store/image bytes, and file upload
//! for the store snapshot flush. A missing remote path must stay
//! distinguishable from other API failures, because the lifecycle layer
//! treats "no snapshot yet" as a first run rather than an error.

use postpilot_core::error::{PostPilotError, Result};
use serde::Deserialize;
use serde_json::json;

const API_BASE: &str = "https://api.dropboxapi.com/2";
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// A file entry returned by [`FileStoreClient::list_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Lowercased remote path.
    pub path: String,
    /// Dropbox content hash, stable across renames.
    pub content_hash: String,
}

/// Dropbox-backed remote file store.
pub struct FileStoreClient {
    client: reqwest::Client,
}

impl FileStoreClient {
    /// Build a client authenticated with the given access token.
    /// No network traffic happens until the first call.
    pub fn new(access_token: &str) -> Self {
        let client = reqwest::Client::builder()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                if let Ok(auth) = format!("Bearer {access_token}").parse() {
                    headers.insert("Authorization", auth);
                }
                headers
            })
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// List files (not folders) directly under `folder`.
    pub async fn list_files(&self, folder: &str) -> Result<Vec<RemoteFile>> {
        let folder = normalize_folder(folder);
        let response = self
            .client
            .post(format!("{API_BASE}/files/list_folder"))
            .json(&json!({ "path": folder }))
            .send()
            .await
            .map_err(|e| PostPilotError::Remote(format!("listing folder {folder}: {e}")))?;

        let body: ListFolderResponse = check(response, &folder)
            .await?
            .json()
            .await
            .map_err(|e| PostPilotError::Remote(format!("invalid list response: {e}")))?;

        Ok(body
            .entries
            .into_iter()
            .filter(|entry| entry.tag == "file")
            .map(|entry| RemoteFile {
                path: entry.path_lower,
                content_hash: entry.content_hash.unwrap_or_default(),
            })
            .collect())
    }

    /// Download a file's raw bytes.
    pub async fn download_file(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(format!("{CONTENT_BASE}/files/download"))
            .header("Dropbox-API-Arg", json!({ "path": path }).to_string())
            .send()
            .await
            .map_err(|e| PostPilotError::Remote(format!("downloading {path}: {e}")))?;

        let response = check(response, path).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PostPilotError::Remote(format!("downloading {path}: {e}")))?;
        Ok(bytes.to_vec())
    }

    /// Upload `contents` to `path`, replacing an existing file when
    /// `overwrite` is set.
    pub async fn upload_file(&self, path: &str, contents: Vec<u8>, overwrite: bool) -> Result<()> {
        let arg = json!({
            "path": path,
            "mode": if overwrite { "overwrite" } else { "add" },
            "mute": true,
        });

        let response = self
            .client
            .post(format!("{CONTENT_BASE}/files/upload"))
            .header("Dropbox-API-Arg", arg.to_string())
            .header("Content-Type", "application/octet-stream")
            .body(contents)
            .send()
            .await
            .map_err(|e| PostPilotError::Remote(format!("uploading {path}: {e}")))?;

        check(response, path).await?;
        tracing::debug!("uploaded {path}");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    #[serde(rename = ".tag")]
    tag: String,
    path_lower: String,
    content_hash: Option<String>,
}

/// Pass successful responses through; turn API errors into the unified
/// error type.
async fn check(response: reqwest::Response, path: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_api_error(status.as_u16(), &body, path))
}

/// Dropbox reports a missing path as HTTP 409 with a `not_found` summary.
fn classify_api_error(status: u16, body: &str, path: &str) -> PostPilotError {
    if status == 409 && body.contains("not_found") {
        PostPilotError::RemoteNotFound(path.to_string())
    } else {
        PostPilotError::Remote(format!("{path}: HTTP {status}: {body}"))
    }
}

/// The API wants folder paths rooted with a single leading slash.
fn normalize_folder(folder: &str) -> String {
    format!("/{}", folder.trim_start_matches('/'))
}
