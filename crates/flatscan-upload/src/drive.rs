// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Drive v3 transport: single-request multipart upload of a finished file.

use std::future::Future;

use flatscan_core::config::UploadConfig;
use flatscan_core::error::UploadError;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::credentials::BearerCredential;
use crate::http::{build_http_client, classify_failure};

const DRIVE_UPLOAD_URI: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id&supportsAllDrives=true";

/// Identifier the remote store assigned to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteObjectId(pub String);

impl RemoteObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One file to create remotely.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Sends a file to a remote store with an already-acquired credential.
pub trait UploadTransport {
    fn create_file(
        &self,
        bearer: &BearerCredential,
        request: &UploadRequest,
    ) -> impl Future<Output = Result<RemoteObjectId, UploadError>> + Send;
}

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

/// Drive `files.create` client.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    /// Parent folder for new files; `None` uploads to the principal's root.
    folder_id: Option<String>,
}

impl DriveClient {
    pub fn new(http: reqwest::Client, folder_id: Option<String>) -> Self {
        Self { http, folder_id }
    }

    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        Ok(Self::new(build_http_client(config)?, config.folder_id.clone()))
    }

    pub fn folder_id(&self) -> Option<&str> {
        self.folder_id.as_deref()
    }
}

/// Build a `multipart/related` body: JSON metadata part, then the media part.
pub(crate) fn multipart_body(
    boundary: &str,
    request: &UploadRequest,
    folder_id: Option<&str>,
) -> Vec<u8> {
    let mut metadata = json!({ "name": request.file_name });
    if let Some(folder) = folder_id {
        metadata["parents"] = json!([folder]);
    }

    let mut body = Vec::with_capacity(request.bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: {}\r\n\r\n", request.mime_type).as_bytes(),
    );
    body.extend_from_slice(&request.bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

impl UploadTransport for DriveClient {
    #[instrument(skip(self, bearer, request), fields(name = %request.file_name, size = request.bytes.len()))]
    async fn create_file(
        &self,
        bearer: &BearerCredential,
        request: &UploadRequest,
    ) -> Result<RemoteObjectId, UploadError> {
        let boundary = format!("flatscan-{}", Uuid::new_v4().simple());
        let body = multipart_body(&boundary, request, self.folder_id());

        let response = self
            .http
            .post(DRIVE_UPLOAD_URI)
            .bearer_auth(&bearer.access_token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Transport(format!("upload request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UploadError::Transport(format!("upload response unreadable: {e}")))?;
        debug!(status = status.as_u16(), "Drive responded");

        if !status.is_success() {
            let err = classify_failure(status.as_u16(), &text);
            if matches!(err, UploadError::QuotaExceeded(_)) {
                error!(
                    principal = %bearer.principal,
                    "Drive storage quota exceeded; share the target folder with this principal or use an account with free space"
                );
            }
            return Err(err);
        }

        let created: CreatedFile = serde_json::from_str(&text)
            .map_err(|e| UploadError::Transport(format!("malformed upload response: {e}")))?;
        info!(id = %created.id, "File uploaded");
        Ok(RemoteObjectId(created.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> UploadRequest {
        UploadRequest {
            file_name: "receipt.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: b"%PDF-1.7 body".to_vec(),
        }
    }

    #[test]
    fn body_has_metadata_then_media() {
        let body = multipart_body("b0", &request(), Some("folder-9"));
        let text = String::from_utf8(body).unwrap();

        let meta_at = text.find("\"name\":\"receipt.pdf\"").unwrap();
        let media_at = text.find("Content-Type: application/pdf").unwrap();
        assert!(meta_at < media_at);
        assert!(text.contains("\"parents\":[\"folder-9\"]"));
        assert!(text.starts_with("--b0\r\n"));
        assert!(text.ends_with("\r\n--b0--\r\n"));
        assert!(text.contains("%PDF-1.7 body"));
    }

    #[test]
    fn body_without_folder_has_no_parents() {
        let text = String::from_utf8(multipart_body("b1", &request(), None)).unwrap();
        assert!(!text.contains("parents"));
    }

    #[test]
    fn client_keeps_configured_folder() {
        let mut config = UploadConfig::default();
        config.folder_id = Some("abc".into());
        let client = DriveClient::from_config(&config).unwrap();
        assert_eq!(client.folder_id(), Some("abc"));
    }

    #[test]
    fn remote_id_displays_raw_value() {
        assert_eq!(RemoteObjectId("1AbC".into()).to_string(), "1AbC");
    }
}
