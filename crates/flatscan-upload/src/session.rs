// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload session: owns the credential lifecycle around a transport.

use std::path::Path;

use flatscan_core::config::UploadConfig;
use flatscan_core::error::UploadError;
use tracing::{info, instrument, warn};

use crate::credentials::{Authenticator, BearerCredential, CredentialSource};
use crate::drive::{DriveClient, RemoteObjectId, UploadRequest, UploadTransport};
use crate::fingerprint::sha256_hex;

/// An injectable upload collaborator.
///
/// The credential is acquired on first use and reused until it expires. A
/// transport `AuthExpired` drops it so the next call acquires a new one.
/// Failed uploads are not retried.
pub struct UploadSession<C, T> {
    source: C,
    transport: T,
    cached: Option<BearerCredential>,
}

/// The production session: configured credentials against Drive.
pub type DriveSession = UploadSession<Authenticator, DriveClient>;

impl DriveSession {
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        Ok(Self::new(
            Authenticator::from_config(config)?,
            DriveClient::from_config(config)?,
        ))
    }
}

impl<C: CredentialSource, T: UploadTransport> UploadSession<C, T> {
    pub fn new(source: C, transport: T) -> Self {
        Self {
            source,
            transport,
            cached: None,
        }
    }

    /// Whether a usable credential is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.cached.as_ref().is_some_and(|c| !c.is_expired())
    }

    /// Forget the held credential.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    async fn credential(&mut self) -> Result<BearerCredential, UploadError> {
        if let Some(cached) = self.cached.as_ref().filter(|c| !c.is_expired()) {
            return Ok(cached.clone());
        }
        let fresh = self.source.acquire().await?;
        self.cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// Upload the file at `path` as `file_name`, returning its remote id.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn upload_file(
        &mut self,
        path: &Path,
        file_name: &str,
        mime_type: &str,
    ) -> Result<RemoteObjectId, UploadError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            UploadError::Transport(format!("cannot read {}: {e}", path.display()))
        })?;
        info!(sha256 = %sha256_hex(&bytes), size = bytes.len(), "Uploading file");

        let request = UploadRequest {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        };
        let bearer = self.credential().await?;

        match self.transport.create_file(&bearer, &request).await {
            Err(UploadError::AuthExpired(reason)) => {
                warn!(%reason, "Credential rejected; it will be re-acquired on the next upload");
                self.invalidate();
                Err(UploadError::AuthExpired(reason))
            }
            other => other,
        }
    }
}
