// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan-upload: Remote upload collaborator.
//
// Sends a finished scan to Google Drive. Authentication strategies are
// collapsed into one `CredentialProvider`; the `UploadSession` owns the
// credential lifecycle (acquire on first use, reuse until expiry, drop on
// authorization failure). The rectification core never depends on this crate.

pub mod credentials;
pub mod drive;
pub mod fingerprint;
pub mod http;
pub mod session;

pub use credentials::{Authenticator, BearerCredential, CredentialProvider, CredentialSource};
pub use drive::{DriveClient, RemoteObjectId, UploadRequest, UploadTransport};
pub use session::{DriveSession, UploadSession};
