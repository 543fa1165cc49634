// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared HTTP plumbing: client construction and failure classification.

use std::time::Duration;

use flatscan_core::config::UploadConfig;
use flatscan_core::error::UploadError;

/// Longest slice of a response body carried into an error message.
const BODY_SNIPPET_CHARS: usize = 300;

/// Build the HTTP client used for token and upload requests.
pub fn build_http_client(config: &UploadConfig) -> Result<reqwest::Client, UploadError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.application_name.as_str())
        .build()
        .map_err(|e| UploadError::Transport(format!("failed to build HTTP client: {e}")))
}

/// Map an unsuccessful HTTP response onto an upload error kind.
///
/// 401 and `invalid_grant` mean the credential is no longer accepted; the
/// Drive quota reasons mean the destination is full; everything else is a
/// transport failure.
pub fn classify_failure(status: u16, body: &str) -> UploadError {
    let snippet: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
    if status == 401 || body.contains("invalid_grant") {
        UploadError::AuthExpired(format!("HTTP {status}: {snippet}"))
    } else if body.contains("storageQuotaExceeded") || body.contains("quotaExceeded") {
        UploadError::QuotaExceeded(snippet)
    } else {
        UploadError::Transport(format!("HTTP {status}: {snippet}"))
    }
}
