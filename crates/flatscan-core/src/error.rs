// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for flatscan.
//
// Three taxonomies live here: the top-level `FlatscanError`, the stage-local
// `RectifyError` raised inside the rectification pipeline, and the
// `UploadError` kinds reported by the remote upload collaborator.

use thiserror::Error;

/// Top-level error type for all flatscan operations.
#[derive(Debug, Error)]
pub enum FlatscanError {
    // -- Image / document errors --
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Upload collaborator --
    #[error(transparent)]
    Upload(#[from] UploadError),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stage-local failures of the rectification pipeline.
///
/// Only [`RectifyError::Decode`] is a hard failure; every other kind is
/// recovered by returning the input image unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RectifyError {
    #[error("unreadable input image: {0}")]
    Decode(String),

    #[error("no document boundary found")]
    NoBoundaryFound,

    #[error("degenerate document geometry: target size {width}x{height}")]
    DegenerateGeometry { width: i64, height: i64 },

    #[error("projective transform could not be solved: {0}")]
    TransformSolveFailure(String),
}

impl From<RectifyError> for FlatscanError {
    fn from(err: RectifyError) -> Self {
        match err {
            RectifyError::Decode(detail) => FlatscanError::Decode(detail),
            other => FlatscanError::ImageError(other.to_string()),
        }
    }
}

/// Failures reported by the remote upload collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("upload credentials missing: {0}")]
    MissingCredentials(String),

    #[error("upload transport error: {0}")]
    Transport(String),

    #[error("remote storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("upload authorization expired: {0}")]
    AuthExpired(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FlatscanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_escalates_to_decode_variant() {
        let err: FlatscanError = RectifyError::Decode("zero-sized image".into()).into();
        assert!(matches!(err, FlatscanError::Decode(ref d) if d == "zero-sized image"));
    }

    #[test]
    fn upload_error_is_transparent() {
        let err: FlatscanError = UploadError::QuotaExceeded("storageQuotaExceeded".into()).into();
        assert_eq!(
            err.to_string(),
            "remote storage quota exceeded: storageQuotaExceeded"
        );
    }
}
