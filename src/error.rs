//! Error types for the docmind library.
//!
//! A single [`DocMindError`] enum covers every failure the workflow can
//! surface. Two groups matter to callers:
//!
//! * **Upload errors** (`FileNotFound` … `UploadTimeout`) — the document never
//!   reached the model service. The session stays in `AwaitingUpload`.
//!
//! * **Generation errors** (`GenerationFailed`, `ApiTimeout`, `InvalidReply`)
//!   — the service accepted the document but a generation call failed or
//!   returned something that is not JSON. The workflow restarts from the
//!   beginning.
//!
//! Normalization has no error type: [`crate::table::normalize`] is total and
//! degrades malformed replies to a fallback row instead of failing. Errors
//! are never retried automatically; every variant leaves the workflow in a
//! state from which `reset()` (or simply resubmitting) recovers.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the docmind library.
#[derive(Debug, Error)]
pub enum DocMindError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Upload errors ─────────────────────────────────────────────────────
    /// The file API rejected the upload or the network call failed.
    #[error("Upload to the model service failed: {reason}\nCheck your internet connection and API key.")]
    UploadFailed { reason: String },

    /// Upload exceeded the configured timeout.
    #[error("Upload timed out after {secs}s\nIncrease --upload-timeout for large documents.")]
    UploadTimeout { secs: u64 },

    // ── Generation errors ─────────────────────────────────────────────────
    /// The generation endpoint returned an error or the network call failed.
    #[error("Generation request failed: {reason}")]
    GenerationFailed { reason: String },

    /// A generation call exceeded the configured timeout.
    #[error("Generation call timed out after {secs}s\nIncrease --api-timeout.")]
    ApiTimeout { secs: u64 },

    /// The model replied, but the reply text is not valid JSON.
    #[error("Model reply is not valid JSON: {detail}")]
    InvalidReply { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// No API key was supplied in config or environment.
    #[error(
        "No API key configured for the model service.\n\
         Set GEMINI_API_KEY or pass --api-key / GatewayConfig::builder().api_key(...)."
    )]
    ApiKeyMissing,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Workflow errors ───────────────────────────────────────────────────
    /// An action was invoked in a stage that does not accept it.
    ///
    /// Guards the ordering guarantee: extraction is never attempted before a
    /// category exists, classification never before an upload handle exists.
    #[error("Workflow is in stage '{actual}' but the action requires '{expected}'")]
    WrongStage {
        expected: &'static str,
        actual: &'static str,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the CSV export file.
    #[error("Failed to write export file '{path}': {source}")]
    ExportFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocMindError {
    /// True for failures that occurred while submitting the document.
    pub fn is_upload_error(&self) -> bool {
        matches!(
            self,
            DocMindError::FileNotFound { .. }
                | DocMindError::PermissionDenied { .. }
                | DocMindError::NotAPdf { .. }
                | DocMindError::UploadFailed { .. }
                | DocMindError::UploadTimeout { .. }
        )
    }

    /// True for failures that occurred during a generation call.
    pub fn is_generation_error(&self) -> bool {
        matches!(
            self,
            DocMindError::GenerationFailed { .. }
                | DocMindError::ApiTimeout { .. }
                | DocMindError::InvalidReply { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_failed_display() {
        let e = DocMindError::UploadFailed {
            reason: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 503"), "got: {msg}");
        assert!(e.is_upload_error());
        assert!(!e.is_generation_error());
    }

    #[test]
    fn invalid_reply_display() {
        let e = DocMindError::InvalidReply {
            detail: "expected value at line 1".into(),
        };
        assert!(e.to_string().contains("not valid JSON"));
        assert!(e.is_generation_error());
    }

    #[test]
    fn wrong_stage_display() {
        let e = DocMindError::WrongStage {
            expected: "Classified",
            actual: "AwaitingUpload",
        };
        let msg = e.to_string();
        assert!(msg.contains("Classified"));
        assert!(msg.contains("AwaitingUpload"));
    }

    #[test]
    fn api_key_missing_mentions_env_var() {
        assert!(DocMindError::ApiKeyMissing
            .to_string()
            .contains("GEMINI_API_KEY"));
    }
}
