//! Error types for the vid2prompt library.
//!
//! Every failure is fatal for the request it occurs in: there are no retries
//! and no partial results. [`Vid2PromptError`] is what the orchestrator
//! returns; raw remote failures arrive as [`crate::backend::BackendError`]
//! and are mapped into the variant for the stage that hit them, so the
//! message always says *which* step and *which* input failed.
//!
//! The only failure that is deliberately not surfaced is a status-query
//! error in URI-reference mode; see [`crate::pipeline::poll::StatusPolicy`].

use crate::media::MediaRole;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the vid2prompt library.
#[derive(Debug, Error)]
pub enum Vid2PromptError {
    // ── Caller errors ─────────────────────────────────────────────────────
    /// Required input missing or malformed. The request never started.
    #[error("{message}")]
    Validation { message: String },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// Required credential absent. Not specific to any request.
    #[error("{message}")]
    Configuration { message: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Could not write the temporary copy of an upload.
    #[error("Failed to write temporary file '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote service rejected an upload (quota, MIME type, key, network).
    #[error("Failed to upload {role} video: {detail}")]
    Upload { role: MediaRole, detail: String },

    /// A status query failed while the failure could not be trusted away.
    #[error("Could not query processing state of {role} video '{name}': {detail}")]
    StatusQuery {
        role: MediaRole,
        name: String,
        detail: String,
    },

    /// The remote service marked post-upload processing as failed.
    #[error("Processing failed for {role} video ({display_name})")]
    ProcessingFailed {
        role: MediaRole,
        display_name: String,
    },

    /// A wall-clock budget ran out.
    #[error("Timed out after {elapsed_ms}ms while {stage}")]
    Timeout { stage: TimeoutStage, elapsed_ms: u64 },

    /// The generation call failed or returned no usable text.
    #[error("Prompt generation failed: {detail}")]
    Generation { detail: String },

    /// The model listing call failed.
    #[error("Failed to list models: {detail}")]
    ModelListing { detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which budget a [`Vid2PromptError::Timeout`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    /// The per-file polling budget for one input.
    Polling(MediaRole),
    /// The overall request budget.
    Request,
}

impl fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutStage::Polling(role) => write!(f, "waiting for the {role} video to finish processing"),
            TimeoutStage::Request => f.write_str("processing the request"),
        }
    }
}

impl Vid2PromptError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Vid2PromptError::Validation {
            message: message.into(),
        }
    }

    /// Stable name of the error category, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Vid2PromptError::Validation { .. } => "ValidationError",
            Vid2PromptError::Configuration { .. } => "ConfigurationError",
            Vid2PromptError::InvalidConfig(_) => "ConfigurationError",
            Vid2PromptError::Storage { .. } => "StorageError",
            Vid2PromptError::Upload { .. } => "UploadError",
            Vid2PromptError::StatusQuery { .. } => "StatusQueryError",
            Vid2PromptError::ProcessingFailed { .. } => "ProcessingFailedError",
            Vid2PromptError::Timeout { .. } => "TimeoutError",
            Vid2PromptError::Generation { .. } => "GenerationError",
            Vid2PromptError::ModelListing { .. } => "ModelListingError",
            Vid2PromptError::Internal(_) => "InternalError",
        }
    }

    /// True when the caller sent a bad request rather than the service failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Vid2PromptError::Validation { .. })
    }

    /// The input this error is about, when there is one.
    pub fn role(&self) -> Option<MediaRole> {
        match self {
            Vid2PromptError::Upload { role, .. }
            | Vid2PromptError::StatusQuery { role, .. }
            | Vid2PromptError::ProcessingFailed { role, .. }
            | Vid2PromptError::Timeout {
                stage: TimeoutStage::Polling(role),
                ..
            } => Some(*role),
            _ => None,
        }
    }

    /// Diagnostic string: kind, message, and the source chain.
    pub fn diagnostic(&self) -> String {
        let mut out = format!("{}: {}", self.kind(), self);
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(&format!(" (caused by: {err})"));
            source = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_failed_names_the_input() {
        let e = Vid2PromptError::ProcessingFailed {
            role: MediaRole::Target,
            display_name: "Target Output".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("target"), "got: {msg}");
        assert!(msg.contains("Target Output"), "got: {msg}");
        assert_eq!(e.role(), Some(MediaRole::Target));
    }

    #[test]
    fn timeout_display() {
        let e = Vid2PromptError::Timeout {
            stage: TimeoutStage::Polling(MediaRole::Style),
            elapsed_ms: 5000,
        };
        assert!(e.to_string().contains("5000ms"));
        assert!(e.to_string().contains("style video"));

        let e = Vid2PromptError::Timeout {
            stage: TimeoutStage::Request,
            elapsed_ms: 300_000,
        };
        assert!(e.to_string().contains("processing the request"));
        assert_eq!(e.role(), None);
    }

    #[test]
    fn only_validation_is_a_client_error() {
        assert!(Vid2PromptError::validation("missing").is_client_error());
        assert!(!Vid2PromptError::Configuration {
            message: "GEMINI_API_KEY is not set.".into()
        }
        .is_client_error());
        assert!(!Vid2PromptError::Generation {
            detail: "blocked".into()
        }
        .is_client_error());
    }

    #[test]
    fn diagnostic_includes_source_chain() {
        let e = Vid2PromptError::Storage {
            path: PathBuf::from("/tmp/x.mp4"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        let d = e.diagnostic();
        assert!(d.starts_with("StorageError:"), "got: {d}");
        assert!(d.contains("disk full"), "got: {d}");
    }
}
