//! The remote generative service, seen as three operations.
//!
//! The pipeline only ever talks to [`GenerativeBackend`]: upload a blob, ask
//! for a file's state, and generate text from file references. The production
//! implementation is [`gemini::GeminiClient`]; tests substitute scripted
//! backends through [`crate::config::GenerationConfigBuilder::backend`].

pub mod gemini;

use crate::media::{GenerationRequest, RemoteFile};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use gemini::GeminiClient;

/// A raw failure from the remote service or the transport to it.
///
/// Pipeline stages wrap these into [`crate::error::Vid2PromptError`] with
/// the stage and input attached.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Non-success HTTP status, with the service's own message when it sent one.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection, TLS or timeout failure before a response arrived.
    #[error("request failed: {0}")]
    Transport(String),

    /// Response arrived but did not have the expected shape.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    /// Generation was refused by the service's safety filters.
    #[error("response blocked: {0}")]
    Blocked(String),

    /// Generation succeeded but contained no text.
    #[error("response contained no text")]
    EmptyResponse,

    /// The local file to upload could not be read.
    #[error("could not read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A model advertised by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Resource name, e.g. `models/gemini-2.5-flash`.
    pub name: String,
    pub display_name: Option<String>,
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// Whether the model can serve `generateContent` calls.
    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

/// Operations the pipeline needs from the remote service.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Send a local file; the returned handle is usually still processing.
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, BackendError>;

    /// Fetch the current record for a resource name such as `files/abc123`.
    async fn get_file(&self, name: &str) -> Result<RemoteFile, BackendError>;

    /// One generation call; returns the text of the primary candidate.
    async fn generate_content(&self, request: &GenerationRequest) -> Result<String, BackendError>;

    /// Models available to the configured credential.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError>;
}

static RE_FILE_RESOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|/)(files/[A-Za-z0-9_-]+)(?:[/?#:]|$)").unwrap());

/// Extract the `files/<id>` resource name from a file URI or bare name.
///
/// Returns `None` when the string does not reference a file resource.
pub fn resource_name_from_uri(uri: &str) -> Option<String> {
    RE_FILE_RESOURCE
        .captures(uri.trim())
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_name_from_full_uri() {
        assert_eq!(
            resource_name_from_uri("https://generativelanguage.googleapis.com/v1beta/files/abc-123"),
            Some("files/abc-123".to_string())
        );
    }

    #[test]
    fn resource_name_from_bare_name_and_query() {
        assert_eq!(resource_name_from_uri("files/xyz"), Some("files/xyz".into()));
        assert_eq!(
            resource_name_from_uri("https://host/v1beta/files/xyz?alt=media"),
            Some("files/xyz".into())
        );
    }

    #[test]
    fn resource_name_rejects_other_uris() {
        assert_eq!(resource_name_from_uri("https://example.com/video.mp4"), None);
        assert_eq!(resource_name_from_uri("profiles/abc"), None);
        assert_eq!(resource_name_from_uri(""), None);
    }

    #[test]
    fn model_generation_support() {
        let m = ModelInfo {
            name: "models/gemini-2.5-flash".into(),
            display_name: None,
            supported_generation_methods: vec!["countTokens".into(), "generateContent".into()],
        };
        assert!(m.supports_generation());
    }
}
