//! Data types flowing through a single generation request.
//!
//! Nothing here outlives one request: an [`UploadedMedia`] becomes a temp
//! file, the temp file becomes a [`RemoteFile`], two ready remote files plus
//! an instruction become a [`GenerationRequest`], and the reply becomes a
//! [`GenerationOutput`].

use crate::error::Vid2PromptError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two inputs a value belongs to.
///
/// The role fixes every wire name for that input so handlers, the uploader
/// and error messages can never disagree about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaRole {
    /// Video 1: the structural / style reference.
    Style,
    /// Video 2: the target output.
    Target,
}

impl MediaRole {
    /// Multipart field carrying the video bytes.
    pub fn form_field(self) -> &'static str {
        match self {
            MediaRole::Style => "styleVideo",
            MediaRole::Target => "targetVideo",
        }
    }

    /// JSON field carrying a pre-uploaded file URI.
    pub fn uri_field(self) -> &'static str {
        match self {
            MediaRole::Style => "styleUri",
            MediaRole::Target => "targetUri",
        }
    }

    /// Display name attached to the remote file.
    pub fn display_name(self) -> &'static str {
        match self {
            MediaRole::Style => "Style Reference",
            MediaRole::Target => "Target Output",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaRole::Style => "style",
            MediaRole::Target => "target",
        }
    }
}

impl fmt::Display for MediaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// One user-supplied video blob, held in memory for the duration of a request.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub role: MediaRole,
    /// Name as supplied by the client (unsanitised).
    pub file_name: String,
    /// Declared MIME type, if the client sent one.
    pub mime_type: Option<String>,
    pub data: Bytes,
}

impl UploadedMedia {
    pub fn new(
        role: MediaRole,
        file_name: impl Into<String>,
        mime_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            role,
            file_name: file_name.into(),
            mime_type,
            data: data.into(),
        }
    }

    /// Byte size of the payload.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Size in MiB, for log lines.
    pub fn size_mb(&self) -> f64 {
        self.data.len() as f64 / 1024.0 / 1024.0
    }

    /// The declared MIME type, or `default` when none (or an empty one) was sent.
    pub fn effective_mime_type<'a>(&'a self, default: &'a str) -> &'a str {
        match self.mime_type.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m,
            _ => default,
        }
    }
}

/// Processing state of a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    /// Remote post-upload validation/transcoding still running.
    Processing,
    /// Safe to reference in a generation call.
    Ready,
    /// Remote processing failed; terminal.
    Failed,
    /// State could not be determined.
    Unknown,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileState::Processing => "processing",
            FileState::Ready => "ready",
            FileState::Failed => "failed",
            FileState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The remote service's record for one uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub state: FileState,
}

impl RemoteFile {
    /// Name used in log lines: the display name when known, else the resource name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// The outbound generation call: two file references plus the instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub style: RemoteFile,
    pub target: RemoteFile,
    pub instruction: String,
}

impl GenerationRequest {
    /// Build a request, refusing handles that are still processing or failed.
    ///
    /// `Unknown` is accepted: it only arises from the URI-reference fallback
    /// where readiness could not be queried.
    pub fn new(
        model: impl Into<String>,
        style: RemoteFile,
        target: RemoteFile,
        instruction: impl Into<String>,
    ) -> Result<Self, Vid2PromptError> {
        for (role, file) in [(MediaRole::Style, &style), (MediaRole::Target, &target)] {
            if matches!(file.state, FileState::Processing | FileState::Failed) {
                return Err(Vid2PromptError::Internal(format!(
                    "{role} file '{}' referenced while {}",
                    file.name, file.state
                )));
            }
        }
        Ok(Self {
            model: model.into(),
            style,
            target,
            instruction: instruction.into(),
        })
    }

    /// File references in the order they are sent: style, then target.
    pub fn files(&self) -> [&RemoteFile; 2] {
        [&self.style, &self.target]
    }
}

/// Timing breakdown for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub total_duration_ms: u64,
    /// Temp storage plus remote upload of both inputs.
    pub upload_duration_ms: u64,
    pub poll_duration_ms: u64,
    pub generation_duration_ms: u64,
    /// Status queries issued across both inputs.
    pub poll_queries: u32,
    /// Inputs the service never reported ready: an unreadable status under a
    /// URI reference, or a query answered without a recognised state.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unconfirmed: Vec<MediaRole>,
}

/// Result of a successful request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// The generated prompt text.
    pub result: String,
    pub model: String,
    pub style: RemoteFile,
    pub target: RemoteFile,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// Final handles, style then target.
    pub fn files(&self) -> [&RemoteFile; 2] {
        [&self.style, &self.target]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(state: FileState) -> RemoteFile {
        RemoteFile {
            name: "files/x".into(),
            uri: "https://example.test/files/x".into(),
            mime_type: "video/mp4".into(),
            display_name: None,
            state,
        }
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(MediaRole::Style.form_field(), "styleVideo");
        assert_eq!(MediaRole::Target.uri_field(), "targetUri");
        assert_eq!(MediaRole::Target.display_name(), "Target Output");
        assert_eq!(MediaRole::Style.to_string(), "style");
    }

    #[test]
    fn effective_mime_falls_back_on_empty() {
        let m = UploadedMedia::new(MediaRole::Style, "a.mp4", Some(" ".into()), vec![1u8]);
        assert_eq!(m.effective_mime_type("video/mp4"), "video/mp4");
        let m = UploadedMedia::new(MediaRole::Style, "a.mov", Some("video/quicktime".into()), vec![1u8]);
        assert_eq!(m.effective_mime_type("video/mp4"), "video/quicktime");
    }

    #[test]
    fn request_rejects_unready_handles() {
        let err = GenerationRequest::new("m", file(FileState::Processing), file(FileState::Ready), "i")
            .unwrap_err();
        assert!(err.to_string().contains("style"), "got: {err}");

        assert!(GenerationRequest::new("m", file(FileState::Ready), file(FileState::Failed), "i").is_err());
    }

    #[test]
    fn request_accepts_ready_and_fallback_handles() {
        let req = GenerationRequest::new("m", file(FileState::Ready), file(FileState::Unknown), "i")
            .expect("ready + unknown is allowed");
        assert_eq!(req.files()[1].state, FileState::Unknown);
    }
}
