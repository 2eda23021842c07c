//! Gemini REST implementation of [`GenerativeBackend`].
//!
//! Four endpoints are used:
//!
//! ```text
//! POST {base}/upload/v1beta/files                     resumable upload (start, then upload+finalize)
//! GET  {base}/v1beta/files/{id}                       file record incl. state
//! POST {base}/v1beta/models/{model}:generateContent   generation
//! GET  {base}/v1beta/models                           model listing
//! ```
//!
//! The API key travels in the `x-goog-api-key` header, never in the URL, so
//! it does not end up in request logs.

use super::{BackendError, GenerativeBackend, ModelInfo};
use crate::config::DEFAULT_MIME_TYPE;
use crate::media::{FileState, GenerationRequest, RemoteFile};
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// HTTP client for the Gemini Files and generateContent APIs.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client. `timeout` bounds each individual HTTP call.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, BackendError> {
        let io_err = |source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();

        // 1. Open a resumable session.
        let start = self
            .send(
                self.http
                    .post(self.url("/upload/v1beta/files"))
                    .header("X-Goog-Upload-Protocol", "resumable")
                    .header("X-Goog-Upload-Command", "start")
                    .header("X-Goog-Upload-Header-Content-Length", size.to_string())
                    .header("X-Goog-Upload-Header-Content-Type", mime_type)
                    .json(&serde_json::json!({ "file": { "display_name": display_name } })),
            )
            .await?;

        let session_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                BackendError::InvalidResponse(format!("upload start response lacks {UPLOAD_URL_HEADER}"))
            })?;
        debug!("Upload session opened for '{}' ({} bytes)", display_name, size);

        // 2. Stream the bytes and finalize in one request.
        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let response = self
            .send(
                self.http
                    .post(&session_url)
                    .header(CONTENT_LENGTH, size)
                    .header("X-Goog-Upload-Offset", "0")
                    .header("X-Goog-Upload-Command", "upload, finalize")
                    .body(reqwest::Body::from(file)),
            )
            .await?;

        let envelope: FileEnvelope = response.json().await.map_err(decode_error)?;
        envelope.file.into_remote_file(mime_type)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, BackendError> {
        let response = self
            .send(self.http.get(self.url(&format!("/v1beta/{name}"))))
            .await?;
        let file: FileResource = response.json().await.map_err(decode_error)?;
        file.into_remote_file(DEFAULT_MIME_TYPE)
    }

    async fn generate_content(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let mut parts: Vec<Part<'_>> = request
            .files()
            .into_iter()
            .map(|f| Part::File {
                file_data: FileData {
                    mime_type: &f.mime_type,
                    file_uri: &f.uri,
                },
            })
            .collect();
        parts.push(Part::Text {
            text: &request.instruction,
        });

        let body = GenerateContentRequest {
            contents: vec![Content { role: "user", parts }],
        };

        let url = self.url(&format!("/v1beta/{}:generateContent", model_path(&request.model)));
        let response = self.send(self.http.post(url).json(&body)).await?;
        let parsed: GenerateContentResponse = response.json().await.map_err(decode_error)?;
        parsed.into_text()
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.url("/v1beta/models"))
                .query(&[("pageSize", "1000")]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListModelsResponse = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(decode_error)?;

            models.extend(page.models.into_iter().map(|m| ModelInfo {
                name: m.name,
                display_name: m.display_name,
                supported_generation_methods: m.supported_generation_methods,
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(models)
    }
}

/// `gemini-2.5-flash` and `models/gemini-2.5-flash` both become `models/gemini-2.5-flash`.
pub fn model_path(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Transport(format!("timed out: {e}"))
    } else {
        BackendError::Transport(e.to_string())
    }
}

fn decode_error(e: reqwest::Error) -> BackendError {
    BackendError::InvalidResponse(e.to_string())
}

/// Turn a non-success response into [`BackendError::Http`], preferring the
/// service's own `{"error":{"message":…}}` text over the raw body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorEnvelope>(&body) {
        Ok(envelope) => match envelope.error.status {
            Some(s) => format!("{s}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };

    Err(BackendError::Http {
        status: status.as_u16(),
        message,
    })
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    state: Option<WireFileState>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum WireFileState {
    Processing,
    Active,
    Failed,
    #[serde(other)]
    StateUnspecified,
}

impl From<WireFileState> for FileState {
    fn from(s: WireFileState) -> Self {
        match s {
            WireFileState::Processing => FileState::Processing,
            WireFileState::Active => FileState::Ready,
            WireFileState::Failed => FileState::Failed,
            WireFileState::StateUnspecified => FileState::Unknown,
        }
    }
}

impl FileResource {
    fn into_remote_file(self, fallback_mime: &str) -> Result<RemoteFile, BackendError> {
        let uri = self.uri.ok_or_else(|| {
            BackendError::InvalidResponse(format!("file '{}' has no uri", self.name))
        })?;
        Ok(RemoteFile {
            name: self.name,
            uri,
            mime_type: self
                .mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback_mime.to_string()),
            display_name: self.display_name,
            state: self.state.map(FileState::from).unwrap_or(FileState::Unknown),
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    File {
        #[serde(rename = "fileData")]
        file_data: FileData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, all text parts concatenated.
    fn into_text(self) -> Result<String, BackendError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return match self.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => Err(BackendError::Blocked(reason)),
                None => Err(BackendError::EmptyResponse),
            };
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return match candidate.finish_reason.as_deref() {
                Some(reason) if reason != "STOP" && reason != "MAX_TOKENS" => {
                    Err(BackendError::Blocked(reason.to_string()))
                }
                _ => Err(BackendError::EmptyResponse),
            };
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelResource {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiStatus,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    message: String,
    #[serde(default)]
    status: Option<String>,
}
