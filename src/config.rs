//! Configuration for prompt generation requests.
//!
//! Everything a request needs besides its two inputs lives in
//! [`GenerationConfig`], built via [`GenerationConfigBuilder`]. The model id,
//! instruction template and time budgets are plain values handed to the
//! orchestrator, never process-wide globals, so two configs can run side by
//! side in one process (and in one test binary).
//!
//! # Design choice: builder over constructor
//! Most callers change two or three knobs. The builder lets them set only
//! those and rely on documented defaults for the rest.

use crate::backend::GenerativeBackend;
use crate::error::Vid2PromptError;
use crate::pipeline::poll::{Pause, TokioPause};
use crate::progress::ProgressCallback;
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default model, matching the production deployment.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// MIME type assumed when a client sends none, and for degraded-mode handles.
pub const DEFAULT_MIME_TYPE: &str = "video/mp4";

/// Configuration for prompt generation.
///
/// # Example
/// ```rust
/// use vid2prompt::{GenerationConfig, InstructionTemplate};
///
/// let config = GenerationConfig::builder()
///     .api_key("AIza...")
///     .model("gemini-2.5-pro")
///     .instruction(InstructionTemplate::StyleOnly)
///     .request_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Model identifier, with or without the `models/` prefix. Default: `gemini-2.5-flash`.
    pub model: String,

    /// Built-in instruction template. Default: [`InstructionTemplate::SceneNarrative`].
    pub instruction: InstructionTemplate,

    /// Custom instruction text. Takes precedence over `instruction`.
    pub custom_instruction: Option<String>,

    /// Which input forms the orchestrator accepts. Default: [`SubmissionMode::Any`].
    pub submission_mode: SubmissionMode,

    /// Gemini API key. Without it (and without `backend`) every request
    /// fails with a configuration error before contacting the remote service.
    pub api_key: Option<String>,

    /// Base URL of the Gemini REST API. Overridden in tests.
    pub api_base_url: String,

    /// Pre-constructed backend. Takes precedence over `api_key`.
    pub backend: Option<Arc<dyn GenerativeBackend>>,

    /// How the poller waits between status queries. Default: tokio sleep.
    pub pause: Arc<dyn Pause>,

    /// Wait between status queries. Default: 2 s.
    pub poll_interval: Duration,

    /// Maximum total polling wait per input. `None` leaves polling bounded
    /// only by `request_timeout`. Default: 240 s.
    pub max_poll_wait: Option<Duration>,

    /// Wall-clock budget for a whole request. Default: 300 s.
    ///
    /// Remote video processing routinely takes tens of seconds per file, so
    /// budgets below a minute mostly produce timeouts.
    pub request_timeout: Duration,

    /// Per-HTTP-call timeout for the remote API. Default: 120 s.
    pub api_timeout: Duration,

    /// MIME type used when none is declared. Default: `video/mp4`.
    pub default_mime_type: String,

    /// Directory for temporary copies of uploads. Default: the OS temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Maximum accepted inbound request body in bytes. Default: 100 MiB.
    pub max_upload_bytes: usize,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            instruction: InstructionTemplate::default(),
            custom_instruction: None,
            submission_mode: SubmissionMode::default(),
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            backend: None,
            pause: Arc::new(TokioPause),
            poll_interval: Duration::from_secs(2),
            max_poll_wait: Some(Duration::from_secs(240)),
            request_timeout: Duration::from_secs(300),
            api_timeout: Duration::from_secs(120),
            default_mime_type: DEFAULT_MIME_TYPE.to_string(),
            temp_dir: None,
            max_upload_bytes: 100 * 1024 * 1024,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("model", &self.model)
            .field("instruction", &self.instruction)
            .field("custom_instruction", &self.custom_instruction.as_ref().map(|s| s.len()))
            .field("submission_mode", &self.submission_mode)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn GenerativeBackend>"))
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_wait", &self.max_poll_wait)
            .field("request_timeout", &self.request_timeout)
            .field("api_timeout", &self.api_timeout)
            .field("default_mime_type", &self.default_mime_type)
            .field("temp_dir", &self.temp_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// The instruction text actually sent: the custom one if set, else the template.
    pub fn instruction_text(&self) -> &str {
        self.custom_instruction
            .as_deref()
            .unwrap_or_else(|| prompts::instruction_for(self.instruction))
    }

    /// Directory used for temporary upload copies.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`GenerationConfig`].
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl fmt::Debug for GenerationConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl GenerationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn instruction(mut self, template: InstructionTemplate) -> Self {
        self.config.instruction = template;
        self
    }

    pub fn custom_instruction(mut self, text: impl Into<String>) -> Self {
        self.config.custom_instruction = Some(text.into());
        self
    }

    pub fn submission_mode(mut self, mode: SubmissionMode) -> Self {
        self.config.submission_mode = mode;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.config.pause = pause;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn poll_interval_ms(self, ms: u64) -> Self {
        self.poll_interval(Duration::from_millis(ms))
    }

    pub fn max_poll_wait(mut self, wait: Option<Duration>) -> Self {
        self.config.max_poll_wait = wait;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn request_timeout_secs(self, secs: u64) -> Self {
        self.request_timeout(Duration::from_secs(secs))
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn default_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.config.default_mime_type = mime.into();
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes.max(1024);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, Vid2PromptError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(Vid2PromptError::InvalidConfig("model must not be empty".into()));
        }
        if c.poll_interval.is_zero() {
            return Err(Vid2PromptError::InvalidConfig(
                "poll interval must be greater than zero".into(),
            ));
        }
        if c.request_timeout.is_zero() {
            return Err(Vid2PromptError::InvalidConfig(
                "request timeout must be greater than zero".into(),
            ));
        }
        if c.default_mime_type.trim().is_empty() {
            return Err(Vid2PromptError::InvalidConfig(
                "default MIME type must not be empty".into(),
            ));
        }
        if let Some(ref text) = c.custom_instruction {
            if text.trim().is_empty() {
                return Err(Vid2PromptError::InvalidConfig(
                    "custom instruction must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Built-in instruction framings.
///
/// | Template | Output |
/// |----------|--------|
/// | `SceneNarrative` | Chronological scene-by-scene prompt plus duration/audio summary (default) |
/// | `StyleOnly` | Raw style prompt, no scene content |
/// | `EditList` | Numbered list of edits |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstructionTemplate {
    #[default]
    SceneNarrative,
    StyleOnly,
    EditList,
}

/// Which input forms a deployment accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionMode {
    /// Both direct uploads and pre-uploaded URIs (default).
    #[default]
    Any,
    /// Only multipart uploads of the two videos.
    Upload,
    /// Only URIs of files the client already uploaded to the remote service.
    UriReference,
}

impl SubmissionMode {
    pub fn allows_upload(self) -> bool {
        matches!(self, SubmissionMode::Any | SubmissionMode::Upload)
    }

    pub fn allows_uri_reference(self) -> bool {
        matches!(self, SubmissionMode::Any | SubmissionMode::UriReference)
    }
}
