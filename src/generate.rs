//! Request orchestration: the one place that sequences the pipeline.
//!
//! ```text
//! validate ─▶ resolve backend ─▶ store ×2 ─▶ upload ×2 ─▶ poll ×2 ─▶ generate
//!                                   └──────── temp files removed on every path ───┘
//! ```
//!
//! Both inputs move through each phase together (`try_join`), so the first
//! fatal error for either one aborts the other. The whole sequence runs
//! under `request_timeout`; when it fires, the in-flight futures are
//! dropped and the [`StoredMedia`] guards delete their files.

use crate::backend::{resource_name_from_uri, GeminiClient, GenerativeBackend, ModelInfo};
use crate::config::GenerationConfig;
use crate::error::{TimeoutStage, Vid2PromptError};
use crate::media::{
    GenerationOutput, GenerationRequest, GenerationStats, MediaRole, UploadedMedia,
};
use crate::pipeline::generate::request_prompt;
use crate::pipeline::poll::{PollPolicy, PolledFile, Readiness, ReadinessPoller, StatusPolicy};
use crate::pipeline::storage::{StoredMedia, TempStore};
use crate::pipeline::upload::upload_media;
use crate::progress::{GenerationProgressCallback, Stage};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Message for a direct upload missing either video.
pub const MISSING_UPLOADS_MESSAGE: &str = "Both 'styleVideo' and 'targetVideo' are required.";

/// Message for a URI submission missing either reference.
pub const MISSING_URIS_MESSAGE: &str = "Both 'styleUri' and 'targetUri' are required.";

/// Message when no credential is configured.
pub const MISSING_API_KEY_MESSAGE: &str = "GEMINI_API_KEY is not set.";

/// The two inputs of one request, in either accepted form.
///
/// Fields are optional so that a request with a missing input reaches the
/// orchestrator and is rejected with the same message however it arrived.
#[derive(Debug, Clone)]
pub enum GenerationInput {
    /// Raw video bytes to upload.
    Upload {
        style: Option<UploadedMedia>,
        target: Option<UploadedMedia>,
    },
    /// URIs of files already uploaded to the remote service.
    Reference {
        style_uri: Option<String>,
        target_uri: Option<String>,
    },
}

/// Validated input with effective MIME types resolved.
enum Prepared {
    Upload {
        style: (UploadedMedia, String),
        target: (UploadedMedia, String),
    },
    Reference {
        style_uri: String,
        target_uri: String,
    },
}

/// Run one request end to end.
///
/// Check order is fixed: input validation, then submission mode, then the
/// credential. A bad request is therefore reported as such even on a server
/// with no key configured.
///
/// # Errors
/// Any [`Vid2PromptError`]; see the variant docs. Only
/// [`Vid2PromptError::Validation`] is the caller's fault.
pub async fn generate(
    input: GenerationInput,
    config: &GenerationConfig,
) -> Result<GenerationOutput, Vid2PromptError> {
    let total_start = Instant::now();

    match tokio::time::timeout(config.request_timeout, run(input, config, total_start)).await {
        Ok(result) => result,
        Err(_) => {
            let elapsed_ms = total_start.elapsed().as_millis() as u64;
            warn!("Request exceeded its {:?} budget", config.request_timeout);
            Err(Vid2PromptError::Timeout {
                stage: TimeoutStage::Request,
                elapsed_ms,
            })
        }
    }
}

/// Upload two in-memory videos and generate a prompt.
pub async fn generate_from_uploads(
    style: UploadedMedia,
    target: UploadedMedia,
    config: &GenerationConfig,
) -> Result<GenerationOutput, Vid2PromptError> {
    generate(
        GenerationInput::Upload {
            style: Some(style),
            target: Some(target),
        },
        config,
    )
    .await
}

/// Generate a prompt from two files already uploaded to the remote service.
pub async fn generate_from_uris(
    style_uri: impl Into<String>,
    target_uri: impl Into<String>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, Vid2PromptError> {
    generate(
        GenerationInput::Reference {
            style_uri: Some(style_uri.into()),
            target_uri: Some(target_uri.into()),
        },
        config,
    )
    .await
}

/// Read two local video files and generate a prompt.
///
/// The MIME type is guessed from the extension; unknown extensions fall
/// back to `config.default_mime_type`.
///
/// # Example
/// ```rust,no_run
/// use vid2prompt::{generate_from_paths, GenerationConfig};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GenerationConfig::builder().api_key("AIza...").build()?;
/// let output = generate_from_paths(Path::new("cat.mp4"), Path::new("dog.mp4"), &config).await?;
/// println!("{}", output.result);
/// # Ok(())
/// # }
/// ```
pub async fn generate_from_paths(
    style: &Path,
    target: &Path,
    config: &GenerationConfig,
) -> Result<GenerationOutput, Vid2PromptError> {
    let style = read_local(MediaRole::Style, style).await?;
    let target = read_local(MediaRole::Target, target).await?;
    generate_from_uploads(style, target, config).await
}

/// List the models available to the configured credential.
pub async fn list_models(config: &GenerationConfig) -> Result<Vec<ModelInfo>, Vid2PromptError> {
    let backend = resolve_backend(config)?;
    backend
        .list_models()
        .await
        .map_err(|e| Vid2PromptError::ModelListing {
            detail: e.to_string(),
        })
}

/// Resolve the backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`): used as-is. Tests and
///    embedders with their own middleware go this way.
/// 2. **API key** (`config.api_key`): a [`GeminiClient`] against
///    `config.api_base_url`.
///
/// Nothing is read from the environment here; the binary maps
/// `GEMINI_API_KEY` onto the config.
pub fn resolve_backend(
    config: &GenerationConfig,
) -> Result<Arc<dyn GenerativeBackend>, Vid2PromptError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let Some(ref key) = config.api_key else {
        return Err(Vid2PromptError::Configuration {
            message: MISSING_API_KEY_MESSAGE.to_string(),
        });
    };

    let client = GeminiClient::new(key.clone(), config.api_base_url.clone(), config.api_timeout)
        .map_err(|e| Vid2PromptError::Internal(format!("Failed to build HTTP client: {e}")))?;
    Ok(Arc::new(client))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    input: GenerationInput,
    config: &GenerationConfig,
    total_start: Instant,
) -> Result<GenerationOutput, Vid2PromptError> {
    let prepared = prepare(input, config)?;
    let backend = resolve_backend(config)?;

    match prepared {
        Prepared::Upload { style, target } => {
            run_upload(backend.as_ref(), config, style, target, total_start).await
        }
        Prepared::Reference {
            style_uri,
            target_uri,
        } => run_reference(backend.as_ref(), config, &style_uri, &target_uri, total_start).await,
    }
}

fn prepare(input: GenerationInput, config: &GenerationConfig) -> Result<Prepared, Vid2PromptError> {
    match input {
        GenerationInput::Upload { style, target } => {
            // Browsers submit an empty part when no file was chosen.
            let (Some(style), Some(target)) = (
                style.filter(|m| m.size() > 0),
                target.filter(|m| m.size() > 0),
            ) else {
                return Err(Vid2PromptError::validation(MISSING_UPLOADS_MESSAGE));
            };
            let style_mime = video_mime_type(&style, &config.default_mime_type)?;
            let target_mime = video_mime_type(&target, &config.default_mime_type)?;
            if !config.submission_mode.allows_upload() {
                return Err(Vid2PromptError::validation(format!(
                    "Direct video uploads are disabled on this server; submit '{}' and '{}' instead.",
                    MediaRole::Style.uri_field(),
                    MediaRole::Target.uri_field()
                )));
            }
            Ok(Prepared::Upload {
                style: (style, style_mime),
                target: (target, target_mime),
            })
        }
        GenerationInput::Reference {
            style_uri,
            target_uri,
        } => {
            let non_blank = |u: Option<String>| u.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            let (Some(style_uri), Some(target_uri)) = (non_blank(style_uri), non_blank(target_uri)) else {
                return Err(Vid2PromptError::validation(MISSING_URIS_MESSAGE));
            };
            if !config.submission_mode.allows_uri_reference() {
                return Err(Vid2PromptError::validation(format!(
                    "File URI submissions are disabled on this server; upload '{}' and '{}' instead.",
                    MediaRole::Style.form_field(),
                    MediaRole::Target.form_field()
                )));
            }
            Ok(Prepared::Reference {
                style_uri,
                target_uri,
            })
        }
    }
}

/// Effective MIME type for an upload: declared `video/*` types pass through,
/// undeclared or generic binary types get the default, anything else is refused.
fn video_mime_type(media: &UploadedMedia, default: &str) -> Result<String, Vid2PromptError> {
    let declared = media.effective_mime_type(default);
    if declared.eq_ignore_ascii_case("application/octet-stream") {
        return Ok(default.to_string());
    }
    if declared.to_ascii_lowercase().starts_with("video/") {
        return Ok(declared.to_string());
    }
    Err(Vid2PromptError::validation(format!(
        "'{}' must be a video file (got '{}').",
        media.role.form_field(),
        declared
    )))
}

async fn run_upload(
    backend: &dyn GenerativeBackend,
    config: &GenerationConfig,
    (style, style_mime): (UploadedMedia, String),
    (target, target_mime): (UploadedMedia, String),
    total_start: Instant,
) -> Result<GenerationOutput, Vid2PromptError> {
    let progress = config.progress_callback.as_deref();
    info!(
        "Starting generation from uploads: style '{}' ({:.2} MB), target '{}' ({:.2} MB)",
        style.file_name,
        style.size_mb(),
        target.file_name,
        target.size_mb()
    );

    // ── Step 1: Store ────────────────────────────────────────────────────
    notify_stage(progress, Stage::Storing);
    let upload_start = Instant::now();
    let store = TempStore::new(config.temp_dir());
    let (style_stored, target_stored) = tokio::try_join!(store.store(&style), store.store(&target))?;
    drop((style, target));

    // ── Steps 2-4 with the temp files held ──────────────────────────────
    let result = process_stored(
        backend,
        config,
        (&style_stored, &style_mime),
        (&target_stored, &target_mime),
        upload_start,
        total_start,
    )
    .await;

    // ── Cleanup ──────────────────────────────────────────────────────────
    tokio::join!(style_stored.remove(), target_stored.remove());
    result
}

async fn process_stored(
    backend: &dyn GenerativeBackend,
    config: &GenerationConfig,
    (style, style_mime): (&StoredMedia, &str),
    (target, target_mime): (&StoredMedia, &str),
    upload_start: Instant,
    total_start: Instant,
) -> Result<GenerationOutput, Vid2PromptError> {
    let progress = config.progress_callback.as_deref();

    // ── Step 2: Upload ───────────────────────────────────────────────────
    notify_stage(progress, Stage::Uploading);
    let (style_file, target_file) = tokio::try_join!(
        upload_media(backend, style, style_mime),
        upload_media(backend, target, target_mime)
    )?;
    if let Some(cb) = progress {
        cb.on_uploaded(MediaRole::Style, &style_file);
        cb.on_uploaded(MediaRole::Target, &target_file);
    }
    let upload_duration_ms = upload_start.elapsed().as_millis() as u64;

    // ── Step 3: Poll ─────────────────────────────────────────────────────
    let poll_start = Instant::now();
    let (style_polled, target_polled) = poll_pair(
        backend,
        config,
        (Some(style_file.name.as_str()), &StatusPolicy::Strict),
        (Some(target_file.name.as_str()), &StatusPolicy::Strict),
    )
    .await?;
    let poll_duration_ms = poll_start.elapsed().as_millis() as u64;

    // ── Step 4: Generate ─────────────────────────────────────────────────
    finish(
        backend,
        config,
        style_polled,
        target_polled,
        GenerationStats {
            upload_duration_ms,
            poll_duration_ms,
            ..Default::default()
        },
        total_start,
    )
    .await
}

async fn run_reference(
    backend: &dyn GenerativeBackend,
    config: &GenerationConfig,
    style_uri: &str,
    target_uri: &str,
    total_start: Instant,
) -> Result<GenerationOutput, Vid2PromptError> {
    info!("Starting generation from references: style {}, target {}", style_uri, target_uri);

    let trust = |uri: &str| StatusPolicy::TrustOnError {
        fallback_uri: uri.to_string(),
        fallback_mime: config.default_mime_type.clone(),
    };
    let style_name = resource_name_from_uri(style_uri);
    let target_name = resource_name_from_uri(target_uri);

    let poll_start = Instant::now();
    let (style_polled, target_polled) = poll_pair(
        backend,
        config,
        (style_name.as_deref(), &trust(style_uri)),
        (target_name.as_deref(), &trust(target_uri)),
    )
    .await?;
    let poll_duration_ms = poll_start.elapsed().as_millis() as u64;

    finish(
        backend,
        config,
        style_polled,
        target_polled,
        GenerationStats {
            poll_duration_ms,
            ..Default::default()
        },
        total_start,
    )
    .await
}

async fn poll_pair(
    backend: &dyn GenerativeBackend,
    config: &GenerationConfig,
    (style_name, style_policy): (Option<&str>, &StatusPolicy),
    (target_name, target_policy): (Option<&str>, &StatusPolicy),
) -> Result<(PolledFile, PolledFile), Vid2PromptError> {
    let progress = config.progress_callback.as_deref();
    notify_stage(progress, Stage::Polling);

    let poller = ReadinessPoller::new(
        backend,
        config.pause.as_ref(),
        PollPolicy {
            interval: config.poll_interval,
            max_wait: config.max_poll_wait,
        },
    )
    .with_progress(progress);

    tokio::try_join!(
        poller.wait_until_ready(MediaRole::Style, style_name, style_policy),
        poller.wait_until_ready(MediaRole::Target, target_name, target_policy)
    )
}

async fn finish(
    backend: &dyn GenerativeBackend,
    config: &GenerationConfig,
    style: PolledFile,
    target: PolledFile,
    mut stats: GenerationStats,
    total_start: Instant,
) -> Result<GenerationOutput, Vid2PromptError> {
    let progress = config.progress_callback.as_deref();
    stats.poll_queries = style.queries + target.queries;
    stats.unconfirmed = [(MediaRole::Style, style.readiness), (MediaRole::Target, target.readiness)]
        .into_iter()
        .filter(|(_, readiness)| *readiness != Readiness::Confirmed)
        .map(|(role, _)| role)
        .collect();
    if !stats.unconfirmed.is_empty() {
        warn!("Generating with unconfirmed readiness for {:?}", stats.unconfirmed);
    }

    notify_stage(progress, Stage::Generating);
    let generation_start = Instant::now();
    let request = GenerationRequest::new(
        config.model.clone(),
        style.file,
        target.file,
        config.instruction_text(),
    )?;
    let result = request_prompt(backend, &request).await?;
    stats.generation_duration_ms = generation_start.elapsed().as_millis() as u64;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    if let Some(cb) = progress {
        cb.on_complete(result.len());
    }
    info!(
        "Generation complete: {} chars in {}ms ({} status queries)",
        result.len(),
        stats.total_duration_ms,
        stats.poll_queries
    );

    let GenerationRequest {
        model,
        style,
        target,
        ..
    } = request;
    Ok(GenerationOutput {
        result,
        model,
        style,
        target,
        stats,
    })
}

fn notify_stage(progress: Option<&dyn GenerationProgressCallback>, stage: Stage) {
    info!("Stage: {}", stage);
    if let Some(cb) = progress {
        cb.on_stage_start(stage);
    }
}

async fn read_local(role: MediaRole, path: &Path) -> Result<UploadedMedia, Vid2PromptError> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        Vid2PromptError::validation(format!("Cannot read {role} video '{}': {e}", path.display()))
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(UploadedMedia::new(
        role,
        file_name,
        mime_from_extension(path).map(str::to_string),
        data,
    ))
}

/// MIME type for common video extensions.
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mpeg" | "mpg" => "video/mpeg",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "3gp" => "video/3gpp",
        _ => return None,
    };
    Some(mime)
}
