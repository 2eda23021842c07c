//! # vid2prompt
//!
//! Turn a style-reference video and a target video into a text prompt for
//! video generation models, using Gemini's multimodal API.
//!
//! ## Why this crate?
//!
//! Gemini can compare two videos, but only after each has been uploaded
//! through its Files API *and* finished server-side processing. A file
//! referenced while still processing fails the generation call. This crate
//! owns that upload-then-poll protocol, the temp-file lifecycle around it,
//! and the request budget, so callers hand in two videos and get text back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! style video ─┐
//!              ├─ 1. Store     temp copy of each upload (removed on every exit path)
//! target video ┘  2. Upload    resumable upload to the Files API
//!                 3. Poll      PROCESSING ─▶ ACTIVE / FAILED, both inputs concurrently
//!                 4. Generate  one generateContent call with both files + instruction;
//!                              the answer text is returned as written
//! ```
//!
//! Files already uploaded by the caller can skip steps 1-2 via
//! [`generate_from_uris`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vid2prompt::{generate_from_paths, GenerationConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GenerationConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .build()?;
//!     let output = generate_from_paths(Path::new("cat.mp4"), Path::new("dog.mp4"), &config).await?;
//!     println!("{}", output.result);
//!     eprintln!("{} status queries, {}ms total",
//!         output.stats.poll_queries,
//!         output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum router and [`server::serve`] |
//! | `cli`    | on      | The `vid2prompt` binary (clap + anyhow + tracing-subscriber + indicatif); implies `server` |
//!
//! Library-only use:
//! ```toml
//! vid2prompt = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod generate;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendError, GeminiClient, GenerativeBackend, ModelInfo};
pub use config::{GenerationConfig, GenerationConfigBuilder, InstructionTemplate, SubmissionMode};
pub use error::{TimeoutStage, Vid2PromptError};
pub use generate::{
    generate, generate_from_paths, generate_from_uploads, generate_from_uris, list_models,
    GenerationInput,
};
pub use media::{
    FileState, GenerationOutput, GenerationRequest, GenerationStats, MediaRole, RemoteFile,
    UploadedMedia,
};
pub use pipeline::poll::{Pause, TokioPause};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
