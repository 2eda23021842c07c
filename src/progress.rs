//! Progress-callback trait for per-request pipeline events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to observe a
//! request as it moves through storage, upload, polling and generation.
//!
//! # Example
//!
//! ```rust
//! use vid2prompt::{GenerationConfig, GenerationProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl GenerationProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("-> {stage}");
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::media::{FileState, MediaRole, RemoteFile};
use std::fmt;
use std::sync::Arc;

/// Pipeline stage of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Storing,
    Uploading,
    Polling,
    Generating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Storing => "storing uploads",
            Stage::Uploading => "uploading to remote service",
            Stage::Polling => "waiting for remote processing",
            Stage::Generating => "generating prompt",
        };
        f.write_str(s)
    }
}

/// Called by the orchestrator as a request progresses.
///
/// The two inputs are uploaded and polled concurrently, so `on_uploaded` and
/// `on_poll` may be called from different tasks at the same time.
/// All methods default to no-ops.
pub trait GenerationProgressCallback: Send + Sync {
    /// A stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// One input reached the remote service.
    fn on_uploaded(&self, role: MediaRole, file: &RemoteFile) {
        let _ = (role, file);
    }

    /// A status query returned.
    ///
    /// # Arguments
    /// * `attempt`: 1-indexed query number for this input
    fn on_poll(&self, role: MediaRole, state: FileState, attempt: u32) {
        let _ = (role, state, attempt);
    }

    /// The request finished successfully.
    fn on_complete(&self, result_len: usize) {
        let _ = result_len;
    }
}

/// A no-op implementation.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
