//! Readiness polling: wait until a remote file can be referenced.
//!
//! ## State machine
//!
//! ```text
//!            query
//!   ┌──────────────────┐
//!   ▼                  │ Processing (pause, budget left)
//! Query ───────────────┘
//!   │ Ready / unspecified      ──▶ done
//!   │ Failed                   ──▶ ProcessingFailed
//!   │ Processing, budget spent ──▶ Timeout
//!   │ query error              ──▶ StatusPolicy decides
//! ```
//!
//! The poller always queries before trusting anything: the state carried by
//! the upload response is ignored. Waiting goes through [`Pause`] so tests
//! can step through `Processing → Processing → Ready` without sleeping, and
//! the per-file budget (`max_wait`) is counted in paused time rather than
//! wall-clock time for the same reason.

use crate::backend::GenerativeBackend;
use crate::error::{TimeoutStage, Vid2PromptError};
use crate::media::{FileState, MediaRole, RemoteFile};
use crate::progress::GenerationProgressCallback;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How the poller waits between status queries.
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Real waiting via `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Timing of the poll loop.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Total pause time allowed per file; `None` = unbounded.
    pub max_wait: Option<Duration>,
}

/// What to do when a status query itself fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Any query failure is fatal. Used for files this request uploaded.
    Strict,
    /// Proceed with the caller's URI when the state cannot be read.
    ///
    /// Only for caller-supplied URIs: the key in use may not own the file,
    /// yet the generation call can still accept the reference. A successful
    /// query reporting `Failed` is still fatal.
    TrustOnError {
        fallback_uri: String,
        fallback_mime: String,
    },
}

/// How a returned handle came to be considered usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The service reported the file ready.
    Confirmed,
    /// The service answered without a recognised state.
    Unspecified,
    /// The state could not be read; trusted under [`StatusPolicy::TrustOnError`].
    Assumed,
}

/// Outcome of polling one file.
#[derive(Debug, Clone)]
pub struct PolledFile {
    pub file: RemoteFile,
    /// Status queries issued (0 when no query was possible).
    pub queries: u32,
    pub readiness: Readiness,
}

enum Step {
    Wait,
    Done(RemoteFile, Readiness),
}

/// Drives the poll loop for one file at a time.
pub struct ReadinessPoller<'a> {
    backend: &'a dyn GenerativeBackend,
    pause: &'a dyn Pause,
    policy: PollPolicy,
    progress: Option<&'a dyn GenerationProgressCallback>,
}

impl<'a> ReadinessPoller<'a> {
    pub fn new(backend: &'a dyn GenerativeBackend, pause: &'a dyn Pause, policy: PollPolicy) -> Self {
        Self {
            backend,
            pause,
            policy,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a dyn GenerationProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Poll the file `name` until it is usable.
    ///
    /// `name` is the `files/<id>` resource name; `None` means none could be
    /// derived, which is a query failure handled by `status`.
    ///
    /// # Errors
    /// - [`Vid2PromptError::ProcessingFailed`] when the service reports `Failed`
    /// - [`Vid2PromptError::Timeout`] when `max_wait` is spent while still processing
    /// - [`Vid2PromptError::StatusQuery`] on a query failure under [`StatusPolicy::Strict`]
    pub async fn wait_until_ready(
        &self,
        role: MediaRole,
        name: Option<&str>,
        status: &StatusPolicy,
    ) -> Result<PolledFile, Vid2PromptError> {
        let Some(name) = name else {
            return self.query_failed(role, "", "no file resource name in reference".into(), status, 0);
        };

        let mut waited = Duration::ZERO;
        let mut queries = 0u32;

        loop {
            queries += 1;
            let file = match self.backend.get_file(name).await {
                Ok(file) => file,
                Err(e) => return self.query_failed(role, name, e.to_string(), status, queries),
            };

            debug!(role = %role, name, state = ?file.state, attempt = queries, "Status query");
            if let Some(cb) = self.progress {
                cb.on_poll(role, file.state, queries);
            }

            match classify(role, file)? {
                Step::Done(file, readiness) => {
                    info!(
                        role = %role,
                        name,
                        "File usable after {} quer{} ({}ms waiting)",
                        queries,
                        if queries == 1 { "y" } else { "ies" },
                        waited.as_millis()
                    );
                    return Ok(PolledFile {
                        file,
                        queries,
                        readiness,
                    });
                }
                Step::Wait => {
                    if let Some(max) = self.policy.max_wait {
                        if waited >= max {
                            return Err(Vid2PromptError::Timeout {
                                stage: TimeoutStage::Polling(role),
                                elapsed_ms: waited.as_millis() as u64,
                            });
                        }
                    }
                    self.pause.pause(self.policy.interval).await;
                    waited += self.policy.interval;
                }
            }
        }
    }

    fn query_failed(
        &self,
        role: MediaRole,
        name: &str,
        detail: String,
        status: &StatusPolicy,
        queries: u32,
    ) -> Result<PolledFile, Vid2PromptError> {
        match status {
            StatusPolicy::Strict => Err(Vid2PromptError::StatusQuery {
                role,
                name: name.to_string(),
                detail,
            }),
            StatusPolicy::TrustOnError {
                fallback_uri,
                fallback_mime,
            } => {
                warn!(
                    role = %role,
                    uri = %fallback_uri,
                    "Could not read file state ({}); proceeding with the supplied URI unverified",
                    detail
                );
                if let Some(cb) = self.progress {
                    cb.on_poll(role, FileState::Unknown, queries);
                }
                Ok(PolledFile {
                    file: RemoteFile {
                        name: if name.is_empty() {
                            fallback_uri.clone()
                        } else {
                            name.to_string()
                        },
                        uri: fallback_uri.clone(),
                        mime_type: fallback_mime.clone(),
                        display_name: None,
                        state: FileState::Unknown,
                    },
                    queries,
                    readiness: Readiness::Assumed,
                })
            }
        }
    }
}

fn classify(role: MediaRole, file: RemoteFile) -> Result<Step, Vid2PromptError> {
    match file.state {
        FileState::Processing => Ok(Step::Wait),
        FileState::Ready => Ok(Step::Done(file, Readiness::Confirmed)),
        FileState::Failed => Err(Vid2PromptError::ProcessingFailed {
            role,
            display_name: file.label().to_string(),
        }),
        FileState::Unknown => {
            warn!(role = %role, name = %file.name, "Service reported no processing state; treating file as ready");
            Ok(Step::Done(file, Readiness::Unspecified))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, ModelInfo};
    use crate::media::GenerationRequest;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<FileState, String>>>,
        queried: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<FileState, String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                queried: Mutex::new(Vec::new()),
            }
        }

        fn query_count(&self) -> usize {
            self.queried.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerativeBackend for Scripted {
        async fn upload_file(&self, _: &Path, _: &str, _: &str) -> Result<RemoteFile, BackendError> {
            unreachable!()
        }

        async fn get_file(&self, name: &str) -> Result<RemoteFile, BackendError> {
            self.queried.lock().unwrap().push(name.to_string());
            let next = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(FileState::Processing));
            match next {
                Ok(state) => Ok(RemoteFile {
                    name: name.to_string(),
                    uri: format!("https://example.test/v1beta/{name}"),
                    mime_type: "video/quicktime".into(),
                    display_name: Some("Style Reference".into()),
                    state,
                }),
                Err(message) => Err(BackendError::Http { status: 403, message }),
            }
        }

        async fn generate_content(&self, _: &GenerationRequest) -> Result<String, BackendError> {
            unreachable!()
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
            unreachable!()
        }
    }

    #[derive(Default)]
    struct RecordingPause(Mutex<Vec<Duration>>);

    #[async_trait]
    impl Pause for RecordingPause {
        async fn pause(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    fn policy(max_wait: Option<Duration>) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(2),
            max_wait,
        }
    }

    fn trust() -> StatusPolicy {
        StatusPolicy::TrustOnError {
            fallback_uri: "https://example.test/v1beta/files/theirs".into(),
            fallback_mime: "video/mp4".into(),
        }
    }

    #[tokio::test]
    async fn processing_twice_then_ready() {
        let backend = Scripted::new(vec![
            Ok(FileState::Processing),
            Ok(FileState::Processing),
            Ok(FileState::Ready),
        ]);
        let pause = RecordingPause::default();
        let poller = ReadinessPoller::new(&backend, &pause, policy(None));

        let polled = poller
            .wait_until_ready(MediaRole::Style, Some("files/a"), &StatusPolicy::Strict)
            .await
            .unwrap();

        assert_eq!(polled.file.state, FileState::Ready);
        assert_eq!(polled.queries, 3);
        assert_eq!(polled.readiness, Readiness::Confirmed);
        assert_eq!(*pause.0.lock().unwrap(), vec![Duration::from_secs(2); 2]);
        // Refreshed handle, not the upload response.
        assert_eq!(polled.file.mime_type, "video/quicktime");
    }

    #[tokio::test]
    async fn already_ready_is_still_queried_once() {
        let backend = Scripted::new(vec![Ok(FileState::Ready)]);
        let pause = RecordingPause::default();
        let poller = ReadinessPoller::new(&backend, &pause, policy(None));

        let polled = poller
            .wait_until_ready(MediaRole::Target, Some("files/b"), &StatusPolicy::Strict)
            .await
            .unwrap();
        assert_eq!(polled.queries, 1);
        assert_eq!(backend.query_count(), 1);
        assert!(pause.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_state_is_fatal_even_when_trusting() {
        let backend = Scripted::new(vec![Ok(FileState::Processing), Ok(FileState::Failed)]);
        let pause = RecordingPause::default();
        let poller = ReadinessPoller::new(&backend, &pause, policy(None));

        let err = poller
            .wait_until_ready(MediaRole::Target, Some("files/b"), &trust())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ProcessingFailedError");
        assert_eq!(err.role(), Some(MediaRole::Target));
    }

    #[tokio::test]
    async fn budget_exhaustion_times_out() {
        let backend = Scripted::new(vec![]);
        let pause = RecordingPause::default();
        let poller = ReadinessPoller::new(&backend, &pause, policy(Some(Duration::from_secs(6))));

        let err = poller
            .wait_until_ready(MediaRole::Style, Some("files/a"), &StatusPolicy::Strict)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Vid2PromptError::Timeout {
                stage: TimeoutStage::Polling(MediaRole::Style),
                elapsed_ms: 6000
            }
        ));
        assert_eq!(pause.0.lock().unwrap().len(), 3);
        assert_eq!(backend.query_count(), 4);
    }

    #[tokio::test]
    async fn query_error_is_fatal_when_strict() {
        let backend = Scripted::new(vec![Err("PERMISSION_DENIED".into())]);
        let pause = RecordingPause::default();
        let poller = ReadinessPoller::new(&backend, &pause, policy(None));

        let err = poller
            .wait_until_ready(MediaRole::Style, Some("files/a"), &StatusPolicy::Strict)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "StatusQueryError");
        assert!(err.to_string().contains("PERMISSION_DENIED"));
    }

    #[tokio::test]
    async fn query_error_falls_back_when_trusting() {
        let backend = Scripted::new(vec![Err("PERMISSION_DENIED".into())]);
        let pause = RecordingPause::default();
        let poller = ReadinessPoller::new(&backend, &pause, policy(None));

        let polled = poller
            .wait_until_ready(MediaRole::Style, Some("files/theirs"), &trust())
            .await
            .unwrap();
        assert_eq!(polled.readiness, Readiness::Assumed);
        assert_eq!(polled.file.state, FileState::Unknown);
        assert_eq!(polled.file.uri, "https://example.test/v1beta/files/theirs");
        assert_eq!(polled.file.mime_type, "video/mp4");
    }

    #[tokio::test]
    async fn missing_name_skips_query() {
        let backend = Scripted::new(vec![]);
        let pause = RecordingPause::default();
        let poller = ReadinessPoller::new(&backend, &pause, policy(None));

        let polled = poller
            .wait_until_ready(MediaRole::Target, None, &trust())
            .await
            .unwrap();
        assert_eq!(polled.queries, 0);
        assert_eq!(backend.query_count(), 0);

        let err = poller
            .wait_until_ready(MediaRole::Target, None, &StatusPolicy::Strict)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "StatusQueryError");
    }

    #[tokio::test]
    async fn unspecified_state_is_treated_as_ready() {
        let backend = Scripted::new(vec![Ok(FileState::Unknown)]);
        let pause = RecordingPause::default();
        let poller = ReadinessPoller::new(&backend, &pause, policy(None));

        let polled = poller
            .wait_until_ready(MediaRole::Style, Some("files/a"), &StatusPolicy::Strict)
            .await
            .unwrap();
        assert_eq!(polled.readiness, Readiness::Unspecified);
    }
}
