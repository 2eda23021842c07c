//! Shared fixtures: a scripted backend and a pause that never sleeps.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vid2prompt::{
    BackendError, FileState, GenerationConfig, GenerationConfigBuilder, GenerationRequest,
    GenerativeBackend, MediaRole, ModelInfo, Pause, RemoteFile, UploadedMedia,
};

/// One call to `upload_file`, as seen by the backend.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub path: PathBuf,
    pub mime_type: String,
    pub display_name: String,
    pub bytes: Vec<u8>,
}

/// What `generate_content` answers.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Blocked(String),
}

/// In-memory stand-in for the remote service.
///
/// Uploaded files are named `files/style` and `files/target` after their
/// display names. Status queries pop from a per-name script; an exhausted or
/// absent script answers `Ready`.
pub struct MockBackend {
    scripts: Mutex<HashMap<String, VecDeque<Result<FileState, String>>>>,
    upload_error: Option<String>,
    list_error: Option<String>,
    get_file_delay: Option<Duration>,
    reply: Reply,
    pub uploads: Mutex<Vec<UploadRecord>>,
    pub queries: Mutex<Vec<String>>,
    pub generations: Mutex<Vec<GenerationRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            upload_error: None,
            list_error: None,
            get_file_delay: None,
            reply: Reply::Text("The video starts with a cat. Then a dog appears.".into()),
            uploads: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            generations: Mutex::new(Vec::new()),
        }
    }

    /// Script the status answers for `name`, in order.
    pub fn with_states(self, name: &str, states: impl IntoIterator<Item = FileState>) -> Self {
        self.with_script(name, states.into_iter().map(Ok))
    }

    /// Script answers including query failures (`Err(message)`).
    pub fn with_script(
        self,
        name: &str,
        script: impl IntoIterator<Item = Result<FileState, String>>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), script.into_iter().collect());
        self
    }

    pub fn with_upload_error(mut self, message: &str) -> Self {
        self.upload_error = Some(message.to_string());
        self
    }

    pub fn with_list_error(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    pub fn with_get_file_delay(mut self, delay: Duration) -> Self {
        self.get_file_delay = Some(delay);
        self
    }

    pub fn with_reply(mut self, reply: Reply) -> Self {
        self.reply = reply;
        self
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn generation_count(&self) -> usize {
        self.generations.lock().unwrap().len()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    fn file(name: &str, state: FileState) -> RemoteFile {
        RemoteFile {
            name: name.to_string(),
            uri: format!("https://mock.test/v1beta/{name}"),
            mime_type: "video/mp4".into(),
            display_name: Some(
                if name.ends_with("style") {
                    MediaRole::Style.display_name()
                } else {
                    MediaRole::Target.display_name()
                }
                .to_string(),
            ),
            state,
        }
    }
}

#[async_trait]
impl GenerativeBackend for MockBackend {
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, BackendError> {
        let bytes = std::fs::read(path).map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.uploads.lock().unwrap().push(UploadRecord {
            path: path.to_path_buf(),
            mime_type: mime_type.to_string(),
            display_name: display_name.to_string(),
            bytes,
        });

        if let Some(ref message) = self.upload_error {
            return Err(BackendError::Http {
                status: 429,
                message: message.clone(),
            });
        }

        let name = if display_name == MediaRole::Style.display_name() {
            "files/style"
        } else {
            "files/target"
        };
        let mut file = Self::file(name, FileState::Processing);
        file.mime_type = mime_type.to_string();
        Ok(file)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, BackendError> {
        self.queries.lock().unwrap().push(name.to_string());
        if let Some(delay) = self.get_file_delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(|script| script.pop_front())
            .unwrap_or(Ok(FileState::Ready));

        match next {
            Ok(state) => Ok(Self::file(name, state)),
            Err(message) => Err(BackendError::Http {
                status: 403,
                message,
            }),
        }
    }

    async fn generate_content(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        self.generations.lock().unwrap().push(request.clone());
        match self.reply {
            Reply::Text(ref text) => Ok(text.clone()),
            Reply::Blocked(ref reason) => Err(BackendError::Blocked(reason.clone())),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        if let Some(ref message) = self.list_error {
            return Err(BackendError::Http {
                status: 501,
                message: message.clone(),
            });
        }
        Ok(vec![ModelInfo {
            name: "models/gemini-2.5-flash".into(),
            display_name: Some("Gemini 2.5 Flash".into()),
            supported_generation_methods: vec!["generateContent".into()],
        }])
    }
}

/// Records requested pauses and returns immediately.
#[derive(Default)]
pub struct RecordingPause {
    pub pauses: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Pause for RecordingPause {
    async fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

impl RecordingPause {
    pub fn count(&self) -> usize {
        self.pauses.lock().unwrap().len()
    }
}

/// Config wired to `backend`, a non-sleeping pause and `temp_dir`.
pub fn config_builder(
    backend: &Arc<MockBackend>,
    pause: &Arc<RecordingPause>,
    temp_dir: &Path,
) -> GenerationConfigBuilder {
    GenerationConfig::builder()
        .backend(backend.clone())
        .pause(pause.clone())
        .temp_dir(temp_dir)
}

pub fn video(role: MediaRole, name: &str, data: &[u8]) -> UploadedMedia {
    UploadedMedia::new(role, name, Some("video/mp4".into()), data.to_vec())
}

/// Number of entries left in a directory.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
