//! Temporary storage for uploaded blobs.
//!
//! The remote uploader streams from a file path, so each inbound blob is
//! first written to the temp directory. Files are named
//! `<millis>-<random>-<sanitised name>`; the random token keeps two
//! concurrent requests uploading `clip.mp4` in the same millisecond apart.
//!
//! [`StoredMedia`] is a guard: call [`StoredMedia::remove`] on normal paths,
//! and if the owning future is dropped first (request timeout, client
//! disconnect) its `Drop` removes the file synchronously.

use crate::error::Vid2PromptError;
use crate::media::{MediaRole, UploadedMedia};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Writes uploads into one directory.
#[derive(Debug, Clone)]
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `media` to a fresh temp file.
    ///
    /// # Errors
    /// [`Vid2PromptError::Storage`] when the file cannot be created or
    /// written. A partially written file is removed before returning.
    pub async fn store(&self, media: &UploadedMedia) -> Result<StoredMedia, Vid2PromptError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let name = sanitize_file_name(&media.file_name);

        let storage_err = |path: &Path, source| Vid2PromptError::Storage {
            path: path.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_err(&self.dir, e))?;

        // tempfile picks an unused name atomically; we keep the file and
        // manage its lifetime through our own guard.
        let (_, path) = tempfile::Builder::new()
            .prefix(&format!("{millis}-"))
            .suffix(&format!("-{name}"))
            .rand_bytes(8)
            .tempfile_in(&self.dir)
            .map_err(|e| storage_err(&self.dir, e))?
            .keep()
            .map_err(|e| storage_err(&self.dir, e.error))?;

        let stored = StoredMedia {
            role: media.role,
            path,
            size: media.size(),
            removed: false,
        };

        if let Err(e) = tokio::fs::write(&stored.path, &media.data).await {
            // `stored` is dropped here, removing the partial file.
            return Err(storage_err(&stored.path, e));
        }

        debug!(
            role = %media.role,
            path = %stored.path.display(),
            "Stored {:.2} MB upload",
            media.size_mb()
        );
        Ok(stored)
    }

    /// Delete a stored file. A file that is already gone counts as success.
    pub async fn remove(path: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// A temp file owned by one request.
#[derive(Debug)]
pub struct StoredMedia {
    pub role: MediaRole,
    path: PathBuf,
    size: usize,
    removed: bool,
}

impl StoredMedia {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Delete the file now. Failures are logged, not returned: cleanup must
    /// never mask the request outcome.
    pub async fn remove(mut self) {
        if let Err(e) = TempStore::remove(&self.path).await {
            warn!(
                role = %self.role,
                path = %self.path.display(),
                "Failed to remove temp file: {}",
                e
            );
        }
        self.removed = true;
    }
}

impl Drop for StoredMedia {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed abandoned temp file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                "Failed to remove abandoned temp file: {}",
                e
            ),
        }
    }
}

/// Byte budget for the client part of a temp file name. Together with the
/// `<millis>-<random>-` prefix this stays well under the common 255-byte
/// `NAME_MAX`.
const MAX_NAME_BYTES: usize = 100;

/// Extensions longer than this are treated as part of the stem.
const MAX_EXTENSION_BYTES: usize = 16;

/// Reduce a client-supplied name to something safe to embed in a file name.
///
/// Keeps only the final path component (either separator style), replaces
/// each whitespace character with `_`, falls back to `upload`, and cuts
/// overlong names to [`MAX_NAME_BYTES`] while keeping the extension.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim_matches('.');
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| !c.is_control())
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        truncate_keeping_extension(cleaned, MAX_NAME_BYTES)
    }
}

fn truncate_keeping_extension(name: String, max: usize) -> String {
    if name.len() <= max {
        return name;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && ext.len() <= MAX_EXTENSION_BYTES => {
            format!("{}.{ext}", truncate_at_char_boundary(stem, max - ext.len() - 1))
        }
        _ => truncate_at_char_boundary(&name, max).to_string(),
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
