//! Remote upload of one stored blob.

use crate::backend::GenerativeBackend;
use crate::error::Vid2PromptError;
use crate::media::RemoteFile;
use crate::pipeline::storage::StoredMedia;
use std::time::Instant;
use tracing::info;

/// Upload `stored` under its role's display name.
///
/// The returned handle's state is whatever the service reported; callers
/// must poll it before use. No retry: any failure is an
/// [`Vid2PromptError::Upload`] naming the role.
pub async fn upload_media(
    backend: &dyn GenerativeBackend,
    stored: &StoredMedia,
    mime_type: &str,
) -> Result<RemoteFile, Vid2PromptError> {
    let role = stored.role;
    let start = Instant::now();

    let file = backend
        .upload_file(stored.path(), mime_type, role.display_name())
        .await
        .map_err(|e| Vid2PromptError::Upload {
            role,
            detail: e.to_string(),
        })?;

    info!(
        role = %role,
        name = %file.name,
        state = ?file.state,
        "Uploaded {} bytes ({}) in {}ms",
        stored.size(),
        mime_type,
        start.elapsed().as_millis()
    );
    Ok(file)
}
