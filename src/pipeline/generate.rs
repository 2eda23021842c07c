//! Prompt generation: one call over both ready files.
//!
//! The returned text is the caller's payload and is passed through as the
//! model wrote it. The only check is that there is something to pass on.

use crate::backend::{BackendError, GenerativeBackend};
use crate::error::Vid2PromptError;
use crate::media::GenerationRequest;
use tracing::{debug, info};

/// Issue the generation call and return the model's text unchanged.
///
/// # Errors
/// [`Vid2PromptError::Generation`] when the call fails, the response is
/// blocked, or the text is empty or whitespace only. No retry.
pub async fn request_prompt(
    backend: &dyn GenerativeBackend,
    request: &GenerationRequest,
) -> Result<String, Vid2PromptError> {
    debug!(
        model = %request.model,
        style = %request.style.uri,
        target = %request.target.uri,
        "Requesting generation"
    );

    let text = backend
        .generate_content(request)
        .await
        .map_err(|e| Vid2PromptError::Generation {
            detail: match e {
                BackendError::Blocked(reason) => format!("response blocked by the service ({reason})"),
                other => other.to_string(),
            },
        })?;

    if text.trim().is_empty() {
        return Err(Vid2PromptError::Generation {
            detail: "model returned only whitespace".into(),
        });
    }

    info!(model = %request.model, "Generated {} chars", text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ModelInfo;
    use crate::media::{FileState, RemoteFile};
    use async_trait::async_trait;
    use std::path::Path;

    struct Fixed(Result<String, BackendError>);

    #[async_trait]
    impl GenerativeBackend for Fixed {
        async fn upload_file(&self, _: &Path, _: &str, _: &str) -> Result<RemoteFile, BackendError> {
            Err(BackendError::EmptyResponse)
        }

        async fn get_file(&self, _: &str) -> Result<RemoteFile, BackendError> {
            Err(BackendError::EmptyResponse)
        }

        async fn generate_content(&self, _: &GenerationRequest) -> Result<String, BackendError> {
            match self.0 {
                Ok(ref text) => Ok(text.clone()),
                Err(BackendError::Blocked(ref r)) => Err(BackendError::Blocked(r.clone())),
                Err(_) => Err(BackendError::EmptyResponse),
            }
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
            Ok(Vec::new())
        }
    }

    fn request() -> GenerationRequest {
        let file = |name: &str| RemoteFile {
            name: name.into(),
            uri: format!("https://mock.test/v1beta/{name}"),
            mime_type: "video/mp4".into(),
            display_name: None,
            state: FileState::Ready,
        };
        GenerationRequest::new("gemini-2.5-flash", file("files/s"), file("files/t"), "x").unwrap()
    }

    #[tokio::test]
    async fn test_text_is_returned_verbatim() {
        let cases = [
            "A family 👨\u{200D}👩\u{200D}👧 walks.",
            "```\nScene 1: sunrise.\n\n\n\nScene 2: rain.\n```",
            "  Leading and trailing space kept \r\n",
        ];
        for reply in cases {
            let backend = Fixed(Ok(reply.to_string()));
            assert_eq!(request_prompt(&backend, &request()).await.unwrap(), reply);
        }
    }

    #[tokio::test]
    async fn test_whitespace_only_is_generation_error() {
        let backend = Fixed(Ok(" \n\t ".into()));
        let err = request_prompt(&backend, &request()).await.unwrap_err();
        assert_eq!(err.kind(), "GenerationError");
    }

    #[tokio::test]
    async fn test_block_reason_is_named() {
        let backend = Fixed(Err(BackendError::Blocked("SAFETY".into())));
        let err = request_prompt(&backend, &request()).await.unwrap_err();
        assert!(err.to_string().contains("SAFETY"), "got {err}");
    }
}
