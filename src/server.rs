//! HTTP surface: one generation endpoint plus a health check.
//!
//! ```text
//! POST /generate        multipart (styleVideo, targetVideo) or JSON (styleUri, targetUri)
//! POST /api/generate    same handler
//! GET  /health          {"status":"ok"}
//! ```
//!
//! Every response body is JSON with exactly one of `result` or `error`.
//! Client mistakes are `400 {"error"}`; everything else is
//! `500 {"error", "details"}` where `details` carries the error kind and
//! source chain.

use crate::config::GenerationConfig;
use crate::error::Vid2PromptError;
use crate::generate::{generate, GenerationInput};
use crate::media::{MediaRole, UploadedMedia};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared, read-only state of the router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GenerationConfig>,
}

/// Build the router. The body limit comes from `config.max_upload_bytes`.
pub fn create_router(config: GenerationConfig) -> Router {
    let body_limit = config.max_upload_bytes;
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/generate", post(generate_handler))
        .route("/api/generate", post(generate_handler))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM.
pub async fn serve(addr: SocketAddr, config: GenerationConfig) -> std::io::Result<()> {
    let app = create_router(config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
    info!("Shutting down gracefully...");
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub result: String,
}

/// JSON body of a URI submission.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UriSubmission {
    #[serde(default)]
    pub style_uri: Option<String>,
    #[serde(default)]
    pub target_uri: Option<String>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn generate_handler(State(state): State<AppState>, request: Request) -> Response {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let input = if content_type.starts_with("multipart/form-data") {
        match Multipart::from_request(request, &state).await {
            Ok(multipart) => read_uploads(multipart).await,
            Err(rejection) => Err(ApiError::client(rejection.status(), rejection.body_text())),
        }
    } else if content_type.starts_with("application/json") {
        match Json::<UriSubmission>::from_request(request, &state).await {
            Ok(Json(body)) => Ok(GenerationInput::Reference {
                style_uri: body.style_uri,
                target_uri: body.target_uri,
            }),
            Err(rejection) => Err(ApiError::client(rejection.status(), rejection.body_text())),
        }
    } else {
        Err(ApiError::client(
            StatusCode::BAD_REQUEST,
            "Expected multipart/form-data with 'styleVideo' and 'targetVideo', or application/json with 'styleUri' and 'targetUri'.",
        ))
    };

    let input = match input {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    match generate(input, &state.config).await {
        Ok(output) => Json(GenerateResponse {
            result: output.result,
        })
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Collect the two video parts; other fields are ignored.
async fn read_uploads(mut multipart: Multipart) -> Result<GenerationInput, ApiError> {
    let mut style: Option<UploadedMedia> = None;
    let mut target: Option<UploadedMedia> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let role = match field.name() {
            Some(name) if name == MediaRole::Style.form_field() => MediaRole::Style,
            Some(name) if name == MediaRole::Target.form_field() => MediaRole::Target,
            _ => continue,
        };

        let slot = match role {
            MediaRole::Style => &mut style,
            MediaRole::Target => &mut target,
        };
        if slot.is_some() {
            return Err(ApiError::client(
                StatusCode::BAD_REQUEST,
                format!("Multiple '{}' fields are not allowed.", role.form_field()),
            ));
        }

        let file_name = field.file_name().unwrap_or(role.form_field()).to_string();
        let mime_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        *slot = Some(UploadedMedia::new(role, file_name, mime_type, data));
    }

    Ok(GenerationInput::Upload { style, target })
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::client(e.status(), format!("Failed to read multipart body: {}", e.body_text()))
}

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    fn client(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }
}

impl From<Vid2PromptError> for ApiError {
    fn from(e: Vid2PromptError) -> Self {
        if e.is_client_error() {
            Self::client(StatusCode::BAD_REQUEST, e.to_string())
        } else {
            Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: e.to_string(),
                details: Some(e.diagnostic()),
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                status = self.status.as_u16(),
                details = self.details.as_deref().unwrap_or(""),
                "Request failed: {}",
                self.message
            );
        } else {
            warn!(status = self.status.as_u16(), "Rejected request: {}", self.message);
        }

        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimeoutStage;

    #[test]
    fn validation_maps_to_400_without_details() {
        let e = ApiError::from(Vid2PromptError::validation("Both 'styleVideo' and 'targetVideo' are required."));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert!(e.details.is_none());
    }

    #[test]
    fn pipeline_errors_map_to_500_with_details() {
        let e = ApiError::from(Vid2PromptError::Timeout {
            stage: TimeoutStage::Request,
            elapsed_ms: 10,
        });
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.details.unwrap().starts_with("TimeoutError:"));
    }

    #[test]
    fn uri_submission_accepts_missing_fields() {
        let body: UriSubmission = serde_json::from_str(r#"{"styleUri":"files/a"}"#).unwrap();
        assert_eq!(body.style_uri.as_deref(), Some("files/a"));
        assert!(body.target_uri.is_none());
    }
}
