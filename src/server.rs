//! HTTP surface.
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | GET  | `/`                | –    | plain-text banner |
//! | GET  | `/healthz`         | –    | `{"ok": true}` |
//! | POST | `/fusionar-cedula` | [`FuseRequest`] | `image/png` |
//! | POST | `/png-to-a4-pdf`   | [`PdfRequest`]  | `application/pdf` (attachment) |
//!
//! Errors are JSON `{ "ok": false, "error": …, "code": … }`; see
//! [`ApiError`] for the status mapping.

use crate::config::Tolerance;
use crate::error::{ErrorKind, FuseError};
use crate::pipeline::encode::PNG_MIME;
use crate::pipeline::input::ImageSource;
use crate::pipeline::layout::PDF_MIME;
use crate::service::FuseService;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Default JSON body limit: 20 MiB of base64.
pub const DEFAULT_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FuseService>,
}

/// Build the router with CORS, tracing and the body limit applied.
pub fn router(service: Arc<FuseService>, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(handle_root))
        .route("/healthz", get(handle_health))
        .route("/fusionar-cedula", post(handle_fuse))
        .route("/png-to-a4-pdf", post(handle_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

// ── Request bodies ───────────────────────────────────────────────────────

/// Body of `POST /fusionar-cedula`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuseRequest {
    /// Overlay as base64 (data-URI prefix allowed).
    pub base64_overlay: Option<String>,
    /// URL of the credential template.
    pub url_base_image: Option<String>,
    /// Per-request threshold override (0–255).
    pub tolerance: Option<i64>,
}

/// Body of `POST /png-to-a4-pdf`.
///
/// Either an already-fused image (`fusedBase64` or `fusedUrl`), or the two
/// fusion inputs so the server fuses first.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfRequest {
    pub fused_base64: Option<String>,
    pub fused_url: Option<String>,
    pub base64_overlay: Option<String>,
    pub url_base_image: Option<String>,
    pub tolerance: Option<i64>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// Handler: GET /
pub async fn handle_root() -> &'static str {
    "Credential fusion API is up."
}

/// Handler: GET /healthz
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Handler: POST /fusionar-cedula
pub async fn handle_fuse(
    State(state): State<AppState>,
    Json(req): Json<FuseRequest>,
) -> Result<Response, ApiError> {
    let overlay = non_empty(req.base64_overlay);
    let base_url = non_empty(req.url_base_image);
    let (Some(overlay), Some(base_url)) = (overlay, base_url) else {
        return Err(ApiError::missing("base64Overlay and urlBaseImage"));
    };
    let tolerance = req.tolerance.map(Tolerance::new).transpose()?;

    let png = state
        .service
        .fuse(
            ImageSource::Url(base_url),
            ImageSource::Base64(overlay),
            tolerance,
        )
        .await?;

    Ok(([(header::CONTENT_TYPE, PNG_MIME)], png).into_response())
}

/// Handler: POST /png-to-a4-pdf
pub async fn handle_pdf(
    State(state): State<AppState>,
    Json(req): Json<PdfRequest>,
) -> Result<Response, ApiError> {
    let service = &state.service;
    let pdf = match (
        non_empty(req.fused_base64),
        non_empty(req.fused_url),
        non_empty(req.base64_overlay),
        non_empty(req.url_base_image),
    ) {
        (Some(b64), _, _, _) => service.render_pdf(ImageSource::Base64(b64)).await?,
        (None, Some(url), _, _) => service.render_pdf(ImageSource::Url(url)).await?,
        (None, None, Some(overlay), Some(base_url)) => {
            let tolerance = req.tolerance.map(Tolerance::new).transpose()?;
            service
                .fuse_to_pdf(
                    ImageSource::Url(base_url),
                    ImageSource::Base64(overlay),
                    tolerance,
                )
                .await?
        }
        _ => return Err(ApiError::missing("fusedBase64 or fusedUrl")),
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        service.config().pdf_filename
    );
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::from(FuseError::Internal(e.to_string())))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(PDF_MIME)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Error response wrapper.
///
/// | Kind | Status |
/// |------|--------|
/// | `InvalidArgument` | 400 |
/// | `Decode`, `InvalidBaseImage` | 422 |
/// | `Retrieval` | 502 |
/// | `Encode`, `Internal` | 500 |
#[derive(Debug)]
pub struct ApiError(FuseError);

impl ApiError {
    fn missing(fields: &str) -> Self {
        ApiError(FuseError::InvalidArgument(format!("missing data: {fields}")))
    }
}

impl From<FuseError> for ApiError {
    fn from(e: FuseError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match kind {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Decode | ErrorKind::InvalidBaseImage => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Retrieval => StatusCode::BAD_GATEWAY,
            ErrorKind::Encode | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        let body = ErrorBody {
            ok: false,
            error: self.0.to_string(),
            code: kind.code(),
        };
        (status, Json(body)).into_response()
    }
}
