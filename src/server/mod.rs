//! HTTP surface: JSON endpoints over the intake and invoice pipelines.
//!
//! * `POST /process-file` — base64 document intake, answers with the
//!   analysis outcome or a declared limitation.
//! * `POST /process-image` — base64 image analyzed as a medical document,
//!   answers with structured JSON.
//! * `POST /process-image/Nota` — same surface with the general-purpose
//!   prompt, for notas and tickets.
//! * `POST /generate-pdf` — invoice payload in either supported schema,
//!   answers with the rendered prefactura as base64.
//!
//! Error philosophy: limitations (unsupported type, scanned PDF) are
//! HTTP 200 with `ok:false`; caller mistakes map to 400; capability and
//! rendering failures map to 500. Messages are relayed verbatim.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::analysis::{AnalysisProvider, DEFAULT_IMAGE_PROMPT, MEDICAL_IMAGE_PROMPT};
use crate::config::ServiceConfig;
use crate::error::ProcessError;
use crate::invoice::normalize::Normalizer;
use crate::invoice::schema::InvoicePayload;
use crate::pipeline::classify::KindHint;
use crate::pipeline::codec;
use crate::pipeline::dispatch::{self, DispatchOutcome, UploadRequest};
use crate::render::InvoiceRenderer;

/// Shared service dependencies, injected once at router construction.
pub struct AppState {
    pub config: ServiceConfig,
    pub provider: Arc<dyn AnalysisProvider>,
    pub renderer: Arc<dyn InvoiceRenderer>,
}

/// Build the service router with all routes and the JSON body limit.
///
/// The limit is generous because base64 inflates payloads by roughly a
/// third over the raw document size.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.body_limit_bytes;
    Router::new()
        .route("/process-file", post(process_file))
        .route("/process-image", post(process_image_medical))
        .route("/process-image/Nota", post(process_image_nota))
        .route("/generate-pdf", post(generate_pdf))
        .layer(Extension(state))
        .layer(DefaultBodyLimit::max(body_limit))
}

// ── /process-file ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessFileRequest {
    base64: String,
    #[serde(alias = "nombreArchivo")]
    filename: Option<String>,
    mime_type: Option<String>,
    kind: Option<KindHint>,
}

#[derive(Debug, Serialize)]
struct ProcessFileResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(rename = "structuredJSON", skip_serializing_if = "Option::is_none")]
    structured_json: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<DispatchOutcome> for ProcessFileResponse {
    fn from(o: DispatchOutcome) -> Self {
        Self {
            ok: o.ok,
            kind: o.kind,
            summary: o.summary,
            structured_json: o.structured,
            error: o.note,
        }
    }
}

async fn process_file(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<ProcessFileRequest>,
) -> axum::response::Response {
    let request = UploadRequest {
        base64: body.base64,
        filename: body.filename,
        mime_type: body.mime_type,
        kind: body.kind,
    };
    match dispatch::process_upload(&request, &state.config, state.provider.as_ref()).await {
        Ok(outcome) => Json(ProcessFileResponse::from(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}

// ── /process-image, /process-image/Nota ──────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProcessImageRequest {
    base64: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProcessImageResponse {
    #[serde(rename = "structuredJSON")]
    structured_json: Value,
    file: String,
}

async fn process_image_medical(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<ProcessImageRequest>,
) -> axum::response::Response {
    prompted_image(state, body, MEDICAL_IMAGE_PROMPT).await
}

async fn process_image_nota(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<ProcessImageRequest>,
) -> axum::response::Response {
    prompted_image(state, body, DEFAULT_IMAGE_PROMPT).await
}

async fn prompted_image(
    state: Arc<AppState>,
    body: ProcessImageRequest,
    prompt: &str,
) -> axum::response::Response {
    let Some(base64) = body.base64.filter(|b| !b.is_empty()) else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "se requiere 'base64' en el body",
        );
    };
    match dispatch::process_image(&base64, prompt, &state.config, state.provider.as_ref()).await {
        Ok(outcome) => Json(ProcessImageResponse {
            structured_json: outcome.structured,
            file: outcome.file,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

// ── /generate-pdf ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GeneratePdfResponse {
    #[serde(rename = "nombreArchivo")]
    nombre_archivo: String,
    #[serde(rename = "pdfBase64")]
    pdf_base64: String,
}

async fn generate_pdf(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let result = async {
        let payload = InvoicePayload::from_value(body)?;
        let invoice = Normalizer::new(&state.config).normalize(&payload)?;
        let bytes = state.renderer.render(&invoice).await?;
        Ok::<_, ProcessError>((invoice, bytes))
    }
    .await;

    match result {
        Ok((invoice, bytes)) => {
            info!(folio = %invoice.meta.folio, "prefactura generated");
            let filename = format!("prefactura_{}.pdf", Utc::now().format("%Y%m%d%H%M%S"));
            Json(GeneratePdfResponse {
                nombre_archivo: filename,
                pdf_base64: codec::encode(&bytes),
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

// ── Error mapping ────────────────────────────────────────────────────────

/// Map the error taxonomy onto HTTP statuses. `UnsupportedType` never
/// reaches here on the intake path (dispatch converts it to `ok:false`);
/// the arm exists for completeness and answers 200 the same way.
fn error_response(err: ProcessError) -> axum::response::Response {
    match err {
        ProcessError::Decode(msg) => json_error(StatusCode::BAD_REQUEST, "decode_error", msg),
        ProcessError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        ProcessError::AnalysisRejected(msg) => {
            json_error(StatusCode::BAD_REQUEST, "analysis_rejected", msg)
        }
        ProcessError::UnsupportedType { mime } => (
            StatusCode::OK,
            Json(json!({
                "ok": false,
                "error": format!("tipo de contenido no soportado: {mime}"),
            })),
        )
            .into_response(),
        ProcessError::AnalysisFailed(msg) => {
            error!("analysis failed: {msg}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "analysis_failed", msg)
        }
        ProcessError::RenderFailed(msg) => {
            error!("render failed: {msg}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "render_failed", msg)
        }
        ProcessError::Internal(msg) => {
            error!("internal error: {msg}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        for err in [
            ProcessError::Decode("x".into()),
            ProcessError::Validation("x".into()),
            ProcessError::AnalysisRejected("x".into()),
        ] {
            assert_eq!(error_response(err).status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn unsupported_type_is_a_200_limitation() {
        let err = ProcessError::UnsupportedType {
            mime: "text/plain".into(),
        };
        assert_eq!(error_response(err).status(), StatusCode::OK);
    }

    #[test]
    fn infrastructure_errors_map_to_500() {
        for err in [
            ProcessError::AnalysisFailed("x".into()),
            ProcessError::RenderFailed("x".into()),
            ProcessError::Internal("x".into()),
        ] {
            assert_eq!(
                error_response(err).status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }
}
