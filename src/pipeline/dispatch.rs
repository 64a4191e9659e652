//! Dispatch: drive one upload from raw base64 to an analysis outcome.
//!
//! The request moves through a fixed sequence of states —
//! `Received → Decoded → Classified → {Pdf | Image | Rejected} → Responded`
//! — and reaches a terminal state exactly once. The decoded bytes are
//! persisted as a [`TempArtifact`] for the lifetime of the request and
//! released on every exit path: the guard's `Drop` covers early returns and
//! panics, the explicit release covers the normal path, and release is
//! idempotent so both may run.
//!
//! ## Branch behavior
//!
//! * **PDF** — extract embedded text. A loadable PDF with no text is a
//!   declared limitation (scanned document, no OCR here): the outcome is
//!   `ok:false` with a note, not an error. Otherwise the text goes to the
//!   analysis capability and its result is relayed.
//! * **Image** — validate/re-encode the buffer, then hand the data-URL to
//!   the vision capability. A capability rejection surfaces as a client
//!   error.
//! * **Unsupported** — well-formed request, recognised bytes, no handler:
//!   `ok:false` naming the resolved mime, again not an error.
//!
//! [`process_image`] is the short-circuit variant behind the
//! prompt-specialized image routes: no classification, the payload is an
//! image by contract, and the caller picks the instruction prompt.

use crate::analysis::AnalysisProvider;
use crate::config::ServiceConfig;
use crate::error::ProcessError;
use crate::pipeline::classify::{classify, ClassifiedDocument, KindHint, RawUpload};
use crate::pipeline::{artifact::TempArtifact, assure, codec, pdftext};
use serde_json::{json, Value};
use tracing::{debug, info};

/// One intake request as received from the HTTP surface.
#[derive(Debug)]
pub struct UploadRequest {
    pub base64: String,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub kind: Option<KindHint>,
}

/// Terminal outcome of the dispatch pipeline.
///
/// `ok: false` with a `note` is a declared limitation answered with
/// HTTP 200; hard failures travel as [`ProcessError`] instead.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub ok: bool,
    /// Detected kind, `"pdf"` or `"image"`, when classification succeeded.
    pub kind: Option<&'static str>,
    pub summary: Option<String>,
    pub structured: Option<Value>,
    pub note: Option<String>,
}

impl DispatchOutcome {
    fn limitation(kind: Option<&'static str>, note: impl Into<String>) -> Self {
        Self {
            ok: false,
            kind,
            summary: None,
            structured: None,
            note: Some(note.into()),
        }
    }
}

/// Process one upload end to end.
pub async fn process_upload(
    request: &UploadRequest,
    config: &ServiceConfig,
    provider: &dyn AnalysisProvider,
) -> Result<DispatchOutcome, ProcessError> {
    debug!("upload received (filename: {:?})", request.filename);

    // Received → Decoded
    let bytes = codec::decode(&request.base64)?;
    let envelope = codec::envelope_mime(&request.base64).map(str::to_string);
    debug!("decoded {} bytes", bytes.len());

    // The artifact lives for the rest of the request; its Drop guarantees
    // cleanup on every path out of this function.
    let label = request.filename.as_deref().unwrap_or("upload.bin");
    let mut artifact = TempArtifact::write(&config.uploads_dir, label, &bytes)?;

    // Decoded → Classified
    let upload = RawUpload {
        bytes,
        declared_mime: request.mime_type.clone(),
        envelope_mime: envelope,
        filename: request.filename.clone(),
        kind_hint: request.kind,
    };
    let outcome = match classify(upload) {
        Ok(doc) => dispatch_branch(doc, request, provider).await,
        // Recognised bytes, no handler: a limitation, not a failure.
        Err(ProcessError::UnsupportedType { mime }) => {
            info!("unsupported upload type: {mime}");
            Ok(DispatchOutcome::limitation(
                None,
                format!("tipo de contenido no soportado: {mime}"),
            ))
        }
        Err(e) => Err(e),
    };

    // Normal-path release; Drop already covered the `?` exits above.
    artifact.release();
    debug!("upload responded (ok: {:?})", outcome.as_ref().map(|o| o.ok));
    outcome
}

/// Result of one prompt-specialized image analysis.
#[derive(Debug)]
pub struct ImageAnalysisOutcome {
    /// Always JSON: the model's structured answer, or its prose wrapped
    /// under a `summary` key.
    pub structured: Value,
    /// Name the artifact was saved under while the request ran.
    pub file: String,
}

/// Analyze one base64 image with an explicit instruction prompt.
///
/// Same artifact discipline as [`process_upload`]: the decoded bytes are
/// persisted for the lifetime of the request and released on every path.
pub async fn process_image(
    base64: &str,
    prompt: &str,
    config: &ServiceConfig,
    provider: &dyn AnalysisProvider,
) -> Result<ImageAnalysisOutcome, ProcessError> {
    let bytes = codec::decode(base64)?;
    debug!("decoded {} bytes for prompted image analysis", bytes.len());

    let file = format!("image_{}.png", chrono::Utc::now().timestamp_millis());
    let mut artifact = TempArtifact::write(&config.uploads_dir, &file, &bytes)?;

    let assured = assure::ensure_image_data_url(&bytes)?;
    let analysis = provider
        .analyze_image_with_prompt(&assured.data_url, &assured.mime, prompt)
        .await?;

    artifact.release();
    let structured = analysis
        .structured
        .unwrap_or_else(|| json!({ "summary": analysis.summary }));
    Ok(ImageAnalysisOutcome { structured, file })
}

async fn dispatch_branch(
    doc: ClassifiedDocument,
    request: &UploadRequest,
    provider: &dyn AnalysisProvider,
) -> Result<DispatchOutcome, ProcessError> {
    if doc.is_pdf {
        return match pdftext::extract_text(&doc.bytes)? {
            None => {
                info!("PDF without embedded text, answering as declared limitation");
                Ok(DispatchOutcome::limitation(
                    Some("pdf"),
                    "el PDF no contiene texto extraíble (documento escaneado); OCR no disponible",
                ))
            }
            Some(text) => {
                let analysis = provider
                    .analyze_pdf_text(&text, request.filename.as_deref())
                    .await?;
                Ok(DispatchOutcome {
                    ok: true,
                    kind: Some("pdf"),
                    summary: analysis.summary,
                    structured: analysis.structured,
                    note: None,
                })
            }
        };
    }

    // Image branch: the only other way out of `classify` is is_image.
    let assured = assure::ensure_image_data_url(&doc.bytes)?;
    let analysis = provider
        .analyze_image(&assured.data_url, &assured.mime)
        .await?;
    Ok(DispatchOutcome {
        ok: true,
        kind: Some("image"),
        summary: analysis.summary,
        structured: analysis.structured,
        note: None,
    })
}
