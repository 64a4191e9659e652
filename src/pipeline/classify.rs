//! Classification: merge client hints and the sniffer verdict into one type.
//!
//! Five signals can describe an upload's type and any one of them can be
//! absent or wrong: the explicit `kind` field, the declared `mimeType`, the
//! mime embedded in a data-URL envelope, the magic-byte sniff, and the
//! filename extension. They are merged under a strict precedence order,
//! most-specific-intent first:
//!
//! 1. **`kind` hint** — the caller said outright "this is a pdf/image".
//! 2. **Declared `mimeType`** — an explicit field, parameters truncated at `;`.
//! 3. **Envelope mime** — whatever the data-URL prefix carried.
//! 4. **Magic-byte sniff** — authoritative over nothing explicit, but the
//!    only signal left when the caller sent bare base64 with no hints.
//! 5. **Filename extension** — last resort.
//!
//! A deliberate consequence: an explicit hint overrides the sniffer even
//! when the bytes disagree (declared `image/png` on a real PDF resolves to
//! `image/png`). Downstream consumers rely on the declared-type override for
//! intentionally mislabeled fixtures, so the contradiction is preserved,
//! not corrected.

use crate::error::ProcessError;
use crate::pipeline::sniff::{self, OCTET_STREAM};
use serde::{Deserialize, Serialize};

/// Client-supplied coarse type hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindHint {
    Image,
    Pdf,
}

/// One decoded upload plus every hint the request carried.
///
/// Request-scoped; owned exclusively by the dispatcher.
#[derive(Debug)]
pub struct RawUpload {
    pub bytes: Vec<u8>,
    pub declared_mime: Option<String>,
    pub envelope_mime: Option<String>,
    pub filename: Option<String>,
    pub kind_hint: Option<KindHint>,
}

/// An upload with its final resolved type. Immutable once produced:
/// exactly one of `is_pdf` / `is_image` is true, or the upload was rejected
/// before this value existed.
#[derive(Debug)]
pub struct ClassifiedDocument {
    pub bytes: Vec<u8>,
    pub resolved_mime: String,
    pub is_pdf: bool,
    pub is_image: bool,
}

/// Resolve the final mime for an upload from all five signals.
///
/// Pure function; exposed separately from [`classify`] so the precedence
/// table can be tested without building buffers. The result is
/// ASCII-lowercased, so declared types like `Application/PDF` match the
/// handler checks.
pub fn resolve_mime(
    declared_mime: Option<&str>,
    envelope_mime: Option<&str>,
    sniffed_mime: &str,
    filename: Option<&str>,
    kind_hint: Option<KindHint>,
) -> String {
    // 1) Explicit kind hint.
    match kind_hint {
        Some(KindHint::Pdf) => return "application/pdf".to_string(),
        Some(KindHint::Image) => {
            // The caller committed to "image"; keep the most specific image
            // mime available, defaulting to PNG like the assurance stage.
            let specific = [declared_mime.map(truncate_params), envelope_mime, Some(sniffed_mime)]
                .into_iter()
                .flatten()
                .map(|m| m.to_ascii_lowercase())
                .find(|m| m.starts_with("image/"));
            return specific.unwrap_or_else(|| "image/png".to_string());
        }
        None => {}
    }

    // 2) Declared mimeType field, parameter suffix stripped.
    if let Some(m) = declared_mime.map(truncate_params).filter(|m| !m.is_empty()) {
        return m.to_ascii_lowercase();
    }

    // 3) Data-URL envelope mime.
    if let Some(m) = envelope_mime.filter(|m| !m.is_empty()) {
        return m.to_ascii_lowercase();
    }

    // 4) Magic bytes.
    if sniffed_mime != OCTET_STREAM {
        return sniffed_mime.to_string();
    }

    // 5) Filename extension, last resort.
    if let Some(m) = filename.and_then(extension_mime) {
        return m.to_string();
    }

    OCTET_STREAM.to_string()
}

/// Classify an upload, consuming it into a [`ClassifiedDocument`] or
/// rejecting types with no handler.
pub fn classify(upload: RawUpload) -> Result<ClassifiedDocument, ProcessError> {
    let sniffed = sniff::sniff(&upload.bytes);
    let resolved_mime = resolve_mime(
        upload.declared_mime.as_deref(),
        upload.envelope_mime.as_deref(),
        sniffed,
        upload.filename.as_deref(),
        upload.kind_hint,
    );

    let is_pdf = resolved_mime == "application/pdf";
    let is_image = resolved_mime.starts_with("image/");

    if !is_pdf && !is_image {
        return Err(ProcessError::UnsupportedType {
            mime: resolved_mime,
        });
    }

    Ok(ClassifiedDocument {
        bytes: upload.bytes,
        resolved_mime,
        is_pdf,
        is_image,
    })
}

/// Truncate a mime at the first `;`, dropping parameters like
/// `; charset=binary`.
fn truncate_params(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

/// Map a filename extension to a mime for the formats we handle.
fn extension_mime(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
