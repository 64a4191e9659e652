//! Base64 codec: untrusted upload string → raw byte buffer.
//!
//! Uploads arrive either as bare base64 or wrapped in a
//! `data:<mime>;base64,<payload>` envelope, frequently with line breaks
//! inserted by whatever serialised them. Everything is normalised here so
//! the rest of the pipeline only ever sees clean bytes: envelope stripped,
//! whitespace removed, then decoded with the strict `STANDARD` engine.
//!
//! A buffer under [`MIN_PLAUSIBLE_LEN`] bytes is rejected outright — no real
//! image or PDF is that small, and catching truncated uploads here yields a
//! clear 400 instead of a confusing sniffer miss downstream.

use crate::error::ProcessError;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Smallest byte count we accept as a non-corrupt upload.
pub const MIN_PLAUSIBLE_LEN: usize = 10;

/// Decode an upload string into raw bytes.
///
/// Accepts bare base64 or a full data-URL; strips the envelope and all
/// ASCII whitespace before decoding.
pub fn decode(input: &str) -> Result<Vec<u8>, ProcessError> {
    let payload = strip_envelope(input).unwrap_or(input);
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if compact.is_empty() {
        return Err(ProcessError::Decode("empty base64 payload".into()));
    }

    let bytes = STANDARD
        .decode(&compact)
        .map_err(|e| ProcessError::Decode(format!("not valid base64: {e}")))?;

    if bytes.len() < MIN_PLAUSIBLE_LEN {
        return Err(ProcessError::Decode(format!(
            "decoded payload is implausibly short ({} bytes)",
            bytes.len()
        )));
    }

    Ok(bytes)
}

/// Encode bytes as bare base64 for JSON responses.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Return the mime token embedded in a data-URL envelope, without decoding
/// the payload. `None` when the input is bare base64.
pub fn envelope_mime(input: &str) -> Option<&str> {
    let rest = input.strip_prefix("data:")?;
    let (mime, _) = rest.split_once(";base64,")?;
    if mime.is_empty() {
        None
    } else {
        Some(mime)
    }
}

/// Strip a `data:<mime>;base64,` envelope, returning the raw payload.
fn strip_envelope(input: &str) -> Option<&str> {
    let rest = input.strip_prefix("data:")?;
    let (_, payload) = rest.split_once(";base64,")?;
    Some(payload)
}
