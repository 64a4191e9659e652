//! Error types for the prefactura library.
//!
//! One enum covers the whole request taxonomy because every failure here is
//! request-scoped and maps 1:1 to an HTTP class in the server layer:
//!
//! * 400-class — the client sent something we cannot use
//!   ([`ProcessError::Decode`], [`ProcessError::Validation`],
//!   [`ProcessError::AnalysisRejected`]).
//! * 200 with `ok:false` — the request was well-formed but the content is a
//!   declared capability boundary, not a fault
//!   ([`ProcessError::UnsupportedType`] and the scanned-PDF path in
//!   [`crate::pipeline::dispatch`]).
//! * 500-class — something on our side or behind us broke
//!   ([`ProcessError::AnalysisFailed`], [`ProcessError::RenderFailed`],
//!   [`ProcessError::Internal`]).
//!
//! Capability errors are relayed verbatim: the core never retries, and it
//! never rewrites a provider message (the caller debugging a bad upload wants
//! the provider's own words).

use thiserror::Error;

/// All errors produced by the intake and invoice pipelines.
#[derive(Debug, Error)]
pub enum ProcessError {
    // ── Input errors (client, 400) ────────────────────────────────────────
    /// The `base64` field was empty, not valid base64, or implausibly short.
    #[error("invalid base64 payload: {0}")]
    Decode(String),

    /// Required invoice fields are missing (receiver name / empty items).
    #[error("invalid invoice payload: {0}")]
    Validation(String),

    /// The analysis capability looked at the input and refused it.
    #[error("analysis rejected the input: {0}")]
    AnalysisRejected(String),

    // ── Declared limitations (200 with ok:false) ──────────────────────────
    /// Bytes were recognised but no handler exists for the resolved type.
    #[error("unsupported content type: {mime}")]
    UnsupportedType { mime: String },

    // ── Server-side errors (500) ──────────────────────────────────────────
    /// The analysis capability was unreachable or faulted internally.
    #[error("analysis capability failed: {0}")]
    AnalysisFailed(String),

    /// The PDF renderer could not produce a document.
    #[error("prefactura rendering failed: {0}")]
    RenderFailed(String),

    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcessError {
    /// True for failures attributable to the request body rather than the
    /// service (the server layer answers these with a 400).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ProcessError::Decode(_)
                | ProcessError::Validation(_)
                | ProcessError::AnalysisRejected(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_is_client_error() {
        assert!(ProcessError::Decode("empty".into()).is_client_error());
        assert!(ProcessError::Validation("no items".into()).is_client_error());
    }

    #[test]
    fn capability_failure_is_not_client_error() {
        assert!(!ProcessError::AnalysisFailed("timeout".into()).is_client_error());
        assert!(!ProcessError::RenderFailed("font".into()).is_client_error());
    }

    #[test]
    fn unsupported_display_names_the_mime() {
        let e = ProcessError::UnsupportedType {
            mime: "application/zip".into(),
        };
        assert!(e.to_string().contains("application/zip"));
    }
}
