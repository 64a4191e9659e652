//! PDF text extraction from an in-memory buffer.
//!
//! Only text embedded in the PDF's content streams is extracted — a scanned
//! document rasterised into page images yields nothing here, and that is a
//! declared capability boundary (the dispatcher answers `ok:false` with a
//! note, not an error). No OCR happens in this crate.

use crate::error::ProcessError;
use lopdf::Document;
use tracing::debug;

/// Extract embedded text from PDF bytes, pages concatenated in order.
///
/// Returns `Ok(None)` when the document loads but carries no extractable
/// text (scanned / image-only PDF). A buffer `lopdf` cannot parse at all is
/// a decode error: the client claimed PDF and sent something corrupt.
pub fn extract_text(bytes: &[u8]) -> Result<Option<String>, ProcessError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ProcessError::Decode(format!("corrupt PDF: {e}")))?;

    let mut page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();

    let mut out = String::new();
    for page_num in page_numbers {
        // Per-page extraction failures are skipped rather than fatal: one
        // broken content stream should not hide the rest of the document.
        if let Ok(text) = doc.extract_text(&[page_num]) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                if !out.is_empty() {
                    out.push_str("\n\n");
                }
                out.push_str(trimmed);
            }
        }
    }

    if out.is_empty() {
        debug!("PDF loaded but yielded no embedded text");
        Ok(None)
    } else {
        debug!("extracted {} chars of embedded PDF text", out.len());
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_pdf_is_a_decode_error() {
        let err = extract_text(b"%PDF-1.4 but the rest is garbage").unwrap_err();
        assert!(matches!(err, ProcessError::Decode(_)));
    }

    #[test]
    fn empty_document_yields_none() {
        // A structurally valid PDF with one empty page.
        let bytes = crate::render::tests_support::minimal_pdf_without_text();
        assert_eq!(extract_text(&bytes).unwrap(), None);
    }

    #[test]
    fn text_document_yields_page_text() {
        let bytes = crate::render::tests_support::minimal_pdf_with_text("Hola factura");
        let text = extract_text(&bytes).unwrap().expect("text expected");
        assert!(text.contains("Hola factura"), "got: {text}");
    }
}
