//! Magic-byte sniffing: classify a byte buffer into a closed set of formats.
//!
//! Client-supplied MIME types and file extensions are untrustworthy input —
//! browsers mislabel, proxies rewrite, and users rename files. The first few
//! bytes of the buffer are the only signal the client cannot fake by
//! accident, so this verdict is what the resolver falls back on when the
//! explicit hints are absent.
//!
//! Pure function over the first 12 bytes, no I/O.

/// Fallback mime for unrecognised buffers.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// PDF header: ASCII `%PDF-`.
const PDF_MAGIC: &[u8] = b"%PDF-";
/// JPEG SOI marker plus the first 0xFF of the next segment.
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
/// The full 8-byte PNG signature.
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Classify a buffer by its magic-byte prefix.
///
/// Signatures are checked in a fixed order, first match wins; anything
/// unrecognised comes back as [`OCTET_STREAM`]. The result depends only on
/// the bytes, never on any client hint.
pub fn sniff(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(PDF_MAGIC) {
        return "application/pdf";
    }
    if bytes.starts_with(JPEG_MAGIC) {
        return "image/jpeg";
    }
    if bytes.starts_with(PNG_MAGIC) {
        return "image/png";
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return "image/gif";
    }
    // RIFF container: bytes 0–3 "RIFF", 8–11 "WEBP" (4–7 are the chunk size).
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return "image/webp";
    }
    OCTET_STREAM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_pdf() {
        assert_eq!(sniff(b"%PDF-1.7 rest of file"), "application/pdf");
    }

    #[test]
    fn recognises_jpeg() {
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]), "image/jpeg");
    }

    #[test]
    fn recognises_png() {
        let mut buf = PNG_MAGIC.to_vec();
        buf.extend_from_slice(&[0, 0, 0, 13]);
        assert_eq!(sniff(&buf), "image/png");
    }

    #[test]
    fn recognises_both_gif_variants() {
        assert_eq!(sniff(b"GIF87a......"), "image/gif");
        assert_eq!(sniff(b"GIF89a......"), "image/gif");
    }

    #[test]
    fn recognises_webp_riff_container() {
        assert_eq!(sniff(b"RIFF\x24\x00\x00\x00WEBPVP8 "), "image/webp");
    }

    #[test]
    fn riff_without_webp_tag_is_unknown() {
        // RIFF is also the container for WAV.
        assert_eq!(sniff(b"RIFF\x24\x00\x00\x00WAVEfmt "), OCTET_STREAM);
    }

    #[test]
    fn unknown_and_short_buffers_fall_through() {
        assert_eq!(sniff(b"PK\x03\x04 zip file"), OCTET_STREAM);
        assert_eq!(sniff(b""), OCTET_STREAM);
        assert_eq!(sniff(b"%PD"), OCTET_STREAM);
    }
}
