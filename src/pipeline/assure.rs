//! Image assurance: validate the buffer and produce a vision-ready data-URL.
//!
//! The resolved mime is a claim, not a guarantee — precedence lets an
//! explicit hint override the bytes. Before spending a vision-API call we
//! verify the buffer actually decodes as an image, take the *detected*
//! format as the mime for the data-URL, and re-encode anything outside the
//! supported set to PNG (lossless, and every vision API accepts it).
//!
//! A buffer that does not decode at all is a client error: the upload was
//! labeled an image and isn't one.

use crate::error::ProcessError;
use crate::pipeline::codec;
use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// Image formats forwarded to the vision capability as-is.
const SUPPORTED: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Gif,
];

/// A validated image ready for the vision capability.
#[derive(Debug)]
pub struct AssuredImage {
    /// `data:<mime>;base64,<payload>` with the *detected* mime.
    pub data_url: String,
    /// The mime actually sent, after any re-encode.
    pub mime: String,
}

/// Validate an image buffer and wrap it in a data-URL.
///
/// Unsupported-but-decodable formats (BMP, TIFF, ...) are re-encoded to PNG;
/// undecodable buffers are rejected.
pub fn ensure_image_data_url(bytes: &[u8]) -> Result<AssuredImage, ProcessError> {
    let format = image::guess_format(bytes)
        .map_err(|_| ProcessError::AnalysisRejected("buffer is not a valid image".into()))?;

    if SUPPORTED.contains(&format) {
        let mime = format_mime(format);
        debug!("image passes through as {mime}");
        return Ok(AssuredImage {
            data_url: format!("data:{mime};base64,{}", codec::encode(bytes)),
            mime: mime.to_string(),
        });
    }

    // Known container but not one the vision API takes: re-encode to PNG.
    let img = image::load_from_memory(bytes).map_err(|e| {
        ProcessError::AnalysisRejected(format!("image could not be decoded: {e}"))
    })?;
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ProcessError::Internal(format!("PNG re-encode failed: {e}")))?;
    debug!("re-encoded {format:?} image to PNG ({} bytes)", buf.len());

    Ok(AssuredImage {
        data_url: format!("data:image/png;base64,{}", codec::encode(&buf)),
        mime: "image/png".to_string(),
    })
}

fn format_mime(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 128, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn valid_png_passes_through() {
        let bytes = png_bytes();
        let assured = ensure_image_data_url(&bytes).unwrap();
        assert_eq!(assured.mime, "image/png");
        assert!(assured.data_url.starts_with("data:image/png;base64,"));
        // Payload round-trips to the original bytes (no re-encode).
        let payload = assured.data_url.split(',').nth(1).unwrap();
        assert_eq!(codec::decode(payload).unwrap(), bytes);
    }

    #[test]
    fn garbage_is_rejected_as_client_error() {
        let err = ensure_image_data_url(b"definitely not an image").unwrap_err();
        assert!(err.is_client_error(), "got {err:?}");
    }

    #[test]
    fn pdf_bytes_are_not_an_image() {
        let err = ensure_image_data_url(b"%PDF-1.7 not an image at all").unwrap_err();
        assert!(matches!(err, ProcessError::AnalysisRejected(_)));
    }
}
