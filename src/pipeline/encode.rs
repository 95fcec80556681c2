//! Image encoding: [`PixelBuffer`] → PNG bytes (optionally base64).
//!
//! PNG is the only output format. It is lossless, keeps the alpha channel
//! the masking stage produced, and is what the PDF stage expects to embed.

use crate::error::FuseError;
use crate::pipeline::decode::PixelBuffer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// MIME type of [`encode_png`] output.
pub const PNG_MIME: &str = "image/png";

/// Encode RGBA pixels as a PNG byte stream.
pub fn encode_png(buf: PixelBuffer) -> Result<Vec<u8>, FuseError> {
    let img = buf.into_rgba_image()?;
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| FuseError::encode("PNG", e))?;
    if out.is_empty() {
        return Err(FuseError::encode("PNG", "encoder produced no bytes"));
    }
    debug!("Encoded {}x{} → {} bytes PNG", img.width(), img.height(), out.len());
    Ok(out)
}

/// Wrap encoded PNG bytes as a `data:image/png;base64,` URI.
pub fn to_data_uri(png: &[u8]) -> String {
    format!("data:{PNG_MIME};base64,{}", STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::decode::{decode_base64_image, decode_image};

    #[test]
    fn encode_small_image() {
        let png = encode_png(PixelBuffer::filled(10, 10, [255, 0, 0, 255])).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn png_keeps_alpha() {
        let png = encode_png(PixelBuffer::filled(2, 3, [9, 8, 7, 0])).unwrap();
        let back = decode_image(&png, "png").unwrap();
        assert_eq!((back.width(), back.height()), (2, 3));
        assert_eq!(back.pixel(1, 2), [9, 8, 7, 0]);
    }

    #[test]
    fn data_uri_is_decodable() {
        let png = encode_png(PixelBuffer::filled(1, 1, [1, 1, 1, 255])).unwrap();
        let uri = to_data_uri(&png);
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(decode_base64_image(&uri, "uri").unwrap().pixel(0, 0), [1, 1, 1, 255]);
    }
}
