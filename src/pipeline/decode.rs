//! Image decoding: encoded bytes (or base64 text) → RGBA [`PixelBuffer`].
//!
//! Every downstream stage works on 8-bit RGBA, so decoding normalises to
//! four channels up front. Sources without an alpha channel get an opaque
//! alpha of 255; palette, grey and 16-bit inputs are converted by `image`.

use crate::error::FuseError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageReader, RgbaImage};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use tracing::debug;

/// Number of interleaved channels in every [`PixelBuffer`].
pub const CHANNELS: u8 = 4;

static DATA_URI_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/\w+;base64,").expect("valid regex"));

/// Decoded RGBA pixels, row-major, no padding.
///
/// Invariant: `data.len() == width * height * channels`, with `channels`
/// always [`CHANNELS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes, checking the length invariant.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FuseError> {
        let expected = width as usize * height as usize * CHANNELS as usize;
        if data.len() != expected {
            return Err(FuseError::InvalidArgument(format!(
                "pixel buffer of {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A buffer where every pixel is `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        RgbaImage::from_pixel(width, height, image::Rgba(rgba)).into()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        CHANNELS
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// RGBA of the pixel at `(x, y)`.
    ///
    /// # Panics
    /// If the coordinates are out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(x < self.width && y < self.height, "pixel ({x},{y}) out of bounds");
        let i = (y as usize * self.width as usize + x as usize) * CHANNELS as usize;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// View as an `image` buffer for resampling and encoding.
    pub fn into_rgba_image(self) -> Result<RgbaImage, FuseError> {
        let (width, height, len) = (self.width, self.height, self.data.len());
        RgbaImage::from_raw(width, height, self.data).ok_or_else(|| {
            FuseError::Internal(format!(
                "pixel buffer of {width}x{height} holds {len} bytes"
            ))
        })
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}

impl From<DynamicImage> for PixelBuffer {
    fn from(img: DynamicImage) -> Self {
        img.into_rgba8().into()
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Strip an optional `data:image/<subtype>;base64,` header.
pub fn strip_data_uri(input: &str) -> &str {
    match DATA_URI_PREFIX.find(input) {
        Some(m) => &input[m.end()..],
        None => input,
    }
}

/// Base64-decode text, with or without a data-URI prefix.
///
/// Surrounding whitespace and embedded line breaks (as produced by MIME
/// encoders) are ignored.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, FuseError> {
    let payload: String = strip_data_uri(input.trim())
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| FuseError::decode("base64 payload", e))
}

/// Read image dimensions from the header without decoding pixels.
pub fn read_dimensions(bytes: &[u8], what: &str) -> Result<Dimensions, FuseError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FuseError::decode(what, e))?;
    if reader.format().is_none() {
        return Err(FuseError::decode(what, "unrecognised image format"));
    }
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| FuseError::decode(what, e))?;
    Ok(Dimensions { width, height })
}

/// Decode encoded image bytes into a 4-channel [`PixelBuffer`].
///
/// `what` names the input in error messages ("base image", "overlay", …).
pub fn decode_image(bytes: &[u8], what: &str) -> Result<PixelBuffer, FuseError> {
    if bytes.is_empty() {
        return Err(FuseError::decode(what, "input is empty"));
    }
    let img = image::load_from_memory(bytes).map_err(|e| FuseError::decode(what, e))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(FuseError::decode(
            what,
            format!("image has no pixels ({}x{})", img.width(), img.height()),
        ));
    }
    debug!(
        "Decoded {} → {}x{} ({:?})",
        what,
        img.width(),
        img.height(),
        img.color()
    );
    Ok(img.into())
}

/// Decode base64 text (optionally data-URI prefixed) straight to pixels.
pub fn decode_base64_image(input: &str, what: &str) -> Result<PixelBuffer, FuseError> {
    let bytes = decode_base64(input)?;
    decode_image(&bytes, what)
}
