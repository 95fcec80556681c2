//! Credential fusion: lay a masked overlay over a base template.
//!
//! ## Canvas rule
//!
//! The base image defines the canvas. The overlay is always resampled to
//! the base's `W×H`, never the reverse, so the output has exactly the
//! base's pixel dimensions whatever the overlay looked like.
//!
//! ## Fit mode
//!
//! The overlay is fitted with "cover": it is scaled uniformly until it
//! covers the whole frame, and the excess is cropped, centred on both axes.
//! Its aspect ratio is never distorted and no letterbox gaps appear. See
//! [`cover_crop`] for how the crop is computed before any resampling.
//!
//! ## Blending
//!
//! Straight (non-premultiplied) Porter-Duff source-over, evaluated per
//! channel in `[0, 1]` and rounded back to 8 bits:
//!
//! ```text
//! out.a   = src.a + dst.a·(1 − src.a)
//! out.rgb = (src.rgb·src.a + dst.rgb·dst.a·(1 − src.a)) / out.a
//! ```
//!
//! For an opaque base (`dst.a = 1`, the credential case) this reduces to
//! `src.rgb·src.a + dst.rgb·(1 − src.a)`.

use crate::config::{FuseConfig, ResizeFilter, Tolerance};
use crate::error::FuseError;
use crate::pipeline::decode::{self, Dimensions, PixelBuffer, CHANNELS};
use crate::pipeline::{encode, mask};
use image::imageops;
use rayon::prelude::*;
use tracing::{debug, info};

/// Stateless fusion engine.
///
/// Holds only the two knobs that shape the output; cheap to copy into a
/// blocking task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compositor {
    pub tolerance: Tolerance,
    pub filter: ResizeFilter,
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::DEFAULT,
            filter: ResizeFilter::default(),
        }
    }
}

impl Compositor {
    pub fn new(tolerance: Tolerance, filter: ResizeFilter) -> Self {
        Self { tolerance, filter }
    }

    pub fn from_config(config: &FuseConfig) -> Self {
        Self::new(config.tolerance, config.resize_filter)
    }

    /// Fuse two encoded images and return the result as PNG bytes.
    ///
    /// # Errors
    /// - [`FuseError::Decode`] if either input is not a supported image
    /// - [`FuseError::InvalidBaseImage`] if the base has a zero dimension
    /// - [`FuseError::Encode`] if the PNG cannot be written
    pub fn fuse(&self, base: &[u8], overlay: &[u8]) -> Result<Vec<u8>, FuseError> {
        let fused = self.fuse_pixels(base, overlay)?;
        encode::encode_png(fused)
    }

    /// Same as [`fuse`](Self::fuse) but stops before encoding.
    pub fn fuse_pixels(&self, base: &[u8], overlay: &[u8]) -> Result<PixelBuffer, FuseError> {
        // ── Step 1: Canvas size from the base header ─────────────────────
        // Decoders already reject zero-sized headers as `Decode`; this
        // guards formats that do not.
        let canvas = decode::read_dimensions(base, "base image")?;
        if canvas.width == 0 || canvas.height == 0 {
            return Err(FuseError::InvalidBaseImage {
                width: canvas.width,
                height: canvas.height,
            });
        }

        // ── Step 2: Base pixels, at canvas size ──────────────────────────
        // Decoded before the overlay is fitted, so the canvas is backed by
        // an allocation the decoder's limits already accepted.
        let base = decode::decode_image(base, "base image")?;
        let mut base = resize_exact(base, canvas, self.filter)?;

        // ── Step 3: Overlay, cover-fitted to the canvas ──────────────────
        let overlay = decode::decode_image(overlay, "overlay image")?;
        let overlay_dims = overlay.dimensions();
        let mut overlay = fit_cover(overlay, canvas, self.filter)?;
        debug!(
            "Overlay {}x{} cover-fitted to {}x{}",
            overlay_dims.width, overlay_dims.height, canvas.width, canvas.height
        );

        // ── Step 4: Strip near-white background ──────────────────────────
        mask::mask_near_white(&mut overlay, self.tolerance);

        // ── Step 5: Source-over ──────────────────────────────────────────
        blend_over(&mut base, &overlay)?;

        info!(
            "Fused credential {}x{} (tolerance {})",
            canvas.width, canvas.height, self.tolerance
        );
        Ok(base)
    }
}

/// Centred crop rectangle `(x, y, width, height)` of `src` with the
/// aspect ratio of `target`.
///
/// Scaling this rectangle to `target` is the same as scaling the whole of
/// `src` to cover `target` and trimming the overflow, without ever
/// materialising the oversized intermediate.
pub fn cover_crop(src: Dimensions, target: Dimensions) -> (u32, u32, u32, u32) {
    let (sw, sh) = (u64::from(src.width), u64::from(src.height));
    let (tw, th) = (u64::from(target.width), u64::from(target.height));
    let (cw, ch) = if sw * th > sh * tw {
        // Wider than the target: keep full height, trim the sides.
        (((sh * tw + th / 2) / th).clamp(1, sw), sh)
    } else {
        (sw, ((sw * th + tw / 2) / tw).clamp(1, sh))
    };
    // All four values are bounded by the u32 source dimensions.
    (
        ((sw - cw) / 2) as u32,
        ((sh - ch) / 2) as u32,
        cw as u32,
        ch as u32,
    )
}

/// Scale `img` uniformly to cover `target`, cropping the excess around
/// the centre.
///
/// The crop happens first, so the work is bounded by the sizes of `img`
/// and `target` whatever their aspect ratios.
pub fn fit_cover(
    img: PixelBuffer,
    target: Dimensions,
    filter: ResizeFilter,
) -> Result<PixelBuffer, FuseError> {
    if img.dimensions() == target {
        return Ok(img);
    }
    let (x, y, w, h) = cover_crop(img.dimensions(), target);
    let src = img.into_rgba_image()?;
    let cropped = imageops::crop_imm(&src, x, y, w, h).to_image();
    if cropped.dimensions() == (target.width, target.height) {
        return Ok(cropped.into());
    }
    Ok(imageops::resize(&cropped, target.width, target.height, filter.into()).into())
}

/// Resample `img` to exactly `target`; a no-op when already that size.
pub fn resize_exact(
    img: PixelBuffer,
    target: Dimensions,
    filter: ResizeFilter,
) -> Result<PixelBuffer, FuseError> {
    if img.dimensions() == target {
        return Ok(img);
    }
    Ok(imageops::resize(
        &img.into_rgba_image()?,
        target.width,
        target.height,
        filter.into(),
    )
    .into())
}

/// Composite `src` over `dst` in place. Both must share dimensions.
pub fn blend_over(dst: &mut PixelBuffer, src: &PixelBuffer) -> Result<(), FuseError> {
    if dst.dimensions() != src.dimensions() {
        return Err(FuseError::Internal(format!(
            "blend size mismatch: {}x{} vs {}x{}",
            dst.width(),
            dst.height(),
            src.width(),
            src.height()
        )));
    }
    let n = CHANNELS as usize;
    dst.as_bytes_mut()
        .par_chunks_exact_mut(n)
        .zip(src.as_bytes().par_chunks_exact(n))
        .for_each(|(d, s)| over_pixel(d, s));
    Ok(())
}

fn over_pixel(dst: &mut [u8], src: &[u8]) {
    match src[3] {
        0 => {}
        255 => dst.copy_from_slice(src),
        sa => {
            let sa = f32::from(sa) / 255.0;
            let da = f32::from(dst[3]) / 255.0;
            let oa = sa + da * (1.0 - sa);
            for c in 0..3 {
                let s = f32::from(src[c]) / 255.0;
                let d = f32::from(dst[c]) / 255.0;
                let v = (s * sa + d * da * (1.0 - sa)) / oa;
                dst[c] = to_u8(v);
            }
            dst[3] = to_u8(oa);
        }
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}
