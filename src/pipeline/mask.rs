//! Near-white removal: make bright pixels fully transparent.
//!
//! This is a stand-in for real background removal. A pixel is considered
//! background when its red, green **and** blue values are all at or above
//! the [`Tolerance`]; its alpha is then forced to 0. Colour channels are
//! left untouched, as is the alpha of every other pixel.
//!
//! Each pixel is decided on its own (no neighbourhood), so the pass is a
//! data-parallel map over 4-byte chunks and runs on the rayon pool. The
//! result is deterministic regardless of scheduling.

use crate::config::Tolerance;
use crate::pipeline::decode::{PixelBuffer, CHANNELS};
use rayon::prelude::*;
use tracing::debug;

/// Set alpha to 0 for every pixel with `r, g, b ≥ tolerance`, in place.
///
/// Returns the number of pixels that matched the threshold (including
/// ones that were already transparent).
pub fn mask_near_white(buf: &mut PixelBuffer, tolerance: Tolerance) -> usize {
    let t = tolerance.value();
    let masked = buf
        .as_bytes_mut()
        .par_chunks_exact_mut(CHANNELS as usize)
        .map(|px| {
            if px[0] >= t && px[1] >= t && px[2] >= t {
                px[3] = 0;
                1
            } else {
                0
            }
        })
        .sum::<usize>();
    debug!(
        "Masked {} of {} pixels at tolerance {}",
        masked,
        buf.width() as usize * buf.height() as usize,
        t
    );
    masked
}

/// Owned variant of [`mask_near_white`].
pub fn masked(mut buf: PixelBuffer, tolerance: Tolerance) -> PixelBuffer {
    mask_near_white(&mut buf, tolerance);
    buf
}
