//! Print layout: one A4 page, white background, credential image centred
//! at its physical size.
//!
//! ## Units
//!
//! PDF user space is measured in points (72 per inch). The template is
//! specified in millimetres and converted with [`mm_to_pt`], which rounds
//! each dimension on its own:
//!
//! | Item | mm | pt |
//! |------|----|----|
//! | Page width  | 210 | 595 |
//! | Page height | 297 | 842 |
//! | Slot width  | 86  | 244 |
//! | Slot height | 120 | 340 |
//!
//! Centring also rounds, so when the free space is odd the image sits up to
//! 1 pt off true centre.
//!
//! ## Coordinates
//!
//! [`Placement`] is expressed top-left (distance from the page's left and
//! top edges). PDF's origin is bottom-left, so the writer flips `y` when it
//! builds the image transform.

use crate::error::FuseError;
use crate::pipeline::decode::{self, PixelBuffer};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, TextStr};
use std::io::Write;
use tracing::{debug, info};

/// MIME type of [`render_pdf`] output.
pub const PDF_MIME: &str = "application/pdf";

/// A4 page size in millimetres.
pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;

/// Credential slot size in millimetres.
pub const CONTENT_WIDTH_MM: f64 = 86.0;
pub const CONTENT_HEIGHT_MM: f64 = 120.0;

const MM_PER_INCH: f64 = 25.4;
const PT_PER_INCH: f64 = 72.0;

const IMAGE_NAME: Name<'static> = Name(b"Im1");

/// Convert millimetres to whole PDF points.
pub fn mm_to_pt(mm: f64) -> u32 {
    (mm / MM_PER_INCH * PT_PER_INCH).round() as u32
}

/// Page and content sizes in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page_width_pt: u32,
    pub page_height_pt: u32,
    pub content_width_pt: u32,
    pub content_height_pt: u32,
}

impl PageSpec {
    /// The fixed A4 / 86×120 mm template.
    pub fn a4_credential() -> Self {
        Self {
            page_width_pt: mm_to_pt(PAGE_WIDTH_MM),
            page_height_pt: mm_to_pt(PAGE_HEIGHT_MM),
            content_width_pt: mm_to_pt(CONTENT_WIDTH_MM),
            content_height_pt: mm_to_pt(CONTENT_HEIGHT_MM),
        }
    }

    /// Offsets that centre the content rectangle on the page.
    pub fn placement(&self) -> Placement {
        let centre = |page: u32, content: u32| {
            ((f64::from(page) - f64::from(content)) / 2.0).round() as u32
        };
        Placement {
            left: centre(self.page_width_pt, self.content_width_pt),
            top: centre(self.page_height_pt, self.content_height_pt),
        }
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self::a4_credential()
    }
}

/// Top-left offset of the content rectangle, in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub left: u32,
    pub top: u32,
}

/// Lay out an encoded image on the A4 template and return PDF bytes.
///
/// The image is stretched to exactly the slot size; it is expected to have
/// the slot's aspect ratio already.
///
/// # Errors
/// [`FuseError::Decode`] if `content` is not a supported image.
pub fn render_pdf(content: &[u8]) -> Result<Vec<u8>, FuseError> {
    let pixels = decode::decode_image(content, "content image")?;
    render_pdf_pixels(&PageSpec::a4_credential(), &pixels)
}

/// Lay out already-decoded pixels on `spec`.
///
/// # Errors
/// [`FuseError::Encode`] if a stream cannot be compressed.
pub fn render_pdf_pixels(spec: &PageSpec, pixels: &PixelBuffer) -> Result<Vec<u8>, FuseError> {
    let placement = spec.placement();
    let page_w = spec.page_width_pt as f32;
    let page_h = spec.page_height_pt as f32;
    let slot_w = spec.content_width_pt as f32;
    let slot_h = spec.content_height_pt as f32;

    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let content_id = Ref::new(4);
    let image_id = Ref::new(5);
    let smask_id = Ref::new(6);
    let info_id = Ref::new(7);

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id).kids([page_id]).count(1);

    {
        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, page_w, page_h));
        page.parent(page_tree_id);
        page.contents(content_id);
        page.resources().x_objects().pair(IMAGE_NAME, image_id);
        page.finish();
    }

    // ── Image XObject (RGB + optional soft mask) ─────────────────────────
    let (rgb, alpha) = split_alpha(pixels);
    let has_alpha = alpha.iter().any(|&a| a != u8::MAX);
    if has_alpha {
        let data = deflate(&alpha)?;
        let mut smask = pdf.image_xobject(smask_id, &data);
        smask.filter(Filter::FlateDecode);
        smask.width(pixels.width() as i32);
        smask.height(pixels.height() as i32);
        smask.color_space().device_gray();
        smask.bits_per_component(8);
        smask.finish();
    }
    {
        let data = deflate(&rgb)?;
        let mut image = pdf.image_xobject(image_id, &data);
        image.filter(Filter::FlateDecode);
        image.width(pixels.width() as i32);
        image.height(pixels.height() as i32);
        image.color_space().device_rgb();
        image.bits_per_component(8);
        if has_alpha {
            image.s_mask(smask_id);
        }
        image.finish();
    }

    // ── Page content: white fill, then the placed image ──────────────────
    let x = placement.left as f32;
    let y = page_h - placement.top as f32 - slot_h;
    let mut content = Content::new();
    content.set_fill_rgb(1.0, 1.0, 1.0);
    content.rect(0.0, 0.0, page_w, page_h);
    content.fill_nonzero();
    content.save_state();
    content.transform([slot_w, 0.0, 0.0, slot_h, x, y]);
    content.x_object(IMAGE_NAME);
    content.restore_state();
    let stream = deflate(&content.finish())?;
    pdf.stream(content_id, &stream).filter(Filter::FlateDecode);

    pdf.document_info(info_id)
        .title(TextStr("Credential"))
        .producer(TextStr(concat!("credfuse ", env!("CARGO_PKG_VERSION"))));

    let bytes = pdf.finish();
    debug!(
        "Placed {}x{} px image at ({}, {}) pt, {}x{} pt",
        pixels.width(),
        pixels.height(),
        placement.left,
        placement.top,
        spec.content_width_pt,
        spec.content_height_pt
    );
    info!("Rendered {}x{} pt PDF ({} bytes)", spec.page_width_pt, spec.page_height_pt, bytes.len());
    Ok(bytes)
}

/// Split interleaved RGBA into an RGB plane and an alpha plane.
fn split_alpha(pixels: &PixelBuffer) -> (Vec<u8>, Vec<u8>) {
    let count = pixels.width() as usize * pixels.height() as usize;
    let mut rgb = Vec::with_capacity(count * 3);
    let mut alpha = Vec::with_capacity(count);
    for px in pixels.as_bytes().chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
        alpha.push(px[3]);
    }
    (rgb, alpha)
}

/// Zlib-compress a stream body for `/FlateDecode`.
fn deflate(data: &[u8]) -> Result<Vec<u8>, FuseError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| FuseError::encode("PDF stream", e))?;
    encoder
        .finish()
        .map_err(|e| FuseError::encode("PDF stream", e))
}
