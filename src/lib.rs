//! # credfuse
//!
//! Fuse a user-supplied overlay onto a credential template, drop the
//! overlay's near-white background, and produce a print-ready A4 PDF with
//! the credential centred at its physical size (86 × 120 mm).
//!
//! ## Pipeline Overview
//!
//! ```text
//! overlay (base64) ─┐
//!                   ├─ 1. Input     resolve base64 / URL / file to bytes
//! base (URL)  ──────┘
//!                      2. Decode    → RGBA PixelBuffer
//!                      3. Fit       overlay "cover"-resized to the base size
//!                      4. Mask      near-white overlay pixels → alpha 0
//!                      5. Blend     source-over onto the base
//!                      6. Encode    PNG (same W×H as the base)
//!                      7. Layout    A4 PDF, image at (175, 251) pt, 244×340 pt
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use credfuse::{FuseConfig, FuseService, ImageSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = FuseService::new(FuseConfig::default())?;
//!     let png = service
//!         .fuse(
//!             ImageSource::Url("https://example.com/template.png".into()),
//!             ImageSource::Path("signature.png".into()),
//!             None,
//!         )
//!         .await?;
//!     let pdf = service.render_pdf(ImageSource::Bytes(png)).await?;
//!     std::fs::write("credential.pdf", pdf)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP surface ([`server`]) |
//! | `cli`    | on      | `credfuse` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FuseConfig, FuseConfigBuilder, ResizeFilter, Tolerance};
pub use error::{ErrorKind, FuseError};
pub use pipeline::composite::Compositor;
pub use pipeline::decode::{decode_image, Dimensions, PixelBuffer};
pub use pipeline::encode::encode_png;
pub use pipeline::input::ImageSource;
pub use pipeline::layout::{mm_to_pt, render_pdf, PageSpec, Placement};
pub use pipeline::mask::mask_near_white;
pub use service::{fuse_sync, write_atomic, FuseService};
