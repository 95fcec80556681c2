//! Pipeline stages for credential fusion and print layout.
//!
//! Each submodule implements exactly one transformation step, and every
//! step is a synchronous pure function of its inputs except [`input`],
//! which may touch the network or the file system.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ decode ──▶ composite ──▶ encode ──▶ layout
//! (bytes)   (RGBA)     (mask+over)   (PNG)      (PDF)
//! ```
//!
//! 1. [`input`]    : resolve base64 / URL / file / bytes to encoded bytes
//! 2. [`decode`]   : decode to a 4-channel [`decode::PixelBuffer`]
//! 3. [`mask`]     : make near-white pixels transparent (data-parallel)
//! 4. [`composite`]: cover-fit the overlay, mask it, blend it over the base
//! 5. [`encode`]   : PNG-encode the result
//! 6. [`layout`]   : place the PNG on an A4 page and write the PDF

pub mod composite;
pub mod decode;
pub mod encode;
pub mod input;
pub mod layout;
pub mod mask;
