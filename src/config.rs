//! Configuration types for credential fusion and print layout.
//!
//! Every per-process knob lives in [`FuseConfig`], built via its
//! [`FuseConfigBuilder`]. The config is read-only once built: the server
//! shares a single instance across all requests, and nothing in the
//! pipeline mutates it.
//!
//! The page geometry (A4 page, 86×120 mm credential slot) is deliberately
//! absent here. It is a fixed template, see [`crate::pipeline::layout`].

use crate::error::FuseError;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for the fusion and layout pipeline.
///
/// # Example
/// ```rust
/// use credfuse::{FuseConfig, ResizeFilter};
///
/// let config = FuseConfig::builder()
///     .tolerance(245)
///     .resize_filter(ResizeFilter::CatmullRom)
///     .download_timeout_secs(10)
///     .build()
///     .unwrap();
/// assert_eq!(config.tolerance.value(), 245);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuseConfig {
    /// Per-channel brightness threshold for background removal. Default: 250.
    ///
    /// A pixel whose red, green and blue values are all at or above this
    /// threshold becomes fully transparent. Callers may override it per
    /// request; this is the fallback.
    pub tolerance: Tolerance,

    /// Resampling kernel used to fit the overlay to the base canvas.
    /// Default: [`ResizeFilter::Lanczos3`].
    pub resize_filter: ResizeFilter,

    /// Timeout for fetching a remote base image, in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Largest accepted body for a fetched image, in bytes. Default: 20 MiB.
    pub max_download_bytes: usize,

    /// File name advertised in the PDF `Content-Disposition` header.
    /// Default: `Cedula_A4.pdf`.
    pub pdf_filename: String,
}

impl Default for FuseConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            resize_filter: ResizeFilter::default(),
            download_timeout_secs: 30,
            max_download_bytes: 20 * 1024 * 1024,
            pdf_filename: "Cedula_A4.pdf".to_string(),
        }
    }
}

impl FuseConfig {
    /// Create a new builder for `FuseConfig`.
    pub fn builder() -> FuseConfigBuilder {
        FuseConfigBuilder {
            config: Self::default(),
            tolerance: None,
        }
    }
}

/// Builder for [`FuseConfig`].
#[derive(Debug)]
pub struct FuseConfigBuilder {
    config: FuseConfig,
    tolerance: Option<i64>,
}

impl FuseConfigBuilder {
    /// Range-checked in [`build`](Self::build).
    pub fn tolerance(mut self, t: i64) -> Self {
        self.tolerance = Some(t);
        self
    }

    pub fn resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.config.resize_filter = filter;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_download_bytes(mut self, n: usize) -> Self {
        self.config.max_download_bytes = n;
        self
    }

    pub fn pdf_filename(mut self, name: impl Into<String>) -> Self {
        self.config.pdf_filename = name.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<FuseConfig, FuseError> {
        if let Some(t) = self.tolerance {
            self.config.tolerance =
                Tolerance::new(t).map_err(|e| FuseError::InvalidConfig(e.to_string()))?;
        }
        let c = &self.config;
        if c.download_timeout_secs == 0 {
            return Err(FuseError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_download_bytes == 0 {
            return Err(FuseError::InvalidConfig(
                "Maximum download size must be ≥ 1 byte".into(),
            ));
        }
        if c.pdf_filename.is_empty() || c.pdf_filename.contains(['"', '\r', '\n']) {
            return Err(FuseError::InvalidConfig(format!(
                "PDF filename {:?} is not usable in a Content-Disposition header",
                c.pdf_filename
            )));
        }
        Ok(self.config)
    }
}

// ── Tolerance ────────────────────────────────────────────────────────────

/// Brightness threshold (0–255) for near-white removal.
///
/// Out-of-range values are rejected with [`FuseError::InvalidArgument`],
/// never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Tolerance(u8);

impl Tolerance {
    /// Default threshold: 250.
    pub const DEFAULT: Tolerance = Tolerance(250);

    /// Validate a raw threshold.
    pub fn new(value: i64) -> Result<Self, FuseError> {
        u8::try_from(value).map(Tolerance).map_err(|_| {
            FuseError::InvalidArgument(format!("tolerance must be 0–255, got {value}"))
        })
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for Tolerance {
    fn from(v: u8) -> Self {
        Tolerance(v)
    }
}

impl TryFrom<i64> for Tolerance {
    type Error = FuseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Tolerance::new(value)
    }
}

impl From<Tolerance> for i64 {
    fn from(t: Tolerance) -> Self {
        i64::from(t.0)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Resampling kernel for the overlay "cover" resize.
///
/// | Filter | Notes |
/// |--------|-------|
/// | `Nearest` | Fastest; blocky on upscales |
/// | `Triangle` | Bilinear |
/// | `CatmullRom` | Bicubic |
/// | `Gaussian` | Soft |
/// | `Lanczos3` | Sharpest (default) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(f: ResizeFilter) -> Self {
        match f {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}
