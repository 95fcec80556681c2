//! Error types for the credfuse library.
//!
//! Every pipeline stage fails fast: a request either produces a complete
//! PNG / PDF or a single [`FuseError`]. There is no partial-result type.
//!
//! [`FuseError::kind`] collapses the variants into the coarse taxonomy the
//! HTTP layer exposes to callers. Retrieval problems and undecodable bytes
//! always land in different kinds.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the credfuse library.
#[derive(Debug, Error)]
pub enum FuseError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Bytes are not a supported image, or base64 text did not decode.
    #[error("Could not decode {what}: {detail}")]
    Decode { what: String, detail: String },

    /// The base image decoded but has no usable dimensions.
    #[error("Could not read dimensions of the base image (got {width}x{height})")]
    InvalidBaseImage { width: u32, height: u32 },

    /// A caller-supplied parameter is out of range or missing.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ── Retrieval errors ──────────────────────────────────────────────────
    /// A remote image could not be fetched.
    #[error("Failed to download '{url}': {reason}")]
    Retrieval { url: String, reason: String },

    /// A remote image fetch exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    RetrievalTimeout { url: String, secs: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The result could not be serialised to PNG or PDF.
    #[error("Failed to encode {what}: {detail}")]
    Encode { what: String, detail: String },

    /// Reading an input file or writing an output file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a worker task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classification surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Decode,
    InvalidBaseImage,
    Retrieval,
    Encode,
    InvalidArgument,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Decode => "DECODE_ERROR",
            ErrorKind::InvalidBaseImage => "INVALID_BASE_IMAGE",
            ErrorKind::Retrieval => "RETRIEVAL_ERROR",
            ErrorKind::Encode => "ENCODE_ERROR",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl FuseError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FuseError::Decode { .. } => ErrorKind::Decode,
            FuseError::InvalidBaseImage { .. } => ErrorKind::InvalidBaseImage,
            FuseError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            FuseError::Retrieval { .. } | FuseError::RetrievalTimeout { .. } => {
                ErrorKind::Retrieval
            }
            FuseError::Encode { .. } => ErrorKind::Encode,
            FuseError::Io { .. } | FuseError::InvalidConfig(_) | FuseError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn decode(what: impl Into<String>, detail: impl ToString) -> Self {
        FuseError::Decode {
            what: what.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn encode(what: impl Into<String>, detail: impl ToString) -> Self {
        FuseError::Encode {
            what: what.into(),
            detail: detail.to_string(),
        }
    }
}
