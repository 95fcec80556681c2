//! Input resolution: turn a caller-supplied image reference into bytes.
//!
//! Images arrive four ways: base64 text (possibly a `data:` URI) in a JSON
//! body, raw bytes, an HTTP(S) URL the template is hosted at, or a local
//! file for CLI use. This stage only gathers bytes. Whether they are a
//! valid image is decided later by the decoder, so a 404 and a corrupt PNG
//! surface as different error kinds.
//!
//! ## Bounded retrieval
//!
//! Remote fetches run under the configured timeout and a body-size cap.
//! The body is accumulated chunk by chunk and dropped wholesale on any
//! failure; nothing partially downloaded leaks into the pipeline.

use crate::error::FuseError;
use crate::pipeline::decode;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Base64 text, optionally prefixed with `data:image/<type>;base64,`.
    Base64(String),
    /// Encoded image bytes.
    Bytes(Vec<u8>),
    /// HTTP or HTTPS URL.
    Url(String),
    /// Local file.
    Path(PathBuf),
}

impl ImageSource {
    /// Classify a CLI argument: URL, data URI, or file path.
    pub fn from_arg(arg: &str) -> Self {
        if is_url(arg) {
            ImageSource::Url(arg.to_string())
        } else if arg.starts_with("data:") {
            ImageSource::Base64(arg.to_string())
        } else {
            ImageSource::Path(PathBuf::from(arg))
        }
    }

    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Base64(s) => format!("base64 ({} chars)", s.len()),
            ImageSource::Bytes(b) => format!("bytes ({} B)", b.len()),
            ImageSource::Url(u) => u.clone(),
            ImageSource::Path(p) => p.display().to_string(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Fetches remote images with a fixed timeout and size cap.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: usize,
}

impl Fetcher {
    pub fn new(timeout_secs: u64, max_bytes: usize) -> Result<Self, FuseError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FuseError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
            max_bytes,
        })
    }

    /// Resolve `source` to encoded image bytes.
    pub async fn resolve(&self, source: ImageSource) -> Result<Vec<u8>, FuseError> {
        match source {
            ImageSource::Base64(text) => decode::decode_base64(&text),
            ImageSource::Bytes(bytes) => Ok(bytes),
            ImageSource::Url(url) => self.download(&url).await,
            ImageSource::Path(path) => tokio::fs::read(&path)
                .await
                .map_err(|source| FuseError::Io { path, source }),
        }
    }

    /// Download a URL into memory.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, FuseError> {
        if !is_url(url) {
            return Err(FuseError::InvalidArgument(format!(
                "'{url}' is not an HTTP/HTTPS URL"
            )));
        }
        info!("Downloading image from: {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.retrieval_error(url, e))?;

        if !response.status().is_success() {
            return Err(FuseError::Retrieval {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(self.too_large(url));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.retrieval_error(url, e))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(FuseError::Retrieval {
                url: url.to_string(),
                reason: "empty response body".into(),
            });
        }

        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }

    fn retrieval_error(&self, url: &str, e: reqwest::Error) -> FuseError {
        if e.is_timeout() {
            FuseError::RetrievalTimeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            FuseError::Retrieval {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    fn too_large(&self, url: &str) -> FuseError {
        FuseError::Retrieval {
            url: url.to_string(),
            reason: format!("response exceeds {} bytes", self.max_bytes),
        }
    }
}
