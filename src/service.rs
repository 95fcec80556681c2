//! Request-scoped entry points.
//!
//! [`FuseService`] is built once per process from a [`FuseConfig`] and
//! passed explicitly to whoever needs it (the HTTP handlers share it via
//! `Arc`). It owns no mutable state: every call resolves its own inputs,
//! runs the CPU-bound stages on tokio's blocking pool, and returns owned
//! bytes. Concurrent requests never share a pixel buffer.

use crate::config::{FuseConfig, Tolerance};
use crate::error::FuseError;
use crate::pipeline::composite::Compositor;
use crate::pipeline::input::{Fetcher, ImageSource};
use crate::pipeline::layout::{self, PageSpec};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Stateless fusion + layout service.
#[derive(Debug, Clone)]
pub struct FuseService {
    config: FuseConfig,
    fetcher: Fetcher,
}

impl FuseService {
    /// Build the service, including its HTTP client.
    pub fn new(config: FuseConfig) -> Result<Self, FuseError> {
        let fetcher = Fetcher::new(config.download_timeout_secs, config.max_download_bytes)?;
        Ok(Self { config, fetcher })
    }

    pub fn config(&self) -> &FuseConfig {
        &self.config
    }

    fn compositor(&self, tolerance: Option<Tolerance>) -> Compositor {
        Compositor::new(
            tolerance.unwrap_or(self.config.tolerance),
            self.config.resize_filter,
        )
    }

    /// Fuse `overlay` onto `base` and return PNG bytes at the base's size.
    ///
    /// `tolerance` overrides the configured threshold for this call only.
    pub async fn fuse(
        &self,
        base: ImageSource,
        overlay: ImageSource,
        tolerance: Option<Tolerance>,
    ) -> Result<Vec<u8>, FuseError> {
        let start = Instant::now();
        info!("Fusing {} onto {}", overlay.describe(), base.describe());

        let (base, overlay) =
            tokio::try_join!(self.fetcher.resolve(base), self.fetcher.resolve(overlay))?;

        let compositor = self.compositor(tolerance);
        let png = run_blocking(move || compositor.fuse(&base, &overlay)).await?;

        debug!("Fusion took {}ms", start.elapsed().as_millis());
        Ok(png)
    }

    /// Lay out an already-fused image on the A4 template.
    pub async fn render_pdf(&self, content: ImageSource) -> Result<Vec<u8>, FuseError> {
        let start = Instant::now();
        info!("Rendering PDF from {}", content.describe());

        let bytes = self.fetcher.resolve(content).await?;
        let pdf = run_blocking(move || layout::render_pdf(&bytes)).await?;

        debug!("Layout took {}ms", start.elapsed().as_millis());
        Ok(pdf)
    }

    /// Fuse and lay out in one go, without an intermediate PNG.
    pub async fn fuse_to_pdf(
        &self,
        base: ImageSource,
        overlay: ImageSource,
        tolerance: Option<Tolerance>,
    ) -> Result<Vec<u8>, FuseError> {
        info!("Fusing {} onto {} for print", overlay.describe(), base.describe());

        let (base, overlay) =
            tokio::try_join!(self.fetcher.resolve(base), self.fetcher.resolve(overlay))?;

        let compositor = self.compositor(tolerance);
        run_blocking(move || {
            let fused = compositor.fuse_pixels(&base, &overlay)?;
            layout::render_pdf_pixels(&PageSpec::a4_credential(), &fused)
        })
        .await
    }
}

/// Run a CPU-bound stage on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T, FuseError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FuseError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FuseError::Internal(format!("Worker task panicked: {e}")))?
}

/// Write `bytes` to `path` atomically (temp file + rename).
pub async fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), FuseError> {
    let path = path.as_ref();
    let io_err = |source| FuseError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(io_err)?;
    Ok(())
}

/// Synchronous wrapper around [`FuseService::fuse`].
///
/// Creates a temporary tokio runtime internally.
pub fn fuse_sync(
    config: &FuseConfig,
    base: ImageSource,
    overlay: ImageSource,
) -> Result<Vec<u8>, FuseError> {
    let service = FuseService::new(config.clone())?;
    tokio::runtime::Runtime::new()
        .map_err(|e| FuseError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(service.fuse(base, overlay, None))
}
