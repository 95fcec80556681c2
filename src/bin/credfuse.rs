//! CLI binary for credfuse.
//!
//! A thin shim over the library crate: `serve` runs the HTTP API, `fuse`
//! and `pdf` run a single job locally and write the result to a file or
//! stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use credfuse::server::{self, DEFAULT_BODY_LIMIT};
use credfuse::{write_atomic, FuseConfig, FuseService, ImageSource, ResizeFilter};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP API on $PORT (default 3000)
  credfuse serve

  # Fuse a signature onto a hosted template
  credfuse fuse --base https://cdn.example.com/template.png --overlay sig.png -o fused.png

  # Lay an already-fused PNG out on A4
  credfuse pdf fused.png -o Cedula_A4.pdf

  # Fuse and lay out in one step
  credfuse pdf --base template.png --overlay sig.png -o Cedula_A4.pdf

HTTP ENDPOINTS (serve):
  GET  /  and  /healthz    {"ok":true}
  POST /fusionar-cedula    {"base64Overlay": "...", "urlBaseImage": "https://..."}  → image/png
  POST /png-to-a4-pdf      {"fusedBase64": "..."} | {"fusedUrl": "https://..."}      → application/pdf

ENVIRONMENT VARIABLES:
  PORT                       Listen port for `serve`
  CREDFUSE_TOLERANCE         Near-white threshold, 0-255 (default 250)
  CREDFUSE_DOWNLOAD_TIMEOUT  Base image download timeout in seconds
  RUST_LOG                   Overrides --verbose / --quiet
"#;

/// Fuse credential overlays and lay them out on print-ready A4 PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "credfuse",
    version,
    about = "Fuse credential overlays and lay them out on print-ready A4 PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Overlay channels at or above this value all count as white (0–255).
    #[arg(long, global = true, env = "CREDFUSE_TOLERANCE", default_value_t = 250)]
    tolerance: i64,

    /// Resampling filter used when resizing images.
    #[arg(long, global = true, env = "CREDFUSE_FILTER", value_enum, default_value = "lanczos3")]
    filter: FilterArg,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "CREDFUSE_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// Maximum accepted size of a downloaded image, in MiB.
    #[arg(long, global = true, env = "CREDFUSE_MAX_DOWNLOAD_MB", default_value_t = 20)]
    max_download_mb: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CREDFUSE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CREDFUSE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Interface to bind.
        #[arg(long, env = "CREDFUSE_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on.
        #[arg(short, long, env = "PORT", default_value_t = 3000)]
        port: u16,

        /// Maximum JSON request body, in MiB.
        #[arg(long, env = "CREDFUSE_BODY_LIMIT_MB")]
        body_limit_mb: Option<usize>,
    },

    /// Fuse an overlay onto a base template and write a PNG.
    Fuse {
        /// Base template: file path or HTTP/HTTPS URL.
        #[arg(long)]
        base: String,

        /// Overlay: file path, URL or data URI.
        #[arg(long)]
        overlay: String,

        /// Write the PNG here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Lay a fused image out on an A4 page and write a PDF.
    Pdf {
        /// Fused image: file path, URL or data URI. Omit when using --base/--overlay.
        #[arg(required_unless_present = "base", conflicts_with_all = ["base", "overlay"])]
        input: Option<String>,

        /// Fuse this base template first.
        #[arg(long, requires = "overlay")]
        base: Option<String>,

        /// Overlay to fuse onto --base.
        #[arg(long, requires = "base")]
        overlay: Option<String>,

        /// Write the PDF here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum FilterArg {
    Nearest,
    Triangle,
    Catmullrom,
    Gaussian,
    Lanczos3,
}

impl From<FilterArg> for ResizeFilter {
    fn from(v: FilterArg) -> Self {
        match v {
            FilterArg::Nearest => ResizeFilter::Nearest,
            FilterArg::Triangle => ResizeFilter::Triangle,
            FilterArg::Catmullrom => ResizeFilter::CatmullRom,
            FilterArg::Gaussian => ResizeFilter::Gaussian,
            FilterArg::Lanczos3 => ResizeFilter::Lanczos3,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let service = FuseService::new(config).context("Failed to initialise service")?;

    match cli.command {
        Command::Serve {
            ref host,
            port,
            body_limit_mb,
        } => {
            let body_limit = body_limit_mb
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(DEFAULT_BODY_LIMIT);
            serve(service, host, port, body_limit).await
        }

        Command::Fuse {
            ref base,
            ref overlay,
            ref output,
        } => {
            let start = Instant::now();
            let png = service
                .fuse(
                    ImageSource::from_arg(base),
                    ImageSource::from_arg(overlay),
                    None,
                )
                .await
                .context("Fusion failed")?;
            emit(&png, output.as_ref(), cli.quiet, start).await
        }

        Command::Pdf {
            ref input,
            ref base,
            ref overlay,
            ref output,
        } => {
            let start = Instant::now();
            let pdf = match (input, base, overlay) {
                (Some(input), _, _) => service
                    .render_pdf(ImageSource::from_arg(input))
                    .await
                    .context("PDF layout failed")?,
                (None, Some(base), Some(overlay)) => service
                    .fuse_to_pdf(
                        ImageSource::from_arg(base),
                        ImageSource::from_arg(overlay),
                        None,
                    )
                    .await
                    .context("Fusion to PDF failed")?,
                _ => anyhow::bail!("Provide an input image, or both --base and --overlay"),
            };
            emit(&pdf, output.as_ref(), cli.quiet, start).await
        }
    }
}

/// Map CLI args to `FuseConfig`.
fn build_config(cli: &Cli) -> Result<FuseConfig> {
    FuseConfig::builder()
        .tolerance(cli.tolerance)
        .resize_filter(cli.filter.clone().into())
        .download_timeout_secs(cli.download_timeout)
        .max_download_bytes(cli.max_download_mb.saturating_mul(1024 * 1024))
        .build()
        .context("Invalid configuration")
}

async fn serve(service: FuseService, host: &str, port: u16, body_limit: usize) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid listen address {host}:{port}"))?;

    let app = server::router(Arc::new(service), body_limit);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("credfuse listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Write `bytes` to `output` (atomically) or to stdout.
async fn emit(bytes: &[u8], output: Option<&PathBuf>, quiet: bool, start: Instant) -> Result<()> {
    match output {
        Some(path) => {
            write_atomic(path, bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{}  {}  {}  →  {}",
                    green("✔"),
                    dim(&format!("{} bytes", bytes.len())),
                    dim(&format!("{}ms", start.elapsed().as_millis())),
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(bytes)
                .context("Failed to write to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }
    Ok(())
}
