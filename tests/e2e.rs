//! End-to-end integration tests for credfuse.
//!
//! Everything runs in-process: fixture templates are generated on the fly,
//! and "remote" base images are served by a throwaway axum server bound to
//! an ephemeral localhost port, so no external network is needed.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

#![cfg(feature = "server")]

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use credfuse::pipeline::encode::to_data_uri;
use credfuse::{
    decode_image, encode_png, fuse_sync, mm_to_pt, render_pdf, Compositor, Dimensions, ErrorKind,
    FuseConfig, FuseError, FuseService, ImageSource, PageSpec, PixelBuffer, Placement,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

const TEMPLATE_RGBA: [u8; 4] = [10, 10, 200, 255];

fn solid_png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    encode_png(PixelBuffer::filled(w, h, rgba)).expect("encode fixture")
}

/// A 50×70 overlay with a dark signature stroke across an otherwise
/// white overlay.
fn signature_overlay() -> Vec<u8> {
    let (w, h) = (50u32, 70u32);
    let mut raw = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for _ in 0..w {
            if (30..40).contains(&y) {
                raw.extend_from_slice(&[20, 20, 20, 255]);
            } else {
                raw.extend_from_slice(&[255, 255, 255, 255]);
            }
        }
    }
    encode_png(PixelBuffer::from_raw(w, h, raw).unwrap()).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Assert the bytes look like a complete single-page credential PDF.
fn assert_pdf_quality(pdf: &[u8], context: &str) {
    assert!(pdf.starts_with(b"%PDF-"), "[{context}] missing PDF header");
    let tail = String::from_utf8_lossy(&pdf[pdf.len().saturating_sub(16)..]);
    assert!(tail.contains("%%EOF"), "[{context}] missing %%EOF trailer");
    let text = String::from_utf8_lossy(pdf);
    assert!(
        text.contains("/MediaBox [0 0 595 842]"),
        "[{context}] expected an A4 media box"
    );
    assert!(text.contains("/Count 1"), "[{context}] expected one page");
    assert!(text.contains("/Subtype /Image"), "[{context}] no image XObject");
}

/// Serve fixtures on an ephemeral port.
///
/// - `/template.png`: 100×140 solid template
/// - `/missing.png` : 404
/// - `/slow.png`    : responds after 3 s
/// - `/garbage.png` : 200 with non-image bytes
async fn spawn_fixture_server() -> SocketAddr {
    async fn fixture(Path(name): Path<String>) -> axum::response::Response {
        match name.as_str() {
            "template.png" => (
                [(header::CONTENT_TYPE, "image/png")],
                solid_png(100, 140, TEMPLATE_RGBA),
            )
                .into_response(),
            "slow.png" => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                solid_png(4, 4, TEMPLATE_RGBA).into_response()
            }
            "garbage.png" => b"<html>not an image</html>".to_vec().into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    let app = Router::new().route("/:name", get(fixture));
    serve(app).await
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

// ── Layout constants ─────────────────────────────────────────────────────────

#[test]
fn test_unit_conversion_exactness() {
    assert_eq!(mm_to_pt(210.0), 595);
    assert_eq!(mm_to_pt(297.0), 842);
    assert_eq!(mm_to_pt(86.0), 244);
    assert_eq!(mm_to_pt(120.0), 340);
}

#[test]
fn test_centering_invariant() {
    let spec = PageSpec::a4_credential();
    let p = spec.placement();
    assert_eq!(p, Placement { left: 175, top: 251 });
    assert!(p.left + spec.content_width_pt <= spec.page_width_pt);
    assert!(p.top + spec.content_height_pt <= spec.page_height_pt);
}

// ── Fusion scenarios (no network) ────────────────────────────────────────────

#[test]
fn test_white_overlay_has_no_visible_effect() {
    let base = solid_png(100, 140, TEMPLATE_RGBA);
    let overlay = solid_png(50, 50, [255, 255, 255, 255]);

    let fused = Compositor::default().fuse(&base, &overlay).unwrap();
    let fused = decode_image(&fused, "fused").unwrap();

    assert_eq!(
        fused.dimensions(),
        Dimensions {
            width: 100,
            height: 140
        }
    );
    assert_eq!(fused, PixelBuffer::filled(100, 140, TEMPLATE_RGBA));
}

#[test]
fn test_signature_survives_and_background_disappears() {
    let base = solid_png(100, 140, TEMPLATE_RGBA);
    let fused = Compositor::default()
        .fuse(&base, &signature_overlay())
        .unwrap();
    let fused = decode_image(&fused, "fused").unwrap();

    // 50×70 → 100×140 is an exact 2× cover; rows 30..40 map to 60..80.
    assert_eq!(fused.pixel(50, 70), [20, 20, 20, 255]);
    // Far from the stroke, the white background was masked away.
    assert_eq!(fused.pixel(5, 5), TEMPLATE_RGBA);
    assert_eq!(fused.pixel(95, 135), TEMPLATE_RGBA);
}

#[test]
fn test_invalid_base_fails_without_output() {
    let overlay = solid_png(10, 10, [0, 0, 0, 255]);
    let bases: [&[u8]; 3] = [b"", b"GIF89a-truncated", b"\x89PNG\r\n\x1a\n"];
    for base in bases {
        let err = Compositor::default().fuse(base, &overlay).unwrap_err();
        assert!(
            matches!(
                err.kind(),
                ErrorKind::Decode | ErrorKind::InvalidBaseImage
            ),
            "unexpected error for {base:?}: {err:?}"
        );
    }
}

#[test]
fn test_fuse_then_layout() {
    let fused = Compositor::default()
        .fuse(&solid_png(86, 120, TEMPLATE_RGBA), &signature_overlay())
        .unwrap();
    let pdf = render_pdf(&fused).unwrap();
    assert_pdf_quality(&pdf, "fuse_then_layout");
}

#[test]
fn test_fuse_sync_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let base_path = dir.path().join("base.png");
    let overlay_path = dir.path().join("overlay.png");
    std::fs::write(&base_path, solid_png(30, 42, TEMPLATE_RGBA)).unwrap();
    std::fs::write(&overlay_path, solid_png(7, 7, [255, 255, 255, 255])).unwrap();

    let out = fuse_sync(
        &FuseConfig::default(),
        ImageSource::Path(base_path),
        ImageSource::Path(overlay_path),
    )
    .unwrap();
    let img = decode_image(&out, "out").unwrap();
    assert_eq!((img.width(), img.height()), (30, 42));
}

#[test]
fn test_render_pdf_on_current_thread_runtime() {
    let service = FuseService::new(FuseConfig::default()).unwrap();
    let png = solid_png(86, 120, TEMPLATE_RGBA);
    let pdf = tokio_test::block_on(service.render_pdf(ImageSource::Base64(to_data_uri(&png))))
        .unwrap();
    assert_pdf_quality(&pdf, "block_on");
}

// ── Retrieval (local fixture server) ────────────────────────────────────────

#[tokio::test]
async fn test_fuse_with_remote_base() {
    init_tracing();
    let addr = spawn_fixture_server().await;
    let service = FuseService::new(FuseConfig::default()).unwrap();

    let png = service
        .fuse(
            ImageSource::Url(format!("http://{addr}/template.png")),
            ImageSource::Base64(to_data_uri(&signature_overlay())),
            None,
        )
        .await
        .expect("fusion should succeed");

    let img = decode_image(&png, "fused").unwrap();
    assert_eq!((img.width(), img.height()), (100, 140));
    assert_eq!(img.pixel(5, 5), TEMPLATE_RGBA);
}

#[tokio::test]
async fn test_missing_remote_base_is_retrieval_error() {
    let addr = spawn_fixture_server().await;
    let service = FuseService::new(FuseConfig::default()).unwrap();

    let err = service
        .fuse(
            ImageSource::Url(format!("http://{addr}/missing.png")),
            ImageSource::Bytes(signature_overlay()),
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Retrieval, "got {err:?}");
    assert!(err.to_string().contains("404"), "got: {err}");
}

#[tokio::test]
async fn test_remote_garbage_is_decode_error() {
    let addr = spawn_fixture_server().await;
    let service = FuseService::new(FuseConfig::default()).unwrap();

    let err = service
        .fuse(
            ImageSource::Url(format!("http://{addr}/garbage.png")),
            ImageSource::Bytes(signature_overlay()),
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode, "got {err:?}");
}

#[tokio::test]
async fn test_slow_remote_base_times_out() {
    let addr = spawn_fixture_server().await;
    let config = FuseConfig::builder()
        .download_timeout_secs(1)
        .build()
        .unwrap();
    let service = FuseService::new(config).unwrap();

    let err = service
        .fuse(
            ImageSource::Url(format!("http://{addr}/slow.png")),
            ImageSource::Bytes(signature_overlay()),
            None,
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, FuseError::RetrievalTimeout { secs: 1, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_oversized_remote_base_is_rejected() {
    let addr = spawn_fixture_server().await;
    let config = FuseConfig::builder().max_download_bytes(16).build().unwrap();
    let service = FuseService::new(config).unwrap();

    let err = service
        .render_pdf(ImageSource::Url(format!("http://{addr}/template.png")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Retrieval, "got {err:?}");
}

// ── HTTP surface ─────────────────────────────────────────────────────────────

async fn spawn_api() -> SocketAddr {
    let service = Arc::new(FuseService::new(FuseConfig::default()).unwrap());
    serve(credfuse::server::router(
        service,
        credfuse::server::DEFAULT_BODY_LIMIT,
    ))
    .await
}

async fn post_json(url: String, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .header(header::CONTENT_TYPE.as_str(), "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_http_fuse_then_pdf() {
    init_tracing();
    let fixtures = spawn_fixture_server().await;
    let api = spawn_api().await;

    let resp = post_json(
        format!("http://{api}/fusionar-cedula"),
        serde_json::json!({
            "base64Overlay": to_data_uri(&signature_overlay()),
            "urlBaseImage": format!("http://{fixtures}/template.png"),
        }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["content-type"], "image/png");
    let png = resp.bytes().await.unwrap().to_vec();
    let img = decode_image(&png, "fused").unwrap();
    assert_eq!((img.width(), img.height()), (100, 140));

    let resp = post_json(
        format!("http://{api}/png-to-a4-pdf"),
        serde_json::json!({ "fusedBase64": to_data_uri(&png) }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    let pdf = resp.bytes().await.unwrap();
    assert_pdf_quality(&pdf, "http_pdf");
}

#[tokio::test]
async fn test_http_pdf_from_url_and_server_side_fusion() {
    let fixtures = spawn_fixture_server().await;
    let api = spawn_api().await;

    let resp = post_json(
        format!("http://{api}/png-to-a4-pdf"),
        serde_json::json!({ "fusedUrl": format!("http://{fixtures}/template.png") }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_pdf_quality(&resp.bytes().await.unwrap(), "pdf_from_url");

    let resp = post_json(
        format!("http://{api}/png-to-a4-pdf"),
        serde_json::json!({
            "base64Overlay": to_data_uri(&signature_overlay()),
            "urlBaseImage": format!("http://{fixtures}/template.png"),
        }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_pdf_quality(&resp.bytes().await.unwrap(), "server_side_fusion");
}

#[tokio::test]
async fn test_http_errors_are_json() {
    let fixtures = spawn_fixture_server().await;
    let api = spawn_api().await;

    let resp = post_json(
        format!("http://{api}/fusionar-cedula"),
        serde_json::json!({
            "base64Overlay": to_data_uri(&signature_overlay()),
            "urlBaseImage": format!("http://{fixtures}/missing.png"),
        }),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 502);
    let body: serde_json::Value = serde_json::from_slice(&resp.bytes().await.unwrap()).unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], "RETRIEVAL_ERROR");
    assert!(body["error"].as_str().unwrap().contains("404"));
}
