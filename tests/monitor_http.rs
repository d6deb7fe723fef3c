//! Monitor checks against an in-process HTTP device.
//!
//! The mock device binds an ephemeral port and serves a few route trees,
//! one per behavior, so each test picks a device personality through its
//! base URL:
//!
//! | Base | Behavior |
//! |------|----------|
//! | `/` | Healthy, no CORS headers |
//! | `/cors` | Healthy, `Access-Control-Allow-Origin: *` |
//! | `/strict` | Healthy, allows another origin only |
//! | `/api` | Healthy, used as the development proxy path |
//! | `/asleep` | Reports `"offline"` |
//! | `/faulty` | Status online, water read answers 500 |
//! | `/busy` | 503 on every endpoint |
//! | `/slow` | Status answers after two seconds |
//! | `/garbage` | Non-JSON status body |

use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use watertank_monitor::{
    ConnectionState, DeviceMonitor, Error, FailureKind, LevelBand, Platform,
};

// ============================================================================
// Mock Device
// ============================================================================

fn status_body() -> Value {
    json!({
        "status": "online",
        "device": "agent-water",
        "ip": "192.168.1.50",
        "uptime": 3600,
        "free_heap": 180000,
        "rssi": -58,
        "timestamp": 1700000000
    })
}

fn water_body() -> Value {
    json!({
        "level": 12.5,
        "percentage": 72.5,
        "status": "normal",
        "timestamp": 1700000042,
        "tank_height": 100.0,
        "sensor_distance": 27.5,
        "device": "agent-water",
        "battery": 91.0,
        "signal_strength": -58
    })
}

async fn status() -> Json<Value> {
    Json(status_body())
}

async fn water() -> Json<Value> {
    Json(water_body())
}

async fn status_any_origin() -> impl IntoResponse {
    ([(ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(status_body()))
}

async fn water_any_origin() -> impl IntoResponse {
    ([(ACCESS_CONTROL_ALLOW_ORIGIN, "*")], Json(water_body()))
}

async fn status_other_origin() -> impl IntoResponse {
    (
        [(ACCESS_CONTROL_ALLOW_ORIGIN, "http://dashboard.example")],
        Json(status_body()),
    )
}

async fn offline() -> Json<Value> {
    Json(json!({ "status": "offline", "device": "agent-water" }))
}

async fn fault() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn slow_status() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(status_body())
}

async fn garbage() -> &'static str {
    "<html>captive portal</html>"
}

fn device_routes() -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/water", get(water))
        .route("/cors/status", get(status_any_origin))
        .route("/cors/water", get(water_any_origin))
        .route("/strict/status", get(status_other_origin))
        .route("/api/status", get(status))
        .route("/api/water", get(water))
        .route("/asleep/status", get(offline))
        .route("/faulty/status", get(status))
        .route("/faulty/water", get(fault))
        .route("/busy/status", get(unavailable))
        .route("/busy/water", get(unavailable))
        .route("/slow/status", get(slow_status))
        .route("/garbage/status", get(garbage))
}

/// Starts the mock device and returns its address.
async fn spawn_device() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, device_routes()).await.unwrap();
    });

    addr
}

fn native(addr: SocketAddr, tree: &str) -> DeviceMonitor {
    DeviceMonitor::builder()
        .base_url(format!("http://{addr}{tree}"))
        .platform(Platform::Native)
        .build()
        .unwrap()
}

/// Browser monitor served from an origin other than the device.
fn browser(addr: SocketAddr, tree: &str) -> DeviceMonitor {
    DeviceMonitor::builder()
        .base_url(format!("http://{addr}{tree}"))
        .platform(Platform::Browser)
        .app_origin("http://localhost:8100")
        .build()
        .unwrap()
}

// ============================================================================
// Native Transport
// ============================================================================

#[tokio::test]
async fn test_native_full_cycle() -> anyhow::Result<()> {
    let addr = spawn_device().await;
    let monitor = native(addr, "");

    let status = monitor.check_status().await?;
    assert!(status.connected);
    assert_eq!(status.signal, Some(-58));
    assert_eq!(status.uptime, Some(3600));
    assert_eq!(status.last_seen, Some(1700000000));

    let reading = monitor.check_water_level().await?;
    assert_eq!(reading.level, 72.5);
    assert_eq!(reading.timestamp, 1700000042);
    assert_eq!(reading.band(), LevelBand::Good);

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.level, Some(72.5));
    assert_eq!(snapshot.error, None);
    Ok(())
}

#[tokio::test]
async fn test_native_ignores_cors_headers() -> anyhow::Result<()> {
    let addr = spawn_device().await;
    let monitor = native(addr, "/strict");

    let status = monitor.check_status().await?;
    assert!(status.connected);
    Ok(())
}

#[tokio::test]
async fn test_device_reports_offline() -> anyhow::Result<()> {
    let addr = spawn_device().await;
    let monitor = native(addr, "/asleep");

    let status = monitor.check_status().await?;
    assert!(!status.connected);
    assert_eq!(monitor.current_state(), ConnectionState::Error);
    assert_eq!(monitor.current_error().as_deref(), Some("Device is offline"));

    let err = monitor.check_water_level().await.unwrap_err();
    assert!(err.is_offline());
    assert_eq!(
        monitor.current_error().as_deref(),
        Some("Device is offline. Cannot check water level.")
    );
    Ok(())
}

#[tokio::test]
async fn test_missing_endpoint_is_not_found() {
    let addr = spawn_device().await;
    let monitor = native(addr, "/nothing-here");

    let err = monitor.check_status().await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.kind(), FailureKind::NotFound);
    assert_eq!(
        monitor.current_error().as_deref(),
        Some("Device endpoint not found. Check device firmware and hostname configuration.")
    );
}

#[tokio::test]
async fn test_water_fault_after_online_status() {
    let addr = spawn_device().await;
    let monitor = native(addr, "/faulty");
    let mut states = monitor.subscribe_state();

    let err = monitor.check_water_level().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ServerFault);
    assert_eq!(
        states.drain(),
        vec![
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Error,
        ]
    );
    assert_eq!(
        monitor.current_error().as_deref(),
        Some("Device internal error. Check sensor connections.")
    );
}

#[tokio::test]
async fn test_other_status_includes_reason() {
    let addr = spawn_device().await;
    let monitor = native(addr, "/busy");

    let err = monitor.check_status().await.unwrap_err();

    assert!(matches!(err, Error::Http { status: 503, .. }));
    assert_eq!(err.kind(), FailureKind::DeviceError);
    assert_eq!(
        monitor.current_error().as_deref(),
        Some("Device error: 503 - Service Unavailable")
    );
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let addr = spawn_device().await;
    let monitor = native(addr, "/garbage");

    let err = monitor.check_status().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Malformed);
    assert!(
        monitor
            .current_error()
            .unwrap()
            .starts_with("Unexpected response from device")
    );
}

#[tokio::test]
async fn test_unreachable_host() {
    // Port 9 (discard) is closed on loopback in test environments.
    let monitor = DeviceMonitor::builder()
        .base_url("http://127.0.0.1:9")
        .platform(Platform::Native)
        .build()
        .unwrap();

    let err = monitor.check_status().await.unwrap_err();

    assert!(err.is_connection_error());
    assert_eq!(err.status(), None);
    assert!(
        monitor
            .current_error()
            .unwrap()
            .starts_with("Cannot connect to the device")
    );
}

#[tokio::test]
async fn test_slow_device_times_out() {
    let addr = spawn_device().await;
    let monitor = DeviceMonitor::builder()
        .base_url(format!("http://{addr}/slow"))
        .platform(Platform::Native)
        .status_timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let err = monitor.check_status().await.unwrap_err();

    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(
        monitor.current_error().as_deref(),
        Some("Device response timeout. Device may be offline.")
    );
}

// ============================================================================
// Browser Transport
// ============================================================================

#[tokio::test]
async fn test_browser_blocked_without_cors() {
    let addr = spawn_device().await;
    let monitor = browser(addr, "");

    let err = monitor.check_status().await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::CrossOrigin);
    assert_eq!(err.status(), None);
    assert!(
        monitor
            .current_error()
            .unwrap()
            .starts_with("Cross-origin request rejected")
    );
}

#[tokio::test]
async fn test_browser_blocked_for_other_origin() {
    let addr = spawn_device().await;
    let monitor = browser(addr, "/strict");

    let err = monitor.check_status().await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::CrossOrigin);
}

#[tokio::test]
async fn test_browser_allowed_with_cors() -> anyhow::Result<()> {
    let addr = spawn_device().await;
    let monitor = browser(addr, "/cors");

    let reading = monitor.check_water_level().await?;
    assert_eq!(reading.level, 72.5);
    assert_eq!(monitor.current_state(), ConnectionState::Connected);
    Ok(())
}

#[tokio::test]
async fn test_browser_same_origin_needs_no_cors() -> anyhow::Result<()> {
    let addr = spawn_device().await;
    let monitor = DeviceMonitor::builder()
        .base_url(format!("http://{addr}"))
        .platform(Platform::Browser)
        .app_origin(format!("http://{addr}"))
        .build()?;

    let status = monitor.check_status().await?;
    assert!(status.connected);
    Ok(())
}

#[tokio::test]
async fn test_browser_development_proxy() -> anyhow::Result<()> {
    let addr = spawn_device().await;
    let monitor = DeviceMonitor::builder()
        .base_url("http://agent-water.local")
        .platform(Platform::Browser)
        .app_origin(format!("http://{addr}"))
        .dev_proxy(format!("http://{addr}/api"))
        .build()?;

    let reading = monitor.check_water_level().await?;
    assert_eq!(reading.level, 72.5);
    assert_eq!(monitor.platform(), Platform::Browser);
    Ok(())
}
