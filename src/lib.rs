//! Water-tank monitor - Connection client for an ESP32 tank-level sensor.
//!
//! This library polls a sensor device over HTTP, tracks the connection
//! lifecycle, and publishes the last known water level to subscribers.
//!
//! # Architecture
//!
//! The monitor follows a check-and-publish model:
//!
//! - **Device (firmware)**: Serves `GET /status` and `GET /water` as JSON
//! - **Monitor (Rust)**: Runs checks on demand, publishes state changes
//!
//! Key design principles:
//!
//! - One [`DeviceMonitor`] per device; clones share state
//! - Request mechanism chosen once at build time from the [`Platform`]
//! - Every request bounded by its own timeout, no retries
//! - Checks serialized; state, level and error published atomically
//!
//! # Quick Start
//!
//! ```no_run
//! use watertank_monitor::{DeviceMonitor, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let monitor = DeviceMonitor::builder()
//!         .base_url("http://agent-water.local")
//!         .build()?;
//!
//!     let status = monitor.check_status().await?;
//!     println!("online: {}", status.connected);
//!
//!     let reading = monitor.check_water_level().await?;
//!     println!("tank at {}% ({})", reading.level, reading.band().label());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Presets, environment overlay, validation |
//! | [`error`] | Error types, failure taxonomy and [`Result`] alias |
//! | [`monitor`] | [`DeviceMonitor`], state machine and channels |
//! | [`protocol`] | Device JSON payloads |
//! | [`transport`] | Native, browser and scripted transports |

// ============================================================================
// Modules
// ============================================================================

/// Monitor configuration.
///
/// Production and development presets plus `WATERTANK_*` overrides.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Device connection monitor.
///
/// Use [`DeviceMonitor::builder()`] to create a configured monitor.
pub mod monitor;

/// Device HTTP API message types.
pub mod protocol;

/// HTTP transport layer.
///
/// Platform-specific request mechanisms behind one trait.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::MonitorConfig;

// Error types
pub use error::{Error, FailureKind, OfflineContext, Result};

// Monitor types
pub use monitor::{
    ConnectionState, DeviceMonitor, DeviceStatus, LevelBand, MonitorBuilder, MonitorSnapshot,
    Subscription, WaterLevelReading,
};

// Protocol types
pub use protocol::Endpoint;

// Transport types
pub use transport::{Platform, PlatformProbe, Transport};
