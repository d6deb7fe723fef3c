//! Device connection monitor.
//!
//! Owns the connection state machine and the three observable channels
//! (state, last known level, error message). All device traffic goes
//! through a [`Transport`](crate::Transport) chosen at build time.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DeviceMonitor`] | Check orchestration and channel ownership |
//! | [`MonitorBuilder`] | Fluent configuration builder |
//! | [`ConnectionState`] | Connection lifecycle state |
//! | [`Channel`] / [`Subscription`] | Current value plus change notification |
//!
//! # State Machine
//!
//! ```text
//!          check_*            status online
//!  Idle ─────────────► Connecting ─────────────► Connected ◄──┐
//!   ▲                      │                        │         │ reading
//!   │ reset                │ failure / offline      │ water   │
//!   │                      ▼                        ▼         │
//!   └──────────────────  Error ◄──────────────── Checking ────┘
//! ```
//!
//! `Checking` is only published when the checking indicator is enabled.

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for monitor configuration.
pub mod builder;

/// Observable value channels.
pub mod channel;

/// Core monitor implementation.
pub mod core;

/// Connection state and device data types.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::MonitorBuilder;
pub use channel::{Channel, Subscription};
pub use self::core::{DEFAULT_STARTUP_DELAY, DeviceMonitor, MonitorSnapshot};
pub use state::{ConnectionState, DeviceStatus, LevelBand, WaterLevelReading};
