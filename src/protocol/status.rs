//! `/status` response.
//!
//! # Format
//!
//! ```json
//! {
//!   "status": "online",
//!   "device": "ESP-01",
//!   "ip": "192.168.1.50",
//!   "uptime": 120,
//!   "free_heap": 41000,
//!   "rssi": -65,
//!   "timestamp": 1000
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::monitor::DeviceStatus;

// ============================================================================
// ReportedStatus
// ============================================================================

/// Value of the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportedStatus {
    /// Device awake and ready.
    Online,
    /// Device reachable but not ready.
    Offline,
    /// Anything the firmware invents later.
    #[serde(other)]
    Unknown,
}

// ============================================================================
// StatusResponse
// ============================================================================

/// Raw `/status` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Self-reported readiness.
    pub status: ReportedStatus,

    /// Device model name.
    #[serde(default)]
    pub device: Option<String>,

    /// Station IP address.
    #[serde(default)]
    pub ip: Option<String>,

    /// Seconds since boot.
    #[serde(default)]
    pub uptime: Option<u64>,

    /// Free heap in bytes.
    #[serde(default)]
    pub free_heap: Option<u64>,

    /// WiFi signal strength in dBm.
    #[serde(default)]
    pub rssi: Option<i32>,

    /// Device clock at response time.
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl StatusResponse {
    /// Whether the device reported exactly `"online"`.
    #[inline]
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status == ReportedStatus::Online
    }
}

impl From<StatusResponse> for DeviceStatus {
    fn from(response: StatusResponse) -> Self {
        Self {
            connected: response.is_online(),
            last_seen: response.timestamp,
            signal: response.rssi,
            uptime: response.uptime,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
