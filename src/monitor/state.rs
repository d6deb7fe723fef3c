//! Connection state and device data types.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// ConnectionState
// ============================================================================

/// Connection state of the monitor.
///
/// ```text
/// Idle ──► Connecting ──► Connected ──► Checking ──► Connected
///               │              │            │
///               └──► Error ◄───┴────────────┘
/// ```
///
/// `Connected` and `Error` are rest states; every new check restarts from
/// `Connecting`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No check performed since start or reset.
    #[default]
    Idle,
    /// Status request in flight.
    Connecting,
    /// Device confirmed online.
    Connected,
    /// Water-level read in flight (only with the checking indicator enabled).
    Checking,
    /// Last check failed.
    Error,
}

impl ConnectionState {
    /// All states.
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::Connecting,
        Self::Connected,
        Self::Checking,
        Self::Error,
    ];

    /// Returns `true` while a request is in flight.
    #[inline]
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Connecting | Self::Checking)
    }

    /// Returns `true` for states a check may end in.
    #[inline]
    #[must_use]
    pub const fn is_rest(self) -> bool {
        !self.is_busy()
    }

    /// Short label.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Checking => "Checking",
            Self::Error => "Error",
        }
    }

    /// One-line description used when no error text is available.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Idle => "Device ready to connect",
            Self::Connecting => "Waking up device...",
            Self::Connected => "Device is online",
            Self::Checking => "Reading water level sensor...",
            Self::Error => "Failed to connect to device",
        }
    }

    /// Whether the machine may move from `self` to `next`.
    ///
    /// `Idle` is reachable from anywhere through reset.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (_, Self::Idle) => true,
            (_, Self::Connecting) => !self.is_busy(),
            (Self::Connecting, Self::Connected | Self::Error) => true,
            (Self::Connected, Self::Checking | Self::Error) => true,
            (Self::Checking, Self::Connected | Self::Error) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ============================================================================
// DeviceStatus
// ============================================================================

/// Result of a status check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// `true` iff the device reported `"online"`.
    pub connected: bool,
    /// Device timestamp of the report.
    pub last_seen: Option<u64>,
    /// WiFi signal strength in dBm.
    pub signal: Option<i32>,
    /// Seconds since boot.
    pub uptime: Option<u64>,
}

// ============================================================================
// WaterLevelReading
// ============================================================================

/// Result of a water-level read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterLevelReading {
    /// Fill level, 0-100.
    pub level: f64,
    /// Device timestamp of the measurement.
    pub timestamp: u64,
    /// Firmware descriptor, e.g. `"normal"` or `"low"`.
    pub status: Option<String>,
    /// Battery charge, 0-100.
    pub battery: Option<f64>,
}

impl WaterLevelReading {
    /// Fill band of this reading.
    #[inline]
    #[must_use]
    pub fn band(&self) -> LevelBand {
        LevelBand::of(self.level)
    }
}

// ============================================================================
// LevelBand
// ============================================================================

/// Coarse fill band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelBand {
    /// 70% and above.
    Good,
    /// 30% to 70%.
    Medium,
    /// Above 0% and below 30%.
    Low,
    /// 0%.
    Empty,
}

impl LevelBand {
    /// Band for a fill percentage.
    #[must_use]
    pub fn of(level: f64) -> Self {
        if level >= 70.0 {
            Self::Good
        } else if level >= 30.0 {
            Self::Medium
        } else if level > 0.0 {
            Self::Low
        } else {
            Self::Empty
        }
    }

    /// Short label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "Good Level",
            Self::Medium => "Medium Level",
            Self::Low => "Low Level",
            Self::Empty => "Empty",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
