//! `/water` response.
//!
//! The raw `level` field is the sensor distance reading in centimetres and
//! is not surfaced; the reading is taken from `percentage`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::monitor::WaterLevelReading;

// ============================================================================
// WaterResponse
// ============================================================================

/// Raw `/water` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterResponse {
    /// Measured water column in centimetres.
    #[serde(default)]
    pub level: Option<f64>,

    /// Fill level, 0-100.
    pub percentage: f64,

    /// Firmware descriptor (`normal`, `low`, `critical`, `full`).
    #[serde(default)]
    pub status: Option<String>,

    /// Device clock at measurement time.
    pub timestamp: u64,

    /// Tank height in centimetres.
    #[serde(default)]
    pub tank_height: Option<f64>,

    /// Distance from sensor to water surface in centimetres.
    #[serde(default)]
    pub sensor_distance: Option<f64>,

    /// Device model name.
    #[serde(default)]
    pub device: Option<String>,

    /// Battery charge, 0-100.
    #[serde(default)]
    pub battery: Option<f64>,

    /// WiFi signal strength in dBm.
    #[serde(default)]
    pub signal_strength: Option<i32>,
}

impl TryFrom<WaterResponse> for WaterLevelReading {
    type Error = Error;

    fn try_from(response: WaterResponse) -> Result<Self> {
        Ok(Self {
            level: percentage("percentage", response.percentage)?,
            timestamp: response.timestamp,
            status: response.status,
            battery: response
                .battery
                .map(|battery| percentage("battery", battery))
                .transpose()?,
        })
    }
}

/// Clamps a 0-100 field, rejecting NaN and infinities.
fn percentage(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(Error::decode(format!("{field} is not a number: {value}")));
    }

    let clamped = value.clamp(0.0, 100.0);
    if clamped != value {
        warn!(field, value, "Percentage out of range, clamped");
    }
    Ok(clamped)
}

// ============================================================================
// Tests
// ============================================================================
