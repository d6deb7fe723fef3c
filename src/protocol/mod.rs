//! Device HTTP API message types.
//!
//! The sensor exposes two JSON endpoints. Only a few fields of each
//! response are used; the rest are decoded when present and otherwise
//! ignored.
//!
//! | Endpoint | Model | Used fields |
//! |----------|-------|-------------|
//! | `GET /status` | [`StatusResponse`] | `status`, `timestamp`, `rssi`, `uptime` |
//! | `GET /water` | [`WaterResponse`] | `percentage`, `timestamp`, `status`, `battery` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `status` | `/status` response and [`DeviceStatus`](crate::DeviceStatus) conversion |
//! | `water` | `/water` response and [`WaterLevelReading`](crate::WaterLevelReading) conversion |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use url::Url;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// `/status` endpoint payload.
pub mod status;

/// `/water` endpoint payload.
pub mod water;

// ============================================================================
// Re-exports
// ============================================================================

pub use status::{ReportedStatus, StatusResponse};
pub use water::WaterResponse;

// ============================================================================
// Endpoint
// ============================================================================

/// Device endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Connectivity and health report.
    Status,
    /// Water-level reading.
    Water,
}

impl Endpoint {
    /// Path appended to the base URL.
    #[inline]
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Status => "/status",
            Self::Water => "/water",
        }
    }

    /// Resolves the endpoint against a base URL.
    ///
    /// The base path is kept, so a proxy base such as
    /// `http://localhost:8100/api` yields `http://localhost:8100/api/status`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`](crate::Error::InvalidUrl) if the
    /// joined URL does not parse.
    pub fn url(self, base: &Url) -> Result<Url> {
        let base = base.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{}", self.path()))?)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// ============================================================================
// Tests
// ============================================================================
