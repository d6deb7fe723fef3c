//! HTTP transport layer.
//!
//! One contract, [`Transport::fetch_json`], over interchangeable
//! mechanisms. The mechanism is chosen once, when the monitor is built,
//! from the execution [`Platform`]:
//!
//! ```text
//! ┌──────────────┐   Platform::Native   ┌──────────────────┐
//! │              │ ───────────────────► │ NativeTransport  │ ──► device host
//! │ PlatformProbe│                      └──────────────────┘
//! │              │   Platform::Browser  ┌──────────────────┐
//! │              │ ───────────────────► │ BrowserTransport │ ──► proxy / device
//! └──────────────┘                      └──────────────────┘     (same-origin rules)
//! ```
//!
//! Both return the decoded JSON body for a status in `[200, 300)` and an
//! [`Error`] carrying the HTTP status (or none, for network failure)
//! otherwise. Nothing here retries.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `native` | Direct host access, no cross-origin rules |
//! | `browser` | Same-origin rules with optional development proxy |
//! | `memory` | Scripted in-process device for tests and demos |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::MonitorConfig;
use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// Same-origin transport for browser-hosted builds.
pub mod browser;

/// Scripted in-memory transport.
pub mod memory;

/// Direct transport for natively-hosted builds.
pub mod native;

// ============================================================================
// Re-exports
// ============================================================================

pub use browser::BrowserTransport;
pub use memory::{MemoryTransport, Reply};
pub use native::NativeTransport;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable overriding platform detection.
pub const PLATFORM_ENV: &str = "WATERTANK_PLATFORM";

/// User agent sent by the HTTP transports.
pub(crate) const USER_AGENT: &str = concat!("watertank-monitor/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Transport
// ============================================================================

/// Single HTTP GET returning a JSON body.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url` and decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] for a status outside `[200, 300)`
    /// - [`Error::Network`] when no status was obtained
    /// - [`Error::Json`] if the body is not JSON
    async fn fetch_json(&self, url: &Url) -> Result<Value>;

    /// Platform this transport serves.
    fn platform(&self) -> Platform;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch_json(&self, url: &Url) -> Result<Value> {
        (**self).fetch_json(url).await
    }

    fn platform(&self) -> Platform {
        (**self).platform()
    }
}

// ============================================================================
// Platform
// ============================================================================

/// Execution environment of the host application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Natively-hosted process; cross-origin rules do not apply.
    #[default]
    Native,
    /// Embedded browser; same-origin rules apply.
    Browser,
}

impl Platform {
    /// Platform reported by [`EnvProbe`].
    #[inline]
    #[must_use]
    pub fn detect() -> Self {
        EnvProbe.platform()
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "browser" | "web" => Ok(Self::Browser),
            other => Err(Error::config(format!(
                "Unknown platform '{other}', expected 'native' or 'browser'"
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Browser => f.write_str("browser"),
        }
    }
}

// ============================================================================
// PlatformProbe
// ============================================================================

/// Reports the execution environment.
pub trait PlatformProbe: Send + Sync {
    /// Current platform.
    fn platform(&self) -> Platform;
}

impl PlatformProbe for Platform {
    fn platform(&self) -> Platform {
        *self
    }
}

/// Probe reading [`PLATFORM_ENV`], defaulting to [`Platform::Native`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProbe;

impl PlatformProbe for EnvProbe {
    fn platform(&self) -> Platform {
        std::env::var(PLATFORM_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Builds the transport for `platform`.
///
/// # Errors
///
/// - [`Error::Config`] if the browser platform has no app origin
/// - [`Error::InvalidUrl`] if the origin or proxy does not parse
/// - [`Error::Config`] if the HTTP client cannot be built
pub fn select_transport(platform: Platform, config: &MonitorConfig) -> Result<Arc<dyn Transport>> {
    debug!(%platform, "Selecting transport");

    match platform {
        Platform::Native => Ok(Arc::new(NativeTransport::new()?)),
        Platform::Browser => {
            let origin = config.app_origin()?.ok_or_else(|| {
                Error::config("Browser platform requires an app origin (app_origin)")
            })?;
            Ok(Arc::new(BrowserTransport::new(origin, config.dev_proxy()?)?))
        }
    }
}

// ============================================================================
// Response Handling
// ============================================================================

/// Decodes a success body or maps the status to [`Error::Http`].
pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();

    if status.is_success() {
        let body = response.bytes().await?;
        return Ok(serde_json::from_slice(&body)?);
    }

    let reason = match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => response.text().await.unwrap_or_default().trim().to_string(),
    };
    debug!(status = status.as_u16(), %reason, "Non-success response");

    Err(Error::http(status.as_u16(), reason))
}

// ============================================================================
// Tests
// ============================================================================
