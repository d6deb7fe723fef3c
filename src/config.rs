//! Monitor configuration.
//!
//! The device base URL depends on how the app is built: production builds
//! talk to the sensor's mDNS hostname, development builds go through a
//! local proxy path. Everything else is host-agnostic.
//!
//! # Example
//!
//! ```ignore
//! use watertank_monitor::MonitorConfig;
//!
//! let config = MonitorConfig::production().overlay(std::env::vars())?;
//! config.validate()?;
//! ```
//!
//! # Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `WATERTANK_BASE_URL` | `base_url` |
//! | `WATERTANK_STATUS_TIMEOUT_MS` | `status_timeout` |
//! | `WATERTANK_WATER_TIMEOUT_MS` | `water_timeout` |
//! | `WATERTANK_PLATFORM` | `platform` (`native` or `browser`) |
//! | `WATERTANK_APP_ORIGIN` | `app_origin` |
//! | `WATERTANK_DEV_PROXY` | `dev_proxy` |
//! | `WATERTANK_CHECKING_INDICATOR` | `checking_indicator` |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::transport::{PLATFORM_ENV, Platform};

// ============================================================================
// Constants
// ============================================================================

/// Budget for one `/status` request.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for one `/water` request.
pub const DEFAULT_WATER_TIMEOUT: Duration = Duration::from_secs(8);

/// Device hostname used by production builds.
pub const PRODUCTION_BASE_URL: &str = "http://agent-water.local";

/// Proxy path used by development builds.
pub const DEVELOPMENT_BASE_URL: &str = "http://localhost:8100/api";

/// Origin the development app is served from.
pub const DEVELOPMENT_APP_ORIGIN: &str = "http://localhost:8100";

// ============================================================================
// MonitorConfig
// ============================================================================

/// Monitor settings.
///
/// URLs are kept as text and parsed by [`validate`](Self::validate) and
/// the accessors, so a config can be deserialized or built field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Device base URL; endpoint paths are appended to it.
    pub base_url: String,

    /// Budget for one `/status` request.
    #[serde(rename = "status_timeout_ms", with = "millis")]
    pub status_timeout: Duration,

    /// Budget for one `/water` request.
    #[serde(rename = "water_timeout_ms", with = "millis")]
    pub water_timeout: Duration,

    /// Forces a platform instead of probing.
    pub platform: Option<Platform>,

    /// Origin the app is served from (browser platform).
    pub app_origin: Option<String>,

    /// Proxy base that device requests are rewritten onto (browser platform).
    pub dev_proxy: Option<String>,

    /// Publish `Checking` during the water-level read.
    pub checking_indicator: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::production()
    }
}

// ============================================================================
// Presets
// ============================================================================

impl MonitorConfig {
    /// Direct device access.
    #[must_use]
    pub fn production() -> Self {
        Self {
            base_url: PRODUCTION_BASE_URL.to_string(),
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            water_timeout: DEFAULT_WATER_TIMEOUT,
            platform: None,
            app_origin: None,
            dev_proxy: None,
            checking_indicator: false,
        }
    }

    /// Local proxy path, app served from the development server.
    #[must_use]
    pub fn development() -> Self {
        Self {
            base_url: DEVELOPMENT_BASE_URL.to_string(),
            app_origin: Some(DEVELOPMENT_APP_ORIGIN.to_string()),
            ..Self::production()
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

impl MonitorConfig {
    /// Production preset overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed values.
    pub fn from_env() -> Result<Self> {
        Self::production().overlay(std::env::vars())
    }

    /// Applies `WATERTANK_*` variables from `vars`; others are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed values.
    pub fn overlay<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                "WATERTANK_BASE_URL" => self.base_url = value,
                "WATERTANK_STATUS_TIMEOUT_MS" => {
                    self.status_timeout = parse_millis("WATERTANK_STATUS_TIMEOUT_MS", &value)?;
                }
                "WATERTANK_WATER_TIMEOUT_MS" => {
                    self.water_timeout = parse_millis("WATERTANK_WATER_TIMEOUT_MS", &value)?;
                }
                PLATFORM_ENV => self.platform = Some(value.parse()?),
                "WATERTANK_APP_ORIGIN" => self.app_origin = Some(value),
                "WATERTANK_DEV_PROXY" => self.dev_proxy = Some(value),
                "WATERTANK_CHECKING_INDICATOR" => {
                    self.checking_indicator = parse_flag("WATERTANK_CHECKING_INDICATOR", &value)?;
                }
                _ => {}
            }
        }
        Ok(self)
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| Error::config(format!("{key}: expected milliseconds, got '{value}' ({e})")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::config(format!("{key}: expected a boolean, got '{value}'"))),
    }
}

// ============================================================================
// Validation & Accessors
// ============================================================================

impl MonitorConfig {
    /// Checks URLs and timeouts.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if a URL does not parse
    /// - [`Error::Config`] if the base URL is not http(s) or a timeout is zero
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        self.app_origin()?;
        self.dev_proxy()?;

        if self.status_timeout.is_zero() || self.water_timeout.is_zero() {
            return Err(Error::config("Request timeouts must be greater than zero"));
        }
        Ok(())
    }

    /// Parsed base URL.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if it does not parse
    /// - [`Error::Config`] if the scheme is not http(s)
    pub fn base_url(&self) -> Result<Url> {
        http_url("base_url", &self.base_url)
    }

    /// Parsed app origin, if set.
    ///
    /// # Errors
    ///
    /// Same as [`base_url`](Self::base_url).
    pub fn app_origin(&self) -> Result<Option<Url>> {
        self.app_origin
            .as_deref()
            .map(|origin| http_url("app_origin", origin))
            .transpose()
    }

    /// Parsed development proxy, if set.
    ///
    /// # Errors
    ///
    /// Same as [`base_url`](Self::base_url).
    pub fn dev_proxy(&self) -> Result<Option<Url>> {
        self.dev_proxy
            .as_deref()
            .map(|proxy| http_url("dev_proxy", proxy))
            .transpose()
    }
}

fn http_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::config(format!(
            "{field} must use http or https, got '{scheme}'"
        ))),
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
