//! Builder pattern for monitor configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use watertank_monitor::{DeviceMonitor, Platform};
//!
//! # fn example() -> watertank_monitor::Result<()> {
//! let monitor = DeviceMonitor::builder()
//!     .base_url("http://agent-water.local")
//!     .status_timeout(Duration::from_secs(5))
//!     .platform(Platform::Native)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::transport::{Platform, PlatformProbe, Transport, select_transport};

use super::core::DeviceMonitor;

// ============================================================================
// MonitorBuilder
// ============================================================================

/// Builder for a [`DeviceMonitor`].
///
/// Use [`DeviceMonitor::builder()`] to create a new builder.
#[derive(Clone, Default)]
pub struct MonitorBuilder {
    /// Settings being assembled.
    config: MonitorConfig,
    /// Environment probe; [`Platform::detect`] when unset.
    probe: Option<Arc<dyn PlatformProbe>>,
    /// Ready transport, bypassing platform selection.
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for MonitorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorBuilder")
            .field("config", &self.config)
            .field("custom_probe", &self.probe.is_some())
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

// ============================================================================
// MonitorBuilder Implementation
// ============================================================================

impl MonitorBuilder {
    /// Creates a builder with the production preset.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    #[inline]
    #[must_use]
    pub fn from_config(config: MonitorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the device base URL.
    #[inline]
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Sets the `/status` request budget.
    #[inline]
    #[must_use]
    pub fn status_timeout(mut self, timeout: Duration) -> Self {
        self.config.status_timeout = timeout;
        self
    }

    /// Sets the `/water` request budget.
    #[inline]
    #[must_use]
    pub fn water_timeout(mut self, timeout: Duration) -> Self {
        self.config.water_timeout = timeout;
        self
    }

    /// Forces the platform instead of probing.
    #[inline]
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.config.platform = Some(platform);
        self
    }

    /// Sets the origin the app is served from.
    #[inline]
    #[must_use]
    pub fn app_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.app_origin = Some(origin.into());
        self
    }

    /// Sets the development proxy base.
    #[inline]
    #[must_use]
    pub fn dev_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.config.dev_proxy = Some(proxy.into());
        self
    }

    /// Publishes `Checking` during the water-level read.
    #[inline]
    #[must_use]
    pub fn checking_indicator(mut self, enabled: bool) -> Self {
        self.config.checking_indicator = enabled;
        self
    }

    /// Injects the environment probe.
    #[inline]
    #[must_use]
    pub fn probe(mut self, probe: impl PlatformProbe + 'static) -> Self {
        self.probe = Some(Arc::new(probe));
        self
    }

    /// Uses `transport` instead of selecting one by platform.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Builds the monitor.
    ///
    /// The transport is chosen here, once: an injected transport wins,
    /// then a forced platform, then the probe.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) or
    ///   [`Error::InvalidUrl`](crate::Error::InvalidUrl) for invalid settings
    /// - [`Error::Config`](crate::Error::Config) if the browser platform
    ///   is selected without an app origin
    pub fn build(self) -> Result<DeviceMonitor> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let platform = match (self.config.platform, &self.probe) {
                    (Some(platform), _) => platform,
                    (None, Some(probe)) => probe.platform(),
                    (None, None) => Platform::detect(),
                };
                select_transport(platform, &self.config)?
            }
        };

        info!(
            base_url = %self.config.base_url,
            platform = %transport.platform(),
            "Device monitor configured"
        );

        DeviceMonitor::new(transport, &self.config)
    }
}

// ============================================================================
// Tests
// ============================================================================
