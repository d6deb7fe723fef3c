//! Error types for the water-tank monitor.
//!
//! Every fallible operation returns [`Result<T>`] which uses [`Error`].
//! Transport failures keep the HTTP status (when one was obtained) so the
//! monitor can classify them into a [`FailureKind`] and render the message
//! published on the error channel.
//!
//! # Usage
//!
//! ```ignore
//! use watertank_monitor::{DeviceMonitor, Result};
//!
//! async fn example(monitor: &DeviceMonitor) -> Result<()> {
//!     let reading = monitor.check_water_level().await?;
//!     println!("tank at {}%", reading.level);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] |
//! | Transport | [`Error::Network`], [`Error::Http`], [`Error::Timeout`], [`Error::Cancelled`] |
//! | Device | [`Error::DeviceOffline`] |
//! | Payload | [`Error::Json`], [`Error::Decode`] |
//! | Subscription | [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// OfflineContext
// ============================================================================

/// Which operation found the device reporting itself offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineContext {
    /// Plain status check.
    Status,
    /// Composite water-level check (status phase).
    WaterLevel,
}

impl OfflineContext {
    /// Message published when the device answers `"offline"`.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Status => "Device is offline",
            Self::WaterLevel => "Device is offline. Cannot check water level.",
        }
    }
}

impl fmt::Display for OfflineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

// ============================================================================
// FailureKind
// ============================================================================

/// Stable classification of a failed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No HTTP status obtained; host unreachable.
    Unreachable,
    /// Request rejected by same-origin rules.
    CrossOrigin,
    /// Endpoint missing (404), firmware or hostname mismatch.
    NotFound,
    /// 408/504 or local timeout expiry.
    Timeout,
    /// Device-reported internal fault (500).
    ServerFault,
    /// Any other non-success HTTP status.
    DeviceError,
    /// Device answered but reports itself offline.
    Offline,
    /// Body could not be decoded.
    Malformed,
    /// Local misconfiguration or subscription failure.
    Local,
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when monitor configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// No HTTP status was obtained.
    ///
    /// `cross_origin` is set when the failure is a detected same-origin
    /// rejection rather than plain unreachability.
    #[error("Network error: {message}")]
    Network {
        /// Diagnostic message from the transport.
        message: String,
        /// Whether the request was rejected by cross-origin rules.
        cross_origin: bool,
    },

    /// Device answered with a non-success status.
    #[error("HTTP {status}: {reason}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Reason phrase or response body text.
        reason: String,
    },

    /// Check future dropped before the check completed.
    #[error("Cancelled: {operation}")]
    Cancelled {
        /// Check that was abandoned.
        operation: String,
    },

    /// No response within the per-call budget.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the request that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// Status endpoint answered `"offline"`.
    #[error("{context}")]
    DeviceOffline {
        /// Operation that observed the offline report.
        context: OfflineContext,
    },

    // ========================================================================
    // Payload Errors
    // ========================================================================
    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Body decoded but is not usable.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decoding problem.
        message: String,
    },

    // ========================================================================
    // Subscription Errors
    // ========================================================================
    /// Monitor dropped; no more updates will arrive.
    #[error("Channel closed")]
    ChannelClosed,
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a network error (host unreachable).
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            cross_origin: false,
        }
    }

    /// Creates a cross-origin rejection.
    #[inline]
    pub fn cross_origin(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            cross_origin: true,
        }
    }

    /// Creates an HTTP status error.
    #[inline]
    pub fn http(status: u16, reason: impl Into<String>) -> Self {
        Self::Http {
            status,
            reason: reason.into(),
        }
    }

    /// Creates a cancellation error.
    #[inline]
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a device offline error.
    #[inline]
    pub fn device_offline(context: OfflineContext) -> Self {
        Self::DeviceOffline { context }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

impl Error {
    /// HTTP status carried by the error, `None` for pure network failure.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classifies the error into the failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network {
                cross_origin: true, ..
            } => FailureKind::CrossOrigin,
            Self::Network { .. } => FailureKind::Unreachable,
            Self::Http { status: 404, .. } => FailureKind::NotFound,
            Self::Http {
                status: 408 | 504, ..
            }
            | Self::Timeout { .. } => FailureKind::Timeout,
            Self::Http { status: 500, .. } => FailureKind::ServerFault,
            Self::Http { .. } => FailureKind::DeviceError,
            Self::DeviceOffline { .. } => FailureKind::Offline,
            Self::Json(_) | Self::Decode { .. } => FailureKind::Malformed,
            Self::Config { .. }
            | Self::InvalidUrl(_)
            | Self::Cancelled { .. }
            | Self::ChannelClosed => FailureKind::Local,
        }
    }

    /// Human-readable message for the error channel.
    #[must_use]
    pub fn user_message(&self) -> String {
        match (self.kind(), self) {
            (FailureKind::Unreachable, _) => {
                "Cannot connect to the device. Check that it is powered and connected to WiFi."
                    .to_string()
            }
            (FailureKind::CrossOrigin, _) => {
                "Cross-origin request rejected: the device does not allow requests from this \
                 app origin. Configure CORS headers on the device or use the development proxy."
                    .to_string()
            }
            (FailureKind::NotFound, _) => {
                "Device endpoint not found. Check device firmware and hostname configuration."
                    .to_string()
            }
            (FailureKind::Timeout, _) => {
                "Device response timeout. Device may be offline.".to_string()
            }
            (FailureKind::ServerFault, _) => {
                "Device internal error. Check sensor connections.".to_string()
            }
            (FailureKind::DeviceError, Self::Http { status, reason }) => {
                format!("Device error: {status} - {reason}")
            }
            (FailureKind::Offline, Self::DeviceOffline { context }) => context.message().to_string(),
            (FailureKind::Malformed, err) => format!("Unexpected response from device: {err}"),
            (_, Self::Cancelled { .. }) => {
                "Check cancelled before the device answered.".to_string()
            }
            (_, err) => err.to_string(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind() == FailureKind::Timeout
    }

    /// Returns `true` if the device answered `"offline"`.
    #[inline]
    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::DeviceOffline { .. })
    }

    /// Returns `true` if no HTTP exchange completed.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if this error may succeed on another attempt.
    ///
    /// Sleeping devices wake up, so unreachability counts as recoverable.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Unreachable | FailureKind::Timeout | FailureKind::Offline
        )
    }
}

// ============================================================================
// External Conversions
// ============================================================================

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::http(status.as_u16(), status.canonical_reason().unwrap_or(""));
        }
        if err.is_decode() {
            return Self::decode(err.to_string());
        }
        if err.is_builder() {
            return Self::config(err.to_string());
        }
        Self::network(err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
