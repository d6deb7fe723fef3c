//! Device monitor: connection state machine and check orchestration.
//!
//! # Example
//!
//! ```no_run
//! use watertank_monitor::DeviceMonitor;
//!
//! # async fn example() -> watertank_monitor::Result<()> {
//! let monitor = DeviceMonitor::builder().build()?;
//! let mut states = monitor.subscribe_state();
//!
//! tokio::spawn(async move {
//!     while let Ok(state) = states.recv().await {
//!         println!("state: {state}");
//!     }
//! });
//!
//! let reading = monitor.check_water_level().await?;
//! println!("tank at {}%", reading.level);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::MonitorConfig;
use crate::error::{Error, OfflineContext, Result};
use crate::protocol::{Endpoint, StatusResponse, WaterResponse};
use crate::transport::{Platform, Transport};

use super::builder::MonitorBuilder;
use super::channel::{Channel, Subscription};
use super::state::{ConnectionState, DeviceStatus, WaterLevelReading};

// ============================================================================
// Constants
// ============================================================================

/// Delay before the startup status check.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_millis(500);

// ============================================================================
// Types
// ============================================================================

/// What a failure does to the last known level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelPolicy {
    /// Level is unknown after this failure.
    Clear,
    /// Device was reachable; keep the previous level.
    Keep,
}

/// Changes published together.
#[derive(Debug, Default)]
struct Update {
    state: Option<ConnectionState>,
    error: Option<Option<String>>,
    level: Option<Option<f64>>,
}

impl Update {
    fn state(state: ConnectionState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }
}

/// Consistent view of the three channels.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSnapshot {
    /// Current connection state.
    pub state: ConnectionState,
    /// Last known level, 0-100.
    pub level: Option<f64>,
    /// Active error message.
    pub error: Option<String>,
    /// When `level` was last published with a reading.
    pub last_update: Option<Instant>,
}

/// Publication rights of one running check.
///
/// Publishes only while the monitor has not been reset since the check
/// began. Dropped while armed, i.e. the check future was abandoned, it
/// settles the monitor in `Error` so no transient state outlives the check.
struct CheckScope<'a> {
    monitor: &'a DeviceMonitor,
    epoch: u64,
    operation: &'static str,
    /// Level policy for an abandoned check.
    on_cancel: LevelPolicy,
    armed: bool,
}

impl CheckScope<'_> {
    fn publish(&self, update: Update) {
        self.monitor.apply_since(self.epoch, update);
    }

    fn succeed(mut self, update: Update) {
        self.armed = false;
        self.publish(update);
    }

    fn fail(mut self, err: &Error, policy: LevelPolicy) {
        self.armed = false;
        self.monitor.fail(self.epoch, err, policy);
    }
}

impl Drop for CheckScope<'_> {
    fn drop(&mut self) {
        if self.armed {
            let err = Error::cancelled(self.operation);
            self.monitor.fail(self.epoch, &err, self.on_cancel);
        }
    }
}

/// Internal shared state for the monitor.
pub(crate) struct MonitorInner {
    /// Request mechanism, fixed at build time.
    transport: Arc<dyn Transport>,
    /// Resolved `/status` URL.
    status_url: Url,
    /// Resolved `/water` URL.
    water_url: Url,
    status_timeout: Duration,
    water_timeout: Duration,
    checking_indicator: bool,

    /// Serializes checks.
    check_lock: tokio::sync::Mutex<()>,
    /// Reset counter. Held while publishing, which makes multi-channel
    /// updates and snapshots atomic.
    epoch: Mutex<u64>,

    state: Channel<ConnectionState>,
    level: Channel<Option<f64>>,
    error: Channel<Option<String>>,
    last_update: Mutex<Option<Instant>>,
}

// ============================================================================
// DeviceMonitor
// ============================================================================

/// Connection monitor for one water-tank sensor.
///
/// Cheap to clone; clones share state. Checks are serialized internally:
/// [`check_status`](Self::check_status) and
/// [`check_water_level`](Self::check_water_level) wait for a running check
/// to finish, the `try_` variants return `Ok(None)` instead.
///
/// # Channels
///
/// | Channel | Accessor | Subscription |
/// |---------|----------|--------------|
/// | state | [`current_state`](Self::current_state) | [`subscribe_state`](Self::subscribe_state) |
/// | level | [`last_known_level`](Self::last_known_level) | [`subscribe_level`](Self::subscribe_level) |
/// | error | [`current_error`](Self::current_error) | [`subscribe_error`](Self::subscribe_error) |
#[derive(Clone)]
pub struct DeviceMonitor {
    /// Shared inner state.
    pub(crate) inner: Arc<MonitorInner>,
}

// ============================================================================
// DeviceMonitor - Display
// ============================================================================

impl fmt::Debug for DeviceMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceMonitor")
            .field("status_url", &self.inner.status_url.as_str())
            .field("platform", &self.platform())
            .field("state", &self.current_state())
            .field("level", &self.last_known_level())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// DeviceMonitor - Construction
// ============================================================================

impl DeviceMonitor {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    /// Creates a monitor over `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL is invalid.
    pub(crate) fn new(transport: Arc<dyn Transport>, config: &MonitorConfig) -> Result<Self> {
        let base = config.base_url()?;

        let inner = MonitorInner {
            transport,
            status_url: Endpoint::Status.url(&base)?,
            water_url: Endpoint::Water.url(&base)?,
            status_timeout: config.status_timeout,
            water_timeout: config.water_timeout,
            checking_indicator: config.checking_indicator,
            check_lock: tokio::sync::Mutex::new(()),
            epoch: Mutex::new(0),
            state: Channel::new(ConnectionState::Idle),
            level: Channel::new(None),
            error: Channel::new(None),
            last_update: Mutex::new(None),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }
}

// ============================================================================
// DeviceMonitor - Checks
// ============================================================================

impl DeviceMonitor {
    /// Asks the device whether it is online.
    ///
    /// Returns the decoded status, including `connected: false` when the
    /// device answers `"offline"`; in that case the state becomes `Error`
    /// with `"Device is offline"` and the known level is cleared.
    ///
    /// # Errors
    ///
    /// Transport failures and timeouts (5 s by default). The state becomes
    /// `Error`, the level is cleared and the classified message is published.
    pub async fn check_status(&self) -> Result<DeviceStatus> {
        let _check = self.inner.check_lock.lock().await;
        self.run_status_check().await
    }

    /// Confirms the device is online, then reads the water level.
    ///
    /// The water read happens without a visible `Checking` state unless the
    /// checking indicator is enabled.
    ///
    /// # Errors
    ///
    /// - [`Error::DeviceOffline`] if the status phase reports offline; the
    ///   level is cleared and no water read is attempted
    /// - transport failures of either phase; the level is kept
    pub async fn check_water_level(&self) -> Result<WaterLevelReading> {
        let _check = self.inner.check_lock.lock().await;
        self.run_water_check().await
    }

    /// Like [`check_status`](Self::check_status), but does nothing and
    /// returns `Ok(None)` if a check is already running.
    ///
    /// # Errors
    ///
    /// Same as [`check_status`](Self::check_status).
    pub async fn try_check_status(&self) -> Result<Option<DeviceStatus>> {
        let Ok(_check) = self.inner.check_lock.try_lock() else {
            debug!("Status check ignored, another check is running");
            return Ok(None);
        };
        self.run_status_check().await.map(Some)
    }

    /// Like [`check_water_level`](Self::check_water_level), but does
    /// nothing and returns `Ok(None)` if a check is already running.
    ///
    /// # Errors
    ///
    /// Same as [`check_water_level`](Self::check_water_level).
    pub async fn try_check_water_level(&self) -> Result<Option<WaterLevelReading>> {
        let Ok(_check) = self.inner.check_lock.try_lock() else {
            debug!("Water level check ignored, another check is running");
            return Ok(None);
        };
        self.run_water_check().await.map(Some)
    }

    /// Runs a status check after `delay` on the current runtime.
    ///
    /// Used once at application start, with [`DEFAULT_STARTUP_DELAY`].
    pub fn spawn_startup_check(&self, delay: Duration) -> JoinHandle<Result<DeviceStatus>> {
        let monitor = self.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            info!("Performing initial status check");
            monitor.check_status().await
        })
    }

    /// Returns to `Idle` and clears the error. The known level is kept.
    ///
    /// A check still running keeps its request going and returns its result
    /// to its caller, but publishes nothing more.
    pub fn reset(&self) {
        let mut epoch = self.inner.epoch.lock();
        *epoch = epoch.wrapping_add(1);
        self.publish_locked(Update {
            state: Some(ConnectionState::Idle),
            error: Some(None),
            level: None,
        });
        debug!(epoch = *epoch, "Monitor reset");
    }
}

// ============================================================================
// DeviceMonitor - Accessors
// ============================================================================

impl DeviceMonitor {
    /// Current connection state.
    #[inline]
    #[must_use]
    pub fn current_state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Last published water level, 0-100.
    #[inline]
    #[must_use]
    pub fn last_known_level(&self) -> Option<f64> {
        self.inner.level.get()
    }

    /// Active error message.
    #[inline]
    #[must_use]
    pub fn current_error(&self) -> Option<String> {
        self.inner.error.get()
    }

    /// When a reading was last published.
    #[inline]
    #[must_use]
    pub fn last_update(&self) -> Option<Instant> {
        *self.inner.last_update.lock()
    }

    /// All channels read under one lock.
    #[must_use]
    pub fn snapshot(&self) -> MonitorSnapshot {
        let _epoch = self.inner.epoch.lock();
        MonitorSnapshot {
            state: self.inner.state.get(),
            level: self.inner.level.get(),
            error: self.inner.error.get(),
            last_update: *self.inner.last_update.lock(),
        }
    }

    /// Returns `true` while a check is running.
    #[inline]
    #[must_use]
    pub fn is_checking(&self) -> bool {
        self.inner.check_lock.try_lock().is_err()
    }

    /// Platform of the selected transport.
    #[inline]
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.inner.transport.platform()
    }

    /// Subscribes to state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> Subscription<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Subscribes to level updates; `None` means unknown.
    #[must_use]
    pub fn subscribe_level(&self) -> Subscription<Option<f64>> {
        self.inner.level.subscribe()
    }

    /// Subscribes to error messages; `None` means cleared.
    #[must_use]
    pub fn subscribe_error(&self) -> Subscription<Option<String>> {
        self.inner.error.subscribe()
    }
}

// ============================================================================
// DeviceMonitor - Internal API
// ============================================================================

impl DeviceMonitor {
    /// Status check body; caller holds the check lock.
    async fn run_status_check(&self) -> Result<DeviceStatus> {
        let scope = self.begin("status check", LevelPolicy::Clear);

        match self.fetch_status().await {
            Ok(status) if status.connected => {
                info!(signal = ?status.signal, uptime = ?status.uptime, "Device online");
                scope.succeed(Update::state(ConnectionState::Connected));
                Ok(status)
            }
            Ok(status) => {
                scope.fail(
                    &Error::device_offline(OfflineContext::Status),
                    LevelPolicy::Clear,
                );
                Ok(status)
            }
            Err(err) => {
                scope.fail(&err, LevelPolicy::Clear);
                Err(err)
            }
        }
    }

    /// Composite check body; caller holds the check lock.
    async fn run_water_check(&self) -> Result<WaterLevelReading> {
        let scope = self.begin("water level check", LevelPolicy::Keep);

        let status = match self.fetch_status().await {
            Ok(status) => status,
            Err(err) => {
                scope.fail(&err, LevelPolicy::Keep);
                return Err(err);
            }
        };

        if !status.connected {
            let err = Error::device_offline(OfflineContext::WaterLevel);
            scope.fail(&err, LevelPolicy::Clear);
            return Err(err);
        }

        scope.publish(Update::state(ConnectionState::Connected));
        if self.inner.checking_indicator {
            scope.publish(Update::state(ConnectionState::Checking));
        }
        debug!("Device confirmed online, reading water level");

        match self.fetch_water().await {
            Ok(reading) => {
                info!(
                    level = reading.level,
                    status = ?reading.status,
                    battery = ?reading.battery,
                    "Water level updated"
                );
                scope.succeed(Update {
                    state: Some(ConnectionState::Connected),
                    error: None,
                    level: Some(Some(reading.level)),
                });
                Ok(reading)
            }
            Err(err) => {
                scope.fail(&err, LevelPolicy::Keep);
                Err(err)
            }
        }
    }

    /// Enters `Connecting`, clears the error and opens a check scope.
    fn begin(&self, operation: &'static str, on_cancel: LevelPolicy) -> CheckScope<'_> {
        let epoch = self.inner.epoch.lock();
        self.publish_locked(Update {
            state: Some(ConnectionState::Connecting),
            error: Some(None),
            level: None,
        });

        CheckScope {
            monitor: self,
            epoch: *epoch,
            operation,
            on_cancel,
            armed: true,
        }
    }

    /// Enters `Error` with the classified message, unless reset since `epoch`.
    fn fail(&self, epoch: u64, err: &Error, policy: LevelPolicy) {
        warn!(kind = ?err.kind(), error = %err, ?policy, "Check failed");
        self.apply_since(
            epoch,
            Update {
                state: Some(ConnectionState::Error),
                error: Some(Some(err.user_message())),
                level: (policy == LevelPolicy::Clear).then_some(None),
            },
        );
    }

    /// Publishes `update` if no reset happened since `epoch`.
    fn apply_since(&self, epoch: u64, update: Update) {
        let current = self.inner.epoch.lock();
        if *current != epoch {
            debug!(?update, "Monitor was reset during the check, update dropped");
            return;
        }
        self.publish_locked(update);
    }

    /// Publishes state, then error, then level. Caller holds `epoch`.
    fn publish_locked(&self, update: Update) {
        if let Some(state) = update.state {
            let previous = self.inner.state.get();
            if self.inner.state.publish_if_changed(state) {
                debug!(from = ?previous, to = ?state, "State transition");
            }
        }

        if let Some(error) = update.error {
            self.inner.error.publish_if_changed(error);
        }

        match update.level {
            Some(Some(level)) => {
                *self.inner.last_update.lock() = Some(Instant::now());
                self.inner.level.publish(Some(level));
            }
            Some(None) => {
                self.inner.level.publish_if_changed(None);
            }
            None => {}
        }
    }

    async fn fetch_status(&self) -> Result<DeviceStatus> {
        let response: StatusResponse = self
            .request(Endpoint::Status, &self.inner.status_url, self.inner.status_timeout)
            .await?;
        Ok(response.into())
    }

    async fn fetch_water(&self) -> Result<WaterLevelReading> {
        let response: WaterResponse = self
            .request(Endpoint::Water, &self.inner.water_url, self.inner.water_timeout)
            .await?;
        WaterLevelReading::try_from(response)
    }

    /// One GET under its own budget; the request is dropped on expiry.
    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        url: &Url,
        budget: Duration,
    ) -> Result<T> {
        let timeout_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        debug!(url = %url, timeout_ms, "Requesting {endpoint}");

        let value: Value = timeout(budget, self.inner.transport.fetch_json(url))
            .await
            .map_err(|_| Error::timeout(format!("GET {endpoint}"), timeout_ms))??;

        Ok(serde_json::from_value(value)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::error::FailureKind;
    use crate::transport::{MemoryTransport, Reply};

    fn online() -> Reply {
        Reply::json(json!({ "status": "online", "rssi": -65, "uptime": 120, "timestamp": 1000 }))
    }

    fn offline() -> Reply {
        Reply::json(json!({ "status": "offline" }))
    }

    fn water(percentage: f64) -> Reply {
        Reply::json(json!({
            "percentage": percentage,
            "status": "normal",
            "battery": 80,
            "timestamp": 2000
        }))
    }

    fn monitor(device: &Arc<MemoryTransport>) -> DeviceMonitor {
        DeviceMonitor::builder()
            .transport(Arc::clone(device))
            .build()
            .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let device = Arc::new(MemoryTransport::new());
        let snapshot = monitor(&device).snapshot();

        assert_eq!(snapshot.state, ConnectionState::Idle);
        assert_eq!(snapshot.level, None);
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.last_update, None);
    }

    #[test]
    fn test_monitor_is_clone_and_debug() {
        fn assert_traits<T: Clone + fmt::Debug + Send + Sync>() {}
        assert_traits::<DeviceMonitor>();
    }

    #[tokio::test]
    async fn test_check_status_online() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online());
        let monitor = monitor(&device);

        let status = monitor.check_status().await.unwrap();

        assert_eq!(
            status,
            DeviceStatus {
                connected: true,
                signal: Some(-65),
                uptime: Some(120),
                last_seen: Some(1000),
            }
        );
        assert_eq!(monitor.current_state(), ConnectionState::Connected);
        assert_eq!(monitor.current_error(), None);
    }

    #[tokio::test]
    async fn test_check_status_transitions_in_order() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online());
        let monitor = monitor(&device);
        let mut states = monitor.subscribe_state();

        monitor.check_status().await.unwrap();

        assert_eq!(
            states.drain(),
            vec![
                ConnectionState::Idle,
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[tokio::test]
    async fn test_check_status_offline_clears_level() {
        let device = Arc::new(MemoryTransport::new());
        device.once("/status", online()).on("/water", water(42.0));
        let monitor = monitor(&device);
        monitor.check_water_level().await.unwrap();
        assert_eq!(monitor.last_known_level(), Some(42.0));

        device.on("/status", offline());
        let status = monitor.check_status().await.unwrap();

        assert!(!status.connected);
        assert_eq!(monitor.current_state(), ConnectionState::Error);
        assert_eq!(monitor.current_error().as_deref(), Some("Device is offline"));
        assert_eq!(monitor.last_known_level(), None);
    }

    #[tokio::test]
    async fn test_check_status_transport_error_clears_level() {
        let device = Arc::new(MemoryTransport::new());
        device.once("/status", online()).on("/water", water(55.0));
        let monitor = monitor(&device);
        monitor.check_water_level().await.unwrap();

        device.on("/status", Reply::status(404));
        let err = monitor.check_status().await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::NotFound);
        assert_eq!(monitor.current_state(), ConnectionState::Error);
        assert_eq!(monitor.current_error(), Some(err.user_message()));
        assert_eq!(monitor.last_known_level(), None);
    }

    #[tokio::test]
    async fn test_check_water_level_success() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online()).on("/water", water(42.0));
        let monitor = monitor(&device);
        let mut levels = monitor.subscribe_level();

        let reading = monitor.check_water_level().await.unwrap();

        assert_eq!(
            reading,
            WaterLevelReading {
                level: 42.0,
                timestamp: 2000,
                status: Some("normal".into()),
                battery: Some(80.0),
            }
        );
        assert_eq!(levels.drain(), vec![None, Some(42.0)]);
        assert_eq!(monitor.current_state(), ConnectionState::Connected);
        assert!(monitor.last_update().is_some());
        assert_eq!(device.requests(), vec!["/status", "/water"]);
    }

    #[tokio::test]
    async fn test_check_water_level_never_shows_checking_by_default() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online()).on("/water", water(10.0));
        let monitor = monitor(&device);
        let mut states = monitor.subscribe_state();

        monitor.check_water_level().await.unwrap();

        assert_eq!(
            states.drain(),
            vec![
                ConnectionState::Idle,
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[tokio::test]
    async fn test_checking_indicator() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online()).on("/water", water(10.0));
        let monitor = DeviceMonitor::builder()
            .transport(Arc::clone(&device))
            .checking_indicator(true)
            .build()
            .unwrap();
        let mut states = monitor.subscribe_state();

        monitor.check_water_level().await.unwrap();

        assert_eq!(
            states.drain(),
            vec![
                ConnectionState::Idle,
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Checking,
                ConnectionState::Connected,
            ]
        );
    }

    #[tokio::test]
    async fn test_check_water_level_offline() {
        let device = Arc::new(MemoryTransport::new());
        device.once("/status", online()).on("/water", water(42.0));
        let monitor = monitor(&device);
        monitor.check_water_level().await.unwrap();

        device.on("/status", offline());
        device.clear_requests();
        let err = monitor.check_water_level().await.unwrap_err();

        assert!(err.is_offline());
        assert_eq!(monitor.current_state(), ConnectionState::Error);
        assert_eq!(
            monitor.current_error().as_deref(),
            Some("Device is offline. Cannot check water level.")
        );
        assert_eq!(monitor.last_known_level(), None);
        assert_eq!(device.request_count("/water"), 0);
    }

    #[tokio::test]
    async fn test_water_read_failure_keeps_level() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online()).once("/water", water(64.0));
        let monitor = monitor(&device);
        monitor.check_water_level().await.unwrap();

        device.on("/water", Reply::status(500));
        let err = monitor.check_water_level().await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(monitor.current_state(), ConnectionState::Error);
        assert_eq!(
            monitor.current_error().as_deref(),
            Some("Device internal error. Check sensor connections.")
        );
        assert_eq!(monitor.last_known_level(), Some(64.0));
    }

    #[tokio::test]
    async fn test_composite_status_failure_keeps_level() {
        let device = Arc::new(MemoryTransport::new());
        device.once("/status", online()).on("/water", water(30.0));
        let monitor = monitor(&device);
        monitor.check_water_level().await.unwrap();

        device.on("/status", Reply::Unreachable);
        let err = monitor.check_water_level().await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Unreachable);
        assert_eq!(monitor.last_known_level(), Some(30.0));
    }

    #[tokio::test]
    async fn test_malformed_status_body() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", Reply::json(json!({ "rssi": -40 })));
        let monitor = monitor(&device);

        let err = monitor.check_status().await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Malformed);
        assert_eq!(monitor.current_state(), ConnectionState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_timeout() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", Reply::Hang);
        let monitor = monitor(&device);

        let started = tokio::time::Instant::now();
        let err = monitor.check_status().await.unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(monitor.current_state(), ConnectionState::Error);
        assert_eq!(
            monitor.current_error().as_deref(),
            Some("Device response timeout. Device may be offline.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_water_timeout_has_own_budget() {
        let device = Arc::new(MemoryTransport::new());
        device
            .on("/status", online().after(Duration::from_millis(4900)))
            .on("/water", Reply::Hang);
        let monitor = monitor(&device);

        let started = tokio::time::Instant::now();
        let err = monitor.check_water_level().await.unwrap_err();

        assert!(matches!(err, Error::Timeout { timeout_ms: 8000, .. }));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(12_900));
        assert!(elapsed < Duration::from_secs(13));
    }

    #[tokio::test]
    async fn test_new_check_clears_error() {
        let device = Arc::new(MemoryTransport::new());
        device.once("/status", Reply::Unreachable).on("/status", online());
        let monitor = monitor(&device);
        let mut errors = monitor.subscribe_error();

        monitor.check_status().await.unwrap_err();
        monitor.check_status().await.unwrap();

        let published = errors.drain();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0], None);
        assert!(published[1].as_deref().unwrap().starts_with("Cannot connect"));
        assert_eq!(published[2], None);
        assert_eq!(monitor.current_state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_reset_keeps_level() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online()).once("/water", water(77.0));
        let monitor = monitor(&device);
        monitor.check_water_level().await.unwrap();
        device.on("/water", Reply::status(503));
        monitor.check_water_level().await.unwrap_err();

        monitor.reset();

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Idle);
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.level, Some(77.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_check_is_noop_while_busy() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online().after(Duration::from_secs(1)));
        let monitor = monitor(&device);

        let running = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.check_status().await }
        });
        tokio::task::yield_now().await;
        assert!(monitor.is_checking());

        assert!(monitor.try_check_status().await.unwrap().is_none());
        assert!(monitor.try_check_water_level().await.unwrap().is_none());

        running.await.unwrap().unwrap();
        assert!(!monitor.is_checking());
        assert_eq!(device.request_count("/status"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_status_check_settles_in_error() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online().after(Duration::from_secs(3)));
        let monitor = monitor(&device);

        let abandoned = timeout(Duration::from_secs(1), monitor.check_status()).await;
        assert!(abandoned.is_err());

        assert_eq!(monitor.current_state(), ConnectionState::Error);
        assert_eq!(
            monitor.current_error().as_deref(),
            Some("Check cancelled before the device answered.")
        );
        assert!(!monitor.is_checking());

        monitor.check_status().await.unwrap();
        assert_eq!(monitor.current_state(), ConnectionState::Connected);
        assert_eq!(monitor.current_error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_water_read_keeps_level() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online()).once("/water", water(35.0));
        let monitor = DeviceMonitor::builder()
            .transport(Arc::clone(&device))
            .checking_indicator(true)
            .build()
            .unwrap();
        monitor.check_water_level().await.unwrap();

        device.on("/water", Reply::Hang);
        let mut states = monitor.subscribe_state();
        let aborted = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.check_water_level().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(monitor.current_state(), ConnectionState::Checking);
        aborted.abort();
        assert!(aborted.await.unwrap_err().is_cancelled());

        assert_eq!(monitor.current_state(), ConnectionState::Error);
        assert_eq!(monitor.last_known_level(), Some(35.0));
        assert_eq!(
            states.drain(),
            vec![
                ConnectionState::Connected,
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Checking,
                ConnectionState::Error,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_check_is_not_overwritten() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online().after(Duration::from_secs(1)));
        let monitor = monitor(&device);
        let mut states = monitor.subscribe_state();

        let running = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.check_status().await }
        });
        tokio::task::yield_now().await;
        assert_eq!(monitor.current_state(), ConnectionState::Connecting);

        monitor.reset();
        let status = running.await.unwrap().unwrap();

        assert!(status.connected);
        assert_eq!(monitor.current_state(), ConnectionState::Idle);
        assert_eq!(
            states.drain(),
            vec![
                ConnectionState::Idle,
                ConnectionState::Connecting,
                ConnectionState::Idle,
            ]
        );
    }

    #[tokio::test]
    async fn test_unread_subscriber_receives_every_transition() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online());
        let monitor = monitor(&device);
        let mut states = monitor.subscribe_state();

        for _ in 0..40 {
            monitor.check_status().await.unwrap();
        }

        let transitions = states.drain();
        assert_eq!(transitions.len(), 81);
        assert_eq!(transitions[0], ConnectionState::Idle);
        for pair in transitions[1..].chunks(2) {
            assert_eq!(pair, [ConnectionState::Connecting, ConnectionState::Connected]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_checks_are_serialized() {
        let device = Arc::new(MemoryTransport::new());
        device
            .on("/status", online().after(Duration::from_millis(300)))
            .on("/water", water(50.0).after(Duration::from_millis(300)));
        let monitor = monitor(&device);
        let mut states = monitor.subscribe_state();

        let (status, reading) = tokio::join!(monitor.check_status(), monitor.check_water_level());
        status.unwrap();
        reading.unwrap();

        let transitions = states.drain();
        for pair in transitions.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "illegal edge {:?} -> {:?}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(monitor.current_state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_check() {
        let device = Arc::new(MemoryTransport::new());
        device.on("/status", online());
        let monitor = monitor(&device);

        let handle = monitor.spawn_startup_check(DEFAULT_STARTUP_DELAY);
        tokio::task::yield_now().await;
        assert_eq!(device.request_count("/status"), 0);

        let status = handle.await.unwrap().unwrap();
        assert!(status.connected);
        assert_eq!(monitor.current_state(), ConnectionState::Connected);
    }
}
