//! Scripted in-process transport.
//!
//! Stands in for the device in tests, benches and demos. Replies are
//! registered per endpoint path and matched against the end of the
//! requested path, so the same script works behind a `/api` proxy base.
//!
//! ```ignore
//! use serde_json::json;
//! use watertank_monitor::transport::{MemoryTransport, Reply};
//!
//! let device = MemoryTransport::new();
//! device
//!     .on("/status", Reply::json(json!({ "status": "online" })))
//!     .once("/water", Reply::status(500));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};

use super::{Platform, Transport};

// ============================================================================
// Reply
// ============================================================================

/// Scripted outcome of one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with this JSON body.
    Json(Value),
    /// Non-success status with reason text.
    Status(u16, String),
    /// No status obtained.
    Unreachable,
    /// Same-origin rejection.
    CrossOrigin,
    /// Wait, then reply.
    Delayed(Duration, Box<Reply>),
    /// Never answer.
    Hang,
}

impl Reply {
    /// 200 with `body`.
    #[inline]
    #[must_use]
    pub fn json(body: Value) -> Self {
        Self::Json(body)
    }

    /// `status` with its canonical reason phrase.
    #[must_use]
    pub fn status(status: u16) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown");
        Self::Status(status, reason.to_string())
    }

    /// This reply after `delay`.
    #[inline]
    #[must_use]
    pub fn after(self, delay: Duration) -> Self {
        Self::Delayed(delay, Box::new(self))
    }
}

// ============================================================================
// MemoryTransport
// ============================================================================

#[derive(Default)]
struct Route {
    queue: VecDeque<Reply>,
    fallback: Option<Reply>,
}

/// Transport answering from a script.
///
/// Unscripted paths answer 404, like firmware without the endpoint.
pub struct MemoryTransport {
    platform: Platform,
    routes: Mutex<FxHashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Creates an empty script reporting [`Platform::Native`].
    #[must_use]
    pub fn new() -> Self {
        Self::for_platform(Platform::Native)
    }

    /// Creates an empty script reporting `platform`.
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            routes: Mutex::new(FxHashMap::default()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request to `path` with `reply` once queued replies run out.
    pub fn on(&self, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .entry(path.to_string())
            .or_default()
            .fallback = Some(reply);
        self
    }

    /// Queues `reply` for the next unanswered request to `path`.
    pub fn once(&self, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .entry(path.to_string())
            .or_default()
            .queue
            .push_back(reply);
        self
    }

    /// Paths requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Number of requests whose path ends with `path`.
    #[must_use]
    pub fn request_count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|requested| requested.ends_with(path))
            .count()
    }

    /// Forgets recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    /// Picks the reply for `path`.
    fn next_reply(&self, path: &str) -> Reply {
        let mut routes = self.routes.lock();
        let route = routes
            .iter_mut()
            .filter(|(key, _)| path.ends_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, route)| route);

        match route {
            Some(route) => route
                .queue
                .pop_front()
                .or_else(|| route.fallback.clone())
                .unwrap_or_else(|| Reply::status(404)),
            None => Reply::status(404),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn fetch_json(&self, url: &Url) -> Result<Value> {
        let path = url.path().to_string();
        self.requests.lock().push(path.clone());

        let mut reply = self.next_reply(&path);
        trace!(%path, ?reply, "Scripted reply");

        loop {
            return match reply {
                Reply::Json(body) => Ok(body),
                Reply::Status(status, reason) => Err(Error::http(status, reason)),
                Reply::Unreachable => Err(Error::network(format!("{url}: connection refused"))),
                Reply::CrossOrigin => Err(Error::cross_origin(format!(
                    "No 'Access-Control-Allow-Origin' header on {url}"
                ))),
                Reply::Delayed(delay, next) => {
                    tokio::time::sleep(delay).await;
                    reply = *next;
                    continue;
                }
                Reply::Hang => future::pending().await,
            };
        }
    }

    fn platform(&self) -> Platform {
        self.platform
    }
}

// ============================================================================
// Tests
// ============================================================================
