//! Same-origin transport for browser-hosted builds.
//!
//! Reproduces the rules an embedded browser enforces on the app:
//!
//! - A request to the app's own origin is always readable.
//! - With a development proxy configured, the target origin is rewritten
//!   onto the proxy (`http://agent-water.local/status` becomes
//!   `http://localhost:8100/api/status`), which makes the request
//!   same-origin.
//! - Any other request carries `Origin` and its response is only readable
//!   if `Access-Control-Allow-Origin` names that origin or `*`. Otherwise
//!   the result is an opaque cross-origin rejection without a status.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCESS_CONTROL_ALLOW_ORIGIN, HeaderMap, ORIGIN};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{Platform, Transport, USER_AGENT, read_json};

// ============================================================================
// BrowserTransport
// ============================================================================

/// Transport applying same-origin rules.
#[derive(Debug, Clone)]
pub struct BrowserTransport {
    client: Client,
    /// Origin the app is served from.
    app_origin: Url,
    /// Development proxy base, e.g. `http://localhost:8100/api`.
    proxy: Option<Url>,
}

impl BrowserTransport {
    /// Creates a transport for an app served from `app_origin`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `app_origin` has no host
    /// - [`Error::Config`] if the client cannot be built
    pub fn new(app_origin: Url, proxy: Option<Url>) -> Result<Self> {
        if !app_origin.origin().is_tuple() {
            return Err(Error::config(format!(
                "App origin must be an http(s) origin, got '{app_origin}'"
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            app_origin,
            proxy,
        })
    }

    /// Serialized app origin, as sent in the `Origin` header.
    #[must_use]
    pub fn origin(&self) -> String {
        self.app_origin.origin().ascii_serialization()
    }

    /// URL actually requested for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the rewritten URL does not parse.
    pub fn resolve(&self, url: &Url) -> Result<Url> {
        let Some(proxy) = &self.proxy else {
            return Ok(url.clone());
        };
        if url.origin() == proxy.origin() {
            return Ok(url.clone());
        }

        let prefix = proxy.as_str().trim_end_matches('/');
        let mut rewritten = Url::parse(&format!("{prefix}{}", url.path()))?;
        rewritten.set_query(url.query());

        debug!(from = %url, to = %rewritten, "Rewrote request onto proxy");
        Ok(rewritten)
    }

    /// Whether `url` shares the app's origin.
    #[inline]
    #[must_use]
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.app_origin.origin()
    }

    /// Whether the response headers let `origin` read the body.
    fn allows(headers: &HeaderMap, origin: &str) -> bool {
        headers
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|allowed| {
                let allowed = allowed.trim();
                allowed == "*" || allowed.eq_ignore_ascii_case(origin)
            })
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    async fn fetch_json(&self, url: &Url) -> Result<Value> {
        let target = self.resolve(url)?;
        let same_origin = self.is_same_origin(&target);
        debug!(url = %target, same_origin, "GET (browser)");

        let mut request = self.client.get(target.clone()).header(ACCEPT, "application/json");
        let origin = self.origin();
        if !same_origin {
            request = request.header(ORIGIN, origin.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::network(format!("{target}: {e}")))?;

        if !same_origin && !Self::allows(response.headers(), &origin) {
            warn!(url = %target, %origin, "Response blocked by same-origin policy");
            return Err(Error::cross_origin(format!(
                "No 'Access-Control-Allow-Origin' header allowing {origin} on {target}"
            )));
        }

        read_json(response).await
    }

    fn platform(&self) -> Platform {
        Platform::Browser
    }
}

// ============================================================================
// Tests
// ============================================================================
