//! Direct transport for natively-hosted builds.
//!
//! Talks to the device host as-is. No `Origin` header is sent and no
//! cross-origin checks apply, which is what lets a packaged app reach a
//! sensor that serves no CORS headers.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

use super::{Platform, Transport, USER_AGENT, read_json};

// ============================================================================
// NativeTransport
// ============================================================================

/// Plain `reqwest` transport.
#[derive(Debug, Clone)]
pub struct NativeTransport {
    client: Client,
}

impl NativeTransport {
    /// Creates a transport with a fresh client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the client cannot be built.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Creates a transport around an existing client.
    #[inline]
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for NativeTransport {
    async fn fetch_json(&self, url: &Url) -> Result<Value> {
        debug!(url = %url, "GET (native)");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| Error::network(format!("{url}: {e}")))?;

        read_json(response).await
    }

    fn platform(&self) -> Platform {
        Platform::Native
    }
}

// ============================================================================
// Tests
// ============================================================================
