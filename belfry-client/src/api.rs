//! REST client for the messaging API
//!
//! The real-time layer leans on three REST calls: recounts read the
//! caller's private messages and notifications, and connection
//! registration binds a socket id to the alerts conversation. Everything
//! here is read-mostly and failure-tolerant; callers decide whether a
//! failed call aborts a recount or degrades to zero.

use belfry_core::{ConnectionRegistration, Error, PrivateMessage, Result};

/// Thin wrapper over `reqwest` bound to the messaging API base URL
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the given base URL (no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the caller's private-message records.
    pub async fn fetch_private_messages(&self) -> Result<Vec<PrivateMessage>> {
        let url = format!("{}/privateMessages", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Http(e.to_string()))?;

        response
            .json::<Vec<PrivateMessage>>()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Fetch the caller's notification records.
    ///
    /// Only the record count matters to this layer, so the payload stays
    /// untyped. Callers treat an error from this endpoint as an empty set.
    pub async fn fetch_notifications(&self) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}/notifications", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Http(e.to_string()))?;

        response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Register a socket connection for alert routing.
    ///
    /// Best-effort only: the one caller logs and swallows the error.
    pub async fn register_connection(&self, registration: &ConnectionRegistration) -> Result<()> {
        let url = format!("{}/connections", self.base_url);
        self.http
            .post(&url)
            .json(registration)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(())
    }
}
