//! Client for the logic-analyzer automation service.
//!
//! The capture application exposes a small JSON API on a local port once it
//! is launched in automation mode. Only the calls the trace plugin needs are
//! modelled here.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors from the automation service
#[derive(Debug, Error)]
pub enum AutomationError {
    /// Service unreachable or failing internally; a relaunch may help
    #[error("automation service unavailable: {0}")]
    Unavailable(String),

    /// Service refused the request
    #[error("automation request rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for AutomationError {
    fn from(e: reqwest::Error) -> Self {
        let server_error = e.status().is_some_and(|s| s.is_server_error());
        if e.is_connect() || e.is_timeout() || server_error {
            AutomationError::Unavailable(e.to_string())
        } else {
            AutomationError::Rejected(e.to_string())
        }
    }
}

/// Capture operations the trace plugin drives
#[async_trait]
pub trait AutomationClient: Send {
    /// Check the service is up and ready to accept captures
    async fn connect(&mut self) -> Result<(), AutomationError>;

    async fn start_capture(&mut self, device_id: &str) -> Result<(), AutomationError>;

    async fn stop_capture(&mut self) -> Result<(), AutomationError>;

    /// Save the most recent capture to `path`
    async fn save_capture(&mut self, path: &Path) -> Result<(), AutomationError>;

    /// Discard the capture handle
    async fn close_capture(&mut self) -> Result<(), AutomationError>;

    async fn disconnect(&mut self) -> Result<(), AutomationError>;
}

#[derive(Debug, Deserialize)]
struct StartReply {
    capture_id: u64,
}

/// HTTP/JSON automation client
pub struct HttpAutomationClient {
    client: Client,
    base_url: String,
    capture_id: Option<u64>,
}

impl HttpAutomationClient {
    /// Create a client for the service listening on `127.0.0.1:<port>`
    pub fn new(port: u16, timeout: Duration) -> Result<Self, AutomationError> {
        Self::with_base_url(format!("http://127.0.0.1:{}", port), timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AutomationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AutomationError::Rejected(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            capture_id: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn active_capture(&self) -> Result<u64, AutomationError> {
        self.capture_id
            .ok_or_else(|| AutomationError::Rejected("no active capture".to_string()))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, AutomationError> {
        let response = request.send().await?.error_for_status()?;
        Ok(response)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Response, AutomationError> {
        debug!("automation POST {} {}", path, body);
        self.send(self.client.post(self.url(path)).json(&body)).await
    }
}

#[async_trait]
impl AutomationClient for HttpAutomationClient {
    async fn connect(&mut self) -> Result<(), AutomationError> {
        self.send(self.client.get(self.url("/status"))).await?;
        Ok(())
    }

    async fn start_capture(&mut self, device_id: &str) -> Result<(), AutomationError> {
        let reply: StartReply = self
            .post("/captures", json!({ "device_id": device_id }))
            .await?
            .json()
            .await?;
        self.capture_id = Some(reply.capture_id);
        Ok(())
    }

    async fn stop_capture(&mut self) -> Result<(), AutomationError> {
        let id = self.active_capture()?;
        self.post(&format!("/captures/{}/stop", id), json!({})).await?;
        Ok(())
    }

    async fn save_capture(&mut self, path: &Path) -> Result<(), AutomationError> {
        let id = self.active_capture()?;
        self.post(&format!("/captures/{}/save", id), json!({ "path": path.to_string_lossy() }))
            .await?;
        Ok(())
    }

    async fn close_capture(&mut self) -> Result<(), AutomationError> {
        if let Some(id) = self.capture_id.take() {
            self.send(self.client.delete(self.url(&format!("/captures/{}", id))))
                .await?;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), AutomationError> {
        self.capture_id = None;
        Ok(())
    }
}
