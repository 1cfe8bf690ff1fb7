//! JSON-over-HTTP transport.

use std::time::Duration;

use async_trait::async_trait;

use geomajas_core::{Command, CommandResponse};

use super::{CommandTransport, TransportError};

/// Posts each command as JSON to the service endpoint and decodes the JSON
/// response envelope.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    service_url: String,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            service_url: service_url.into(),
            timeout: None,
        }
    }

    /// Reuse an existing client (connection pool, proxies, TLS settings).
    pub fn with_client(client: reqwest::Client, service_url: impl Into<String>) -> Self {
        Self {
            client,
            service_url: service_url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl CommandTransport for HttpTransport {
    async fn execute(&self, command: &Command) -> Result<CommandResponse, TransportError> {
        let mut req = self.client.post(&self.service_url).json(command);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TransportError::Status(
                resp.status().as_u16(),
                resp.text().await.unwrap_or_default(),
            ));
        }

        resp.json::<CommandResponse>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}
