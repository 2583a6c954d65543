//! Listener and route settings for the exporter's HTTP surface.

use crate::error::{ExporterError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Where the exporter listens and which paths it answers on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfig {
    /// Interface address; IPv4 or IPv6 literal
    pub host: String,
    pub port: u16,
    /// Route serving exposition text
    pub metrics_path: String,
    /// Route serving the JSON liveness document
    pub health_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            metrics_path: "/metrics".to_string(),
            health_path: "/health".to_string(),
        }
    }
}

impl WebConfig {
    /// Default routes on a custom interface and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// `host:port` for display; IPv6 hosts are bracketed.
    pub fn bind_address(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{}]:{}", self.host, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    /// Resolve the listener address, rejecting anything that is not an IP literal.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip = self
            .host
            .parse::<IpAddr>()
            .map_err(|e| ExporterError::config_error(format!("Invalid bind address '{}': {}", self.host, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Both routes must be absolute and distinct.
    pub fn validate(&self) -> Result<()> {
        for path in [&self.metrics_path, &self.health_path] {
            if !path.starts_with('/') {
                return Err(ExporterError::config_error(format!(
                    "Route '{}' must start with '/'",
                    path
                )));
            }
        }
        if self.metrics_path == self.health_path {
            return Err(ExporterError::config_error(format!(
                "Metrics and health routes both set to '{}'",
                self.metrics_path
            )));
        }
        self.socket_addr().map(|_| ())
    }
}
