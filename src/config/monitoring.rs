use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Prometheus scrape endpoint
///
/// When enabled, `GET /metrics` is served on `0.0.0.0:<prometheus_port>` until shutdown.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus_enabled: bool,

    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: false,
            prometheus_port: default_prometheus_port(),
        }
    }
}

impl MonitoringConfig {
    /// The port is only checked when the endpoint is enabled; binding happens in
    /// [`crate::start_server`].
    pub fn validate(&self) -> Result<()> {
        if !self.prometheus_enabled {
            return Ok(());
        }

        match self.prometheus_port {
            0 => Err(Error::InvalidConfig(
                "monitoring.prometheus_port cannot be 0 when the endpoint is enabled".into(),
            )),
            port if port < 1024 => Err(Error::InvalidConfig(format!(
                "monitoring.prometheus_port {port} is privileged"
            ))),
            _ => Ok(()),
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.prometheus_port))
    }
}

fn default_prometheus_port() -> u16 {
    9090
}
