//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// API listener and shutdown settings.
    pub web: WebConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Web server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    /// Maximum time to read a request's headers.
    #[serde(with = "crate::config::duration")]
    pub read_timeout: Duration,

    /// Maximum time to produce a response for a single request.
    #[serde(with = "crate::config::duration")]
    pub write_timeout: Duration,

    /// Keep-alive connections are closed after this long without a new request.
    #[serde(with = "crate::config::duration")]
    pub idle_timeout: Duration,

    /// Bound on graceful drain before connections are forcibly closed.
    #[serde(with = "crate::config::duration")]
    pub shutdown_timeout: Duration,

    /// API bind address (e.g., "0.0.0.0:3000").
    pub api_host: String,

    /// Debug bind address; serves the metrics endpoint.
    pub debug_host: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(120),
            shutdown_timeout: Duration::from_secs(20),
            api_host: "0.0.0.0:3000".to_string(),
            debug_host: "0.0.0.0:3010".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus endpoint on `web.debug_host`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.web.read_timeout, Duration::from_secs(5));
        assert_eq!(config.web.write_timeout, Duration::from_secs(10));
        assert_eq!(config.web.idle_timeout, Duration::from_secs(120));
        assert_eq!(config.web.shutdown_timeout, Duration::from_secs(20));
        assert_eq!(config.web.api_host, "0.0.0.0:3000");
        assert_eq!(config.web.debug_host, "0.0.0.0:3010");
        assert!(config.observability.metrics_enabled);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [web]
            shutdown_timeout = "45s"
            api_host = "127.0.0.1:8000"
            "#,
        )
        .unwrap();

        assert_eq!(config.web.shutdown_timeout, Duration::from_secs(45));
        assert_eq!(config.web.api_host, "127.0.0.1:8000");
        assert_eq!(config.web.read_timeout, Duration::from_secs(5));
        assert_eq!(config.web.max_connections, 10_000);
    }

    #[test]
    fn serializes_durations_as_strings() {
        let rendered = toml::to_string(&AppConfig::default()).unwrap();
        assert!(rendered.contains("shutdown_timeout = \"20s\""));
        assert!(rendered.contains("idle_timeout = \"2m\""));
    }
}
