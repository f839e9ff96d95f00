//! Command line and environment overrides.
//!
//! Every setting can be given as a flag or an environment variable. Values
//! given here win over the config file, which wins over the defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::duration::parse_duration;
use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::AppConfig;

#[derive(Debug, Default, Parser)]
#[command(name = "wasfa-api")]
#[command(about = "Wasfa API service", long_about = None, version)]
pub struct Args {
    /// Optional TOML config file.
    #[arg(long, env = "APP_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "WEB_READ_TIMEOUT", value_parser = parse_duration)]
    pub web_read_timeout: Option<Duration>,

    #[arg(long, env = "WEB_WRITE_TIMEOUT", value_parser = parse_duration)]
    pub web_write_timeout: Option<Duration>,

    #[arg(long, env = "WEB_IDLE_TIMEOUT", value_parser = parse_duration)]
    pub web_idle_timeout: Option<Duration>,

    #[arg(long, env = "WEB_SHUTDOWN_TIMEOUT", value_parser = parse_duration)]
    pub web_shutdown_timeout: Option<Duration>,

    #[arg(long, env = "WEB_API_HOST")]
    pub web_api_host: Option<String>,

    #[arg(long, env = "WEB_DEBUG_HOST")]
    pub web_debug_host: Option<String>,

    #[arg(long, env = "WEB_MAX_CONNECTIONS")]
    pub web_max_connections: Option<usize>,

    #[arg(long, env = "METRICS_ENABLED")]
    pub metrics_enabled: Option<bool>,
}

impl Args {
    /// Build the final configuration: defaults, then file, then overrides.
    pub fn resolve(self) -> Result<AppConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => load_config(path)?,
            None => AppConfig::default(),
        };
        Ok(self.apply(base))
    }

    fn apply(self, mut config: AppConfig) -> AppConfig {
        let web = &mut config.web;
        if let Some(v) = self.web_read_timeout {
            web.read_timeout = v;
        }
        if let Some(v) = self.web_write_timeout {
            web.write_timeout = v;
        }
        if let Some(v) = self.web_idle_timeout {
            web.idle_timeout = v;
        }
        if let Some(v) = self.web_shutdown_timeout {
            web.shutdown_timeout = v;
        }
        if let Some(v) = self.web_api_host {
            web.api_host = v;
        }
        if let Some(v) = self.web_debug_host {
            web.debug_host = v;
        }
        if let Some(v) = self.web_max_connections {
            web.max_connections = v;
        }
        if let Some(v) = self.metrics_enabled {
            config.observability.metrics_enabled = v;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "wasfa-api",
            "--web-shutdown-timeout",
            "3s",
            "--web-api-host",
            "127.0.0.1:9000",
            "--metrics-enabled",
            "false",
        ])
        .unwrap();

        let config = args.resolve().unwrap();
        assert_eq!(config.web.shutdown_timeout, Duration::from_secs(3));
        assert_eq!(config.web.api_host, "127.0.0.1:9000");
        assert!(!config.observability.metrics_enabled);
        assert_eq!(config.web.read_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_duration_flag_is_rejected() {
        let result = Args::try_parse_from(["wasfa-api", "--web-idle-timeout", "forever"]);
        assert!(result.is_err());
    }

    #[test]
    fn flags_win_over_file() {
        let path = std::env::temp_dir().join(format!("wasfa-args-{}.toml", std::process::id()));
        std::fs::write(&path, "[web]\nread_timeout = \"1s\"\nwrite_timeout = \"2s\"\n").unwrap();

        let args = Args {
            config: Some(path.clone()),
            web_write_timeout: Some(Duration::from_secs(7)),
            ..Args::default()
        };
        let config = args.resolve().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.web.read_timeout, Duration::from_secs(1));
        assert_eq!(config.web.write_timeout, Duration::from_secs(7));
    }
}
