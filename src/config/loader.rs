//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load configuration from a TOML file. Missing keys take their defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/wasfa.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn bad_duration_is_parse_error() {
        let err = parse_config("[web]\nread_timeout = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("wasfa-config-{}.toml", std::process::id()));
        fs::write(&path, "[web]\nidle_timeout = \"30s\"\n").unwrap();

        let config = load_config(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.web.idle_timeout, Duration::from_secs(30));
    }
}
