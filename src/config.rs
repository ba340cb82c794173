//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `tracker.toml`.
//!     loads configuration from file or falls back to defaults, then applies
//!     environment overrides.
//!
//! structure:
//!     - ServerConfig: Bind address for the http listener.
//!     - AdminConfig: Shared passcode guarding rename / delete.
//!     - LoggingConfig: Default log filter and per-update verbosity.
//!
//! environment:
//!     - TRACKER_CONFIG: explicit path to a config file
//!     - TRACKER_ADMIN_PASSCODE: overrides admin.passcode
//!     - TRACKER_PORT: overrides server.port
//!
//! ==============================================================================

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct TrackerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// file this config was read from, None for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
    /// problems met while searching for a config file, reported by print_summary
    #[serde(skip)]
    pub load_warnings: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    pub passcode: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// log every accepted position at info (debug otherwise)
    pub log_updates: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 5000 }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { passcode: "1234560".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), log_updates: true }
    }
}

// keep the passcode out of debug output
impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig").field("passcode", &"<redacted>").finish()
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl TrackerConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    /// Load with default fallback, then apply environment overrides
    pub fn load_or_default() -> Self {
        let mut config = Self::load_from_disk();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    // runs before the subscriber is installed, so problems are kept for print_summary
    fn load_from_disk() -> Self {
        let mut paths = Vec::new();
        if let Ok(explicit) = std::env::var("TRACKER_CONFIG") {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from("config").join("tracker.toml"));
        paths.push(PathBuf::from("..").join("config").join("tracker.toml"));

        let mut warnings = Vec::new();
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(mut config) => {
                        config.source = Some(path.clone());
                        config.load_warnings = warnings;
                        return config;
                    }
                    Err(e) => warnings.push(format!("failed to load {}: {e:#}", path.display())),
                }
            }
        }

        warnings.push("no config file found, using defaults".to_string());
        Self { load_warnings: warnings, ..Self::default() }
    }

    /// apply TRACKER_* overrides from `lookup`; bad values are ignored with a warning
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(passcode) = lookup("TRACKER_ADMIN_PASSCODE").filter(|p| !p.is_empty()) {
            self.admin.passcode = passcode;
        }
        if let Some(port) = lookup("TRACKER_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => self
                    .load_warnings
                    .push(format!("ignoring invalid TRACKER_PORT {port:?}")),
            }
        }
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        for warning in &self.load_warnings {
            warn!("{warning}");
        }
        if let Some(path) = &self.source {
            info!(path = %path.display(), "loaded configuration");
        }
        info!(
            bind = %self.server.bind_address(),
            log_level = %self.logging.level,
            log_updates = self.logging.log_updates,
            admin_passcode_set = !self.admin.passcode.is_empty(),
            "tracker configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = TrackerConfig::from_toml("").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert!(config.source.is_none());
        assert_eq!(config.server.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.admin.passcode, "1234560");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = TrackerConfig::from_toml(
            r#"
            [server]
            port = 8080

            [logging]
            log_updates = false
            "#,
        )
        .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.log_updates);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(TrackerConfig::from_toml("[server]\nport = \"eighty\"").is_err());
    }

    #[test]
    fn environment_overrides_apply() {
        let mut config = TrackerConfig::default();
        config.apply_overrides(|key| match key {
            "TRACKER_ADMIN_PASSCODE" => Some("s3cret".to_string()),
            "TRACKER_PORT" => Some("9000".to_string()),
            _ => None,
        });
        assert_eq!(config.admin.passcode, "s3cret");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut config = TrackerConfig::default();
        config.apply_overrides(|key| (key == "TRACKER_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.load_warnings.len(), 1);
    }

    #[test]
    fn debug_output_redacts_passcode() {
        let rendered = format!("{:?}", TrackerConfig::default());
        assert!(!rendered.contains("1234560"));
        assert!(rendered.contains("<redacted>"));
    }
}
