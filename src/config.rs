use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

#[derive(Parser, Debug, Default)]
#[command(name = "flashreport", about = "Flash Report - cash flow tracking for multi-unit businesses")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "flashreport.toml")]
    pub config: String,

    /// Storage backend (overrides config file)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Generate this many days of mock movements before reporting
    #[arg(long)]
    pub mock_days: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub local: LocalConfig,

    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalConfig {
    /// SQLite file holding the key-value blob. ":memory:" keeps nothing on disk.
    #[serde(default = "default_local_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_url")]
    pub url: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_managing_partner_id")]
    pub default_managing_partner_id: String,
}

fn default_local_path() -> String {
    "flashreport.db".to_string()
}

fn default_remote_url() -> String {
    "host=localhost user=postgres dbname=flashreport".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_statement_timeout_ms() -> u64 {
    15_000
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_managing_partner_id() -> String {
    flashreport_core::schema::DEFAULT_MANAGING_PARTNER_ID.to_string()
}

impl Default for LocalConfig {
    fn default() -> Self {
        LocalConfig {
            path: default_local_path(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: default_remote_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            default_managing_partner_id: default_managing_partner_id(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig::default(),
            logging: default_logging(),
            app: AppConfig::default(),
        }
    }
}

impl RemoteConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Config::parse(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(backend) = cli.backend {
            config.storage.backend = backend;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        config
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.storage.backend, BackendKind::Local);
        assert_eq!(config.storage.local.path, "flashreport.db");
        assert_eq!(config.storage.remote.statement_timeout(), Duration::from_millis(15_000));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.app.default_managing_partner_id, "partner-managing");
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [storage]
            backend = "remote"

            [storage.remote]
            url = "host=db user=app"
            connect_timeout_secs = 3

            [logging]
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, BackendKind::Remote);
        assert_eq!(config.storage.remote.url, "host=db user=app");
        assert_eq!(config.storage.remote.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.storage.remote.statement_timeout_ms, 15_000);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_cli_overrides_file() {
        let cli = CliArgs {
            config: "does-not-exist.toml".to_string(),
            backend: Some(BackendKind::Remote),
            log_level: Some("debug".to_string()),
            mock_days: None,
        };
        let config = Config::load(&cli);
        assert_eq!(config.storage.backend, BackendKind::Remote);
        assert_eq!(config.logging.level, "debug");
    }
}
