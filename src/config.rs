use std::env;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::DEFAULT_QUERY_LIMIT;
use crate::presence::SweeperConfig;
use crate::presence::registry::{DEFAULT_MAX_NAME_LEN, DEFAULT_NAME_PATTERN, NamePolicy};

pub const DEFAULT_CONFIG_PATH: &str = "config/server.json";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    /// SQLite file; `None` keeps everything in memory
    pub database_path: Option<String>,
    pub sweep_interval_secs: u64,
    pub stale_threshold_secs: u64,
    pub default_message_limit: usize,
    pub max_name_len: usize,
    pub name_pattern: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_path: None,
            sweep_interval_secs: 15,
            stale_threshold_secs: 10,
            default_message_limit: DEFAULT_QUERY_LIMIT,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            name_pattern: DEFAULT_NAME_PATTERN.to_string(),
        }
    }
}

impl AppConfig {
    /// Read a JSON config file. A missing file yields the defaults; an
    /// unreadable or malformed one is an error so typos do not go unnoticed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.bind_addr.parse()
    }

    pub fn sweeper(&self) -> SweeperConfig {
        SweeperConfig {
            interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            stale_threshold: Duration::from_secs(self.stale_threshold_secs),
        }
    }

    pub fn name_policy(&self) -> Result<NamePolicy, regex::Error> {
        NamePolicy::new(self.max_name_len, &self.name_pattern)
    }

    /// Apply `PORT` and `DATABASE_PATH` from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(env::var("PORT").ok(), env::var("DATABASE_PATH").ok());
    }

    fn apply_overrides(&mut self, port: Option<String>, database_path: Option<String>) {
        if let Some(port) = port {
            match port.trim().parse::<u16>() {
                Ok(port) => {
                    let host = self
                        .bind_addr
                        .rsplit_once(':')
                        .map(|(host, _)| host.to_string())
                        .unwrap_or_else(|| "0.0.0.0".to_string());
                    self.bind_addr = format!("{host}:{port}");
                }
                Err(err) => log::warn!("Ignoring PORT `{port}`: {err}"),
            }
        }
        if let Some(path) = database_path.filter(|p| !p.trim().is_empty()) {
            self.database_path = Some(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "stale_threshold_secs": 30 }"#).unwrap();
        assert_eq!(config.stale_threshold_secs, 30);
        assert_eq!(config.sweep_interval_secs, 15);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::from_file("does/not/exist.json").unwrap();
        assert_eq!(config.default_message_limit, 100);
        assert_eq!(config.sweeper().interval, Duration::from_secs(15));
        assert_eq!(config.sweeper().stale_threshold, Duration::from_secs(10));
    }

    #[test]
    fn test_config_file_is_read_and_validated() {
        let dir = std::env::temp_dir().join(format!("rust_room_chat_cfg_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let good = dir.join("server.json");
        fs::write(&good, r#"{ "bind_addr": "127.0.0.1:7000", "database_path": "data/chat.db" }"#)
            .unwrap();
        let config = AppConfig::from_file(&good).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:7000");
        assert_eq!(config.database_path.as_deref(), Some("data/chat.db"));
        assert_eq!(config.stale_threshold_secs, 10);

        let bad = dir.join("broken.json");
        fs::write(&bad, "{ \"sweep_interval_secs\": \"often\" }").unwrap();
        assert!(matches!(
            AppConfig::from_file(&bad),
            Err(ConfigError::Parse { .. })
        ));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some("8080".into()), Some("data/room.db".into()));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.database_path.as_deref(), Some("data/room.db"));

        config.apply_overrides(Some("not-a-port".into()), Some("  ".into()));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.database_path.as_deref(), Some("data/room.db"));
    }

    #[test]
    fn test_bad_name_pattern_is_reported() {
        let config = AppConfig {
            name_pattern: "([".into(),
            ..AppConfig::default()
        };
        assert!(config.name_policy().is_err());
    }
}
