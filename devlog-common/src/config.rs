//! Configuration loading and resolution
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument / environment variable (parsed by the binary)
//! 2. TOML config file
//! 3. Compiled default
//!
//! A missing config file is not an error: startup continues on defaults. A
//! config file that exists but does not parse is. Loading happens before the
//! tracing subscriber starts, so the loader reports a [`ConfigSource`] and
//! the binary logs it.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::db::StoreSelection;
use crate::{Error, Result};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Default bind address
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Settings read from the TOML config file (every key optional)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Connection string for the hosted backend
    pub database_url: Option<String>,
    /// Embedded database file
    pub sqlite_path: Option<PathBuf>,
    /// Shared API token
    pub api_token: Option<String>,
    /// Projects accepted on create (empty: any)
    pub allowed_projects: Option<Vec<String>>,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (e.g. `info`, `devlog_api=debug`)
    pub level: Option<String>,
}

/// Highest-priority values supplied by the command line or environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub sqlite_path: Option<PathBuf>,
    pub api_token: Option<String>,
    pub allowed_projects: Option<Vec<String>>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub sqlite_path: PathBuf,
    pub api_token: Option<String>,
    pub allowed_projects: Vec<String>,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge overrides over the TOML file over compiled defaults
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Self {
        let allowed_projects = overrides
            .allowed_projects
            .or(toml.allowed_projects)
            .unwrap_or_default()
            .into_iter()
            .map(|project| project.trim().to_string())
            .filter(|project| !project.is_empty())
            .collect();

        Self {
            host: overrides
                .host
                .or(toml.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            database_url: non_blank(overrides.database_url).or_else(|| non_blank(toml.database_url)),
            sqlite_path: overrides
                .sqlite_path
                .or(toml.sqlite_path)
                .unwrap_or_else(default_sqlite_path),
            api_token: non_blank(overrides.api_token).or_else(|| non_blank(toml.api_token)),
            allowed_projects,
            log_level: overrides
                .log_level
                .or(toml.logging.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Backend selection: a connection string means hosted
    pub fn store_selection(&self) -> StoreSelection {
        StoreSelection::resolve(self.database_url.as_deref(), self.sqlite_path.clone())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Token and connection string are secrets
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("sqlite_path", &self.sqlite_path)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("allowed_projects", &self.allowed_projects)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Platform config file location (`<config_dir>/devlog/config.toml`)
///
/// On Linux `/etc/devlog/config.toml` is used when no user file exists.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("devlog").join("config.toml"));

    if cfg!(target_os = "linux") {
        if let Some(path) = &user_config {
            if path.exists() {
                return user_config;
            }
        }
        let system_config = PathBuf::from("/etc/devlog/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}

/// OS-dependent default database file
pub fn default_sqlite_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("devlog").join("devlog.db"))
        .unwrap_or_else(|| PathBuf::from("./devlog_data/devlog.db"))
}

/// Where the loaded TOML settings came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Settings were read from this file
    File(PathBuf),
    /// This path was consulted but does not exist
    Missing(PathBuf),
    /// No path given and the platform has no config directory
    NoConfigDir,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Missing(path) => write!(f, "{} (not found, using defaults)", path.display()),
            ConfigSource::NoConfigDir => write!(f, "none (no config directory, using defaults)"),
        }
    }
}

/// Load the TOML config, falling back to defaults when the file is absent
pub fn load_toml_config(path: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
        return Ok((TomlConfig::default(), ConfigSource::NoConfigDir));
    };

    if !path.exists() {
        return Ok((TomlConfig::default(), ConfigSource::Missing(path)));
    }

    let content = std::fs::read_to_string(&path)?;
    let config = parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    Ok((config, ConfigSource::File(path)))
}

/// Parse TOML config text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_configured() {
        let config = ServiceConfig::resolve(ConfigOverrides::default(), TomlConfig::default());

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database_url, None);
        assert_eq!(config.api_token, None);
        assert!(config.allowed_projects.is_empty());
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.sqlite_path, default_sqlite_path());
    }

    #[test]
    fn test_overrides_beat_toml() {
        let toml = parse_toml_config(
            r#"
            port = 6000
            api_token = "from-file"
            allowed_projects = ["alpha", "beta"]

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        let overrides = ConfigOverrides {
            port: Some(7000),
            allowed_projects: Some(vec!["gamma".to_string()]),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(overrides, toml);
        assert_eq!(config.port, 7000);
        assert_eq!(config.api_token.as_deref(), Some("from-file"));
        assert_eq!(config.allowed_projects, vec!["gamma"]);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let toml = TomlConfig {
            database_url: Some("postgres://db/devlog".to_string()),
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            database_url: Some("  ".to_string()),
            api_token: Some(String::new()),
            allowed_projects: Some(vec![" alpha ".to_string(), "".to_string()]),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(overrides, toml);
        assert_eq!(config.database_url.as_deref(), Some("postgres://db/devlog"));
        assert_eq!(config.api_token, None);
        assert_eq!(config.allowed_projects, vec!["alpha"]);
    }

    #[test]
    fn test_store_selection_follows_database_url() {
        let mut config = ServiceConfig::resolve(ConfigOverrides::default(), TomlConfig::default());
        assert_eq!(config.store_selection().backend(), crate::db::Backend::Sqlite);

        config.database_url = Some("postgres://db/devlog".to_string());
        assert_eq!(config.store_selection().backend(), crate::db::Backend::Postgres);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let overrides = ConfigOverrides {
            api_token: Some("hunter2".to_string()),
            database_url: Some("postgres://u:pw@db/devlog".to_string()),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(overrides, TomlConfig::default());
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("pw@db"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.toml");
        let (config, source) = load_toml_config(Some(&absent)).unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(source, ConfigSource::Missing(absent));
        assert!(source.to_string().contains("not found"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();

        let result = load_toml_config(Some(&path));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_file_values_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "host = \"0.0.0.0\"\nsqlite_path = \"/var/lib/devlog/devlog.db\"\n")
            .unwrap();

        let (config, source) = load_toml_config(Some(&path)).unwrap();
        assert_eq!(source, ConfigSource::File(path.clone()));
        assert_eq!(config.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(
            config.sqlite_path,
            Some(PathBuf::from("/var/lib/devlog/devlog.db"))
        );
    }
}
