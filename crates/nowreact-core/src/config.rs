//! Configuration loading and typed config structures for the nowreact node.
//!
//! Configuration lives in an optional `nowreact-config.yaml`. Every field has
//! a default, so an empty or missing file yields a working node that stores
//! its state in `.nowreact/state.json` and listens on `0.0.0.0:8080`.
//!
//! Environment variables override the file:
//! - `NOWREACT_DIR` overrides `persistence.dir`
//! - `NOWREACT_HOST` overrides `server.host`
//! - `NOWREACT_PORT` overrides `server.port`

use std::path::{Path, PathBuf};
use std::time::Duration;

use nowreact_types::{DEFAULT_GRID_SIDE, DEFAULT_NAMESPACE, GridError, GridSize};
use serde::Deserialize;

/// Largest accepted grid side length.
pub const MAX_GRID_SIDE: usize = 1024;

/// Environment variable naming the state directory.
pub const DIR_ENV: &str = "NOWREACT_DIR";
/// Environment variable naming the bind host.
pub const HOST_ENV: &str = "NOWREACT_HOST";
/// Environment variable naming the bind port.
pub const PORT_ENV: &str = "NOWREACT_PORT";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodeConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Canvas shape and identity.
    #[serde(default)]
    pub grid: GridConfig,

    /// State file location and checkpoint policy.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NodeConfig {
    /// Load configuration from a YAML file at the given path, then apply
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise start from defaults. Either
    /// way environment overrides are applied.
    ///
    /// # Errors
    ///
    /// Same as [`NodeConfig::from_file`].
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_env_overrides_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML string without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml maps an empty document to unit, not to an empty mapping.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process
    /// environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `NOWREACT_PORT` is not a port
    /// number.
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DIR_ENV).filter(|v| !v.is_empty()) {
            self.persistence.dir = PathBuf::from(dir);
        }
        if let Some(host) = lookup(HOST_ENV).filter(|v| !v.is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup(PORT_ENV).filter(|v| !v.is_empty()) {
            self.server.port = port.parse().map_err(|e| ConfigError::Invalid {
                field: "server.port",
                reason: format!("{PORT_ENV}={port}: {e}"),
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.grid.grid_size()?;
        if self.persistence.file_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "persistence.file_name",
                reason: String::from("must not be empty"),
            });
        }
        if self.persistence.save_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "persistence.save_timeout_ms",
                reason: String::from("must be greater than zero"),
            });
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Address to bind (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Canvas shape and identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GridConfig {
    /// Side length of the square grid.
    #[serde(default = "default_grid_side")]
    pub size: usize,

    /// Namespace given to a fresh canvas.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl GridConfig {
    /// Validated grid shape.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `size` is zero or above
    /// [`MAX_GRID_SIDE`].
    pub fn grid_size(&self) -> Result<GridSize, ConfigError> {
        if self.size > MAX_GRID_SIDE {
            return Err(ConfigError::Invalid {
                field: "grid.size",
                reason: format!("{} exceeds the maximum of {MAX_GRID_SIDE}", self.size),
            });
        }
        GridSize::new(self.size).map_err(|e: GridError| ConfigError::Invalid {
            field: "grid.size",
            reason: e.to_string(),
        })
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: default_grid_side(),
            namespace: default_namespace(),
        }
    }
}

/// State file location and checkpoint policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding the state file.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// State file name inside [`PersistenceConfig::dir`].
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Delay after a mutation before checkpointing, so bursts of writes
    /// coalesce into one save. Zero saves as soon as possible.
    #[serde(default = "default_checkpoint_interval_ms")]
    pub checkpoint_interval_ms: u64,

    /// Upper bound on a single save before it is abandoned.
    #[serde(default = "default_save_timeout_ms")]
    pub save_timeout_ms: u64,

    /// Consecutive failed saves retried before waiting for the next
    /// mutation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between retries of a failed save.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl PersistenceConfig {
    /// Full path of the state file.
    pub fn state_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Checkpoint debounce as a [`Duration`].
    pub const fn checkpoint_interval(&self) -> Duration {
        Duration::from_millis(self.checkpoint_interval_ms)
    }

    /// Save timeout as a [`Duration`].
    pub const fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms)
    }

    /// Retry pause as a [`Duration`].
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            file_name: default_file_name(),
            checkpoint_interval_ms: default_checkpoint_interval_ms(),
            save_timeout_ms: default_save_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_grid_side() -> usize {
    DEFAULT_GRID_SIDE
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

fn default_dir() -> PathBuf {
    PathBuf::from(".nowreact")
}

fn default_file_name() -> String {
    "state.json".to_owned()
}

const fn default_checkpoint_interval_ms() -> u64 {
    250
}

const fn default_save_timeout_ms() -> u64 {
    5_000
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_backoff_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = NodeConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.grid.size, 16);
        assert_eq!(config.grid.namespace, "nowreact");
        assert_eq!(
            config.persistence.state_path(),
            PathBuf::from(".nowreact").join("state.json")
        );
        assert_eq!(config.grid.grid_size().unwrap().cell_count(), 256);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9000
grid:
  size: 8
  namespace: "test-canvas"
persistence:
  dir: "/var/lib/nowreact"
  file_name: "canvas.json"
  checkpoint_interval_ms: 0
  save_timeout_ms: 200
  max_retries: 1
  retry_backoff_ms: 10
logging:
  level: "debug"
  json: true
"#;
        let config = NodeConfig::parse_without_env(yaml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.grid.size, 8);
        assert_eq!(config.grid.namespace, "test-canvas");
        assert_eq!(
            config.persistence.state_path(),
            PathBuf::from("/var/lib/nowreact/canvas.json")
        );
        assert_eq!(config.persistence.checkpoint_interval(), Duration::ZERO);
        assert_eq!(config.persistence.save_timeout(), Duration::from_millis(200));
        assert_eq!(config.persistence.max_retries, 1);
        assert!(config.logging.json);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let config = NodeConfig::parse_without_env("grid:\n  size: 4\n").unwrap();
        assert_eq!(config.grid.size, 4);
        assert_eq!(config.grid.namespace, "nowreact");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.persistence.file_name, "state.json");
    }

    #[test]
    fn empty_yaml_is_default() {
        let config = NodeConfig::parse_without_env("").unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn zero_grid_size_is_rejected() {
        let err = NodeConfig::parse_without_env("grid:\n  size: 0\n");
        assert!(matches!(
            err,
            Err(ConfigError::Invalid {
                field: "grid.size",
                ..
            })
        ));
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let err = NodeConfig::parse_without_env("grid:\n  size: 100000\n");
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_save_timeout_is_rejected() {
        let err = NodeConfig::parse_without_env("persistence:\n  save_timeout_ms: 0\n");
        assert!(err.is_err());
    }

    #[test]
    fn env_overrides_dir_host_and_port() {
        let mut config = NodeConfig::default();
        config
            .apply_env_overrides_with(|key| match key {
                DIR_ENV => Some("/tmp/canvas".to_owned()),
                HOST_ENV => Some("127.0.0.1".to_owned()),
                PORT_ENV => Some("3000".to_owned()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.persistence.dir, PathBuf::from("/tmp/canvas"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = NodeConfig::default();
        config
            .apply_env_overrides_with(|_| Some(String::new()))
            .unwrap();
        assert_eq!(config, NodeConfig::default());
    }

    #[test]
    fn bad_port_env_is_an_error() {
        let mut config = NodeConfig::default();
        let err = config.apply_env_overrides_with(|key| {
            (key == PORT_ENV).then(|| "eighty".to_owned())
        });
        assert!(err.is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("nowreact-config.yaml");
        if path.exists() {
            let yaml = std::fs::read_to_string(&path).unwrap();
            let config = NodeConfig::parse_without_env(&yaml);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
            assert_eq!(config.unwrap(), NodeConfig::default());
        }
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = NodeConfig::parse_without_env("grid: [unclosed");
        assert!(matches!(err, Err(ConfigError::Yaml { .. })));
    }
}
