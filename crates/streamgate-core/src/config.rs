use log::LevelFilter;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

/// Environment variable naming the manifest to load at cold start.
pub const CONFIG_PATH_ENV: &str = "STREAMGATE_CONFIG";
/// Environment variable overriding `[app] config_file`.
pub const APP_CONFIG_PATH_ENV: &str = "STREAMGATE_APP_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "streamgate.toml";
const DEFAULT_APP_CONFIG_FILE: &str = "config.json";
const DEFAULT_WARMER_MARKER: &str = "warmer";
const DEFAULT_WARMER_SENTINEL: &str = "warmed";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("manifest failed validation: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("invalid application config {path}: {source}")]
    AppConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub struct ConfigLoader {
    config: Arc<Config>,
}

impl ConfigLoader {
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        let config = Config::parse(contents, None)?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Config::parse(&contents, Some(resolve_root_path(path, &cwd)))?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Load the manifest named by `STREAMGATE_CONFIG`, falling back to
    /// `./streamgate.toml`. A missing default manifest yields the built-in
    /// defaults; a missing explicitly named one is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_path(Path::new(&path)),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_path(path)
                } else {
                    log::debug!("no {DEFAULT_CONFIG_PATH} found; using defaults");
                    Self::load_from_str("")
                }
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shared(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}

fn resolve_root_path(path: &Path, cwd: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => cwd.to_path_buf(),
        Some(parent) if parent.is_relative() => cwd.join(parent),
        Some(parent) => parent.to_path_buf(),
        None => cwd.to_path_buf(),
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub app: AppConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    #[validate(nested)]
    pub warmer: WarmerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(skip)]
    pub(crate) root: Option<PathBuf>,
}

impl Config {
    fn parse(contents: &str, root: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(contents)?;
        config.validate()?;
        config.root = root;
        Ok(config)
    }

    /// Directory the manifest was loaded from.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Working directory to pin at cold start, resolved against the manifest root.
    pub fn working_dir(&self) -> Option<PathBuf> {
        self.app.dir.as_deref().map(|dir| self.resolve(Path::new(dir)))
    }

    /// Location of the opaque application configuration file.
    /// `STREAMGATE_APP_CONFIG` wins over `[app] config_file`.
    pub fn app_config_path(&self) -> PathBuf {
        let configured = std::env::var_os(APP_CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                PathBuf::from(
                    self.app
                        .config_file
                        .as_deref()
                        .unwrap_or(DEFAULT_APP_CONFIG_FILE),
                )
            });
        self.resolve(&configured)
    }

    /// Read and parse the application configuration. A missing file yields
    /// `Value::Null`; the application decides whether that is acceptable.
    pub fn load_app_config(&self) -> Result<serde_json::Value, ConfigError> {
        let path = self.app_config_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("application config {} not found", path.display());
                return Ok(serde_json::Value::Null);
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        serde_json::from_str(&contents).map_err(|source| ConfigError::AppConfig { path, source })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match (&self.root, path.is_relative()) {
            (Some(root), true) => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub dir: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub config_file: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub mode: RuntimeMode,
    #[serde(default)]
    pub invoke_mode: InvokeMode,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum RuntimeMode {
    #[default]
    Production,
    Development,
}

impl RuntimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl<'de> Deserialize<'de> for RuntimeMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(serde::de::Error::custom(format!(
                "unsupported runtime mode `{}`",
                other
            ))),
        }
    }
}

/// How the platform delivers the response: framed stream or one buffered event.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum InvokeMode {
    #[default]
    ResponseStream,
    Buffered,
}

impl<'de> Deserialize<'de> for InvokeMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "response_stream" | "stream" => Ok(Self::ResponseStream),
            "buffered" => Ok(Self::Buffered),
            other => Err(serde::de::Error::custom(format!(
                "unsupported invoke mode `{}`",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct WarmerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_warmer_marker")]
    #[validate(length(min = 1))]
    pub marker: String,
    #[serde(default = "default_warmer_sentinel")]
    #[validate(length(min = 1))]
    pub sentinel: String,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            marker: default_warmer_marker(),
            sentinel: default_warmer_sentinel(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_warmer_marker() -> String {
    DEFAULT_WARMER_MARKER.to_string()
}

fn default_warmer_sentinel() -> String {
    DEFAULT_WARMER_SENTINEL.to_string()
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub echo_stdout: Option<bool>,
}

impl LoggingConfig {
    /// Effective filter: `echo_stdout = false` silences output entirely.
    pub fn level_filter(&self) -> LevelFilter {
        if self.echo_stdout.unwrap_or(true) {
            self.level.into()
        } else {
            LevelFilter::Off
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "off" => Ok(Self::Off),
            other => Err(serde::de::Error::custom(format!(
                "unsupported log level `{}`",
                other
            ))),
        }
    }
}
