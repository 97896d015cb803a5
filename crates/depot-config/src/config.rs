use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{ConfigError, Result};

/// Environment variable pointing at the configuration file.
pub const CONFIG_PATH_ENV: &str = "DEPOT_CONFIG";

pub const DEFAULT_API_PATH: &str = "/pulp/api/v3";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 600;

/// Application's configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings for the content store.
    pub backend: BackendConfig,

    /// Page size used for list calls.
    /// Default: 100
    pub page_size: Option<u32>,

    /// Task polling settings.
    pub tasks: TaskConfig,

    /// Logging settings.
    pub log: LogConfig,
}

/// Content store connection settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Scheme and host of the content store, e.g. `https://pulp.example.com`.
    pub host: String,

    /// API prefix prepended to every resource path.
    /// Default: /pulp/api/v3
    pub api_path: String,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Global request timeout in seconds. Unset means no timeout.
    pub timeout_secs: Option<u64>,

    /// User agent sent with every request.
    /// Default: depot/<version>
    pub user_agent: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:24817".to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            username: None,
            password: None,
            timeout_secs: None,
            user_agent: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Delay between task status reads.
    /// Default: 1000
    pub poll_interval_ms: Option<u64>,

    /// Give up waiting on a task after this many seconds.
    /// Default: 600
    pub timeout_secs: Option<u64>,
}

impl TaskConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TASK_TIMEOUT_SECS))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of trace, debug, info, warn, error.
    pub level: String,

    /// Emit JSON lines instead of human readable output.
    pub json: bool,

    /// Colour level prefixes in human readable output.
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            color: true,
        }
    }
}

impl BackendConfig {
    /// Base URL every API path is joined to.
    pub fn base_url(&self) -> String {
        self.host.trim_end_matches('/').to_string()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("depot/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Username and password, if both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    fn apply_env(&mut self) {
        if let Ok(host) = env::var("DEPOT_BACKEND_HOST") {
            self.host = host;
        }
        if let Ok(api_path) = env::var("DEPOT_BACKEND_API_PATH") {
            self.api_path = api_path;
        }
        if let Ok(username) = env::var("DEPOT_BACKEND_USERNAME") {
            self.username = Some(username);
        }
        if let Ok(password) = env::var("DEPOT_BACKEND_PASSWORD") {
            self.password = Some(password);
        }
    }

    fn validate(&self) -> Result<()> {
        Url::parse(&self.host).map_err(|source| {
            ConfigError::InvalidHost {
                host: self.host.clone(),
                source,
            }
        })?;

        if !self.api_path.starts_with('/') || self.api_path.ends_with('/') {
            return Err(ConfigError::InvalidApiPath(self.api_path.clone()));
        }

        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::MissingCredentials);
        }

        Ok(())
    }
}

impl Config {
    /// Loads the configuration from `DEPOT_CONFIG` if set, falling back to
    /// defaults when no file is configured. Environment overrides are
    /// applied last.
    pub fn new() -> Result<Self> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_path(PathBuf::from(path)),
            Err(_) => {
                let mut config = Self::default();
                config.resolve()?;
                Ok(config)
            }
        }
    }

    /// Loads the configuration from a TOML file. A missing file yields the
    /// default configuration.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut config = match fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "loading configuration");
                toml::from_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::IoError {
                    action: format!("reading {}", path.display()),
                    source,
                })
            }
        };

        config.resolve()?;
        Ok(config)
    }

    /// Parses a configuration from a TOML string without consulting the
    /// environment.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn resolve(&mut self) -> Result<()> {
        self.backend.apply_env();
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;

        if self.page_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "page_size",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.tasks.poll_interval_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "tasks.poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
