use std::collections::HashSet;
use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::monitoring::types::Target;

/// Per-check timeout used when the file does not set one
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Event log location used when the file does not set one
pub const DEFAULT_DATABASE_PATH: &str = "logs.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to parse {path}: {message}")]
    ParseFailed { path: path::PathBuf, message: String },

    #[error("could not determine a default config path, pass one explicitly")]
    ConfigPathUnavailable,

    #[error("check interval is required, set `interval` in the config file or pass --interval")]
    MissingInterval,

    #[error("check interval must be a positive number of seconds, got {0}")]
    InvalidInterval(i64),

    #[error("check timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(i64),

    #[error("no targets configured")]
    NoTargets,

    #[error("invalid target url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("duplicate target url {0:?}")]
    DuplicateUrl(String),
}

/// Configuration file shape, as written by the operator
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RawConfig {
    /// Seconds between rounds
    pub interval: Option<i64>,

    /// Seconds a single check may take
    pub timeout: Option<i64>,

    pub database: Option<String>,

    #[serde(default)]
    pub targets: Vec<Target>,
}

/// Validated configuration for one run
#[derive(Debug, Clone)]
pub struct Config {
    pub interval: Duration,
    pub timeout: Duration,
    pub database: String,
    pub targets: Vec<Target>,
}

/// Get default config path ($XDG_CONFIG_HOME/sitewatch/config.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("sitewatch/config.toml"))
}

impl RawConfig {
    /// Read a config file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn from_file(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path = match optional_path {
            Some(path) => path.as_ref().to_path_buf(),
            None => default_config_path()?,
        };

        let raw_string = fs::read_to_string(&config_path)
            .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;

        let is_json = config_path.extension().is_some_and(|ext| ext == "json");
        let parsed = if is_json {
            serde_json::from_str(&raw_string).map_err(|e| e.to_string())
        } else {
            toml::from_str(&raw_string).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::ParseFailed { path: config_path, message })
    }

    /// Validate into a runnable configuration. `interval` overrides the file value.
    pub fn validate(self, interval: Option<i64>) -> Result<Config, ConfigError> {
        let interval = interval.or(self.interval).ok_or(ConfigError::MissingInterval)?;
        if interval <= 0 {
            return Err(ConfigError::InvalidInterval(interval));
        }
        let interval = Duration::from_secs(interval as u64);

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECONDS as i64);
        if timeout <= 0 {
            return Err(ConfigError::InvalidTimeout(timeout));
        }
        // A check must never outlive its round
        let timeout = Duration::from_secs(timeout as u64).min(interval);

        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            validate_target_url(&target.url)?;
            if !seen.insert(target.url.as_str()) {
                return Err(ConfigError::DuplicateUrl(target.url.clone()));
            }
        }

        Ok(Config {
            interval,
            timeout,
            database: self.database.unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            targets: self.targets,
        })
    }
}

/// Validate an HTTP/HTTPS target url
fn validate_target_url(target: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl { url: target.to_string(), reason };

    let url = Url::parse(target).map_err(|e| invalid(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(())
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Monitoring Configuration:")?;
        write_title_1(f, "Schedule")?;
        write_1(f, "Interval (s)", &self.interval.as_secs())?;
        write_1(f, "Check timeout (s)", &self.timeout.as_secs())?;
        write_title_1(f, "Storage")?;
        write_1(f, "Event log", &self.database)?;
        write_title_1(f, "Targets")?;
        for target in &self.targets {
            write_1(f, "Url", &target.url)?;
            if target.required.is_empty() {
                write_2(f, "Requires", &"(nothing)")?;
            } else {
                write_2(f, "Requires", &target.required.join(", "))?;
            }
        }

        Ok(())
    }
}
