//! On-disk configuration for the SwitchBot cloud integration.
//!
//! TOML entries (one per vendor account), API token resolution
//! (env + keyring + plaintext), and translation to
//! `switchbot_core::IntegrationConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use switchbot_core::config::{DEFAULT_REFRESH_INTERVAL, DEFAULT_STATUS_CONCURRENCY};
use switchbot_core::{CoordinatorConfig, IntegrationConfig};

/// Keyring service name for stored API tokens.
const KEYRING_SERVICE: &str = "switchbot-cloud";

/// Environment prefix; nested keys are separated by `__`.
const ENV_PREFIX: &str = "SWITCHBOT_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API token configured for entry '{entry}'")]
    NoCredentials { entry: String },

    #[error("no entry named '{entry}'")]
    UnknownEntry { entry: String },

    #[error("no platform config directory; set {}", CONFIG_FILE_ENV)]
    NoConfigDir,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Entry used when the caller does not name one.
    pub default_entry: Option<String>,

    /// Polling defaults applied to every entry.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named integration entries, one per vendor account.
    #[serde(default)]
    pub entries: BTreeMap<String, Entry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_entry: Some("default".into()),
            defaults: Defaults::default(),
            entries: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Name of the entry to use: `default_entry`, or the only entry if
    /// there is exactly one.
    pub fn active_entry_name(&self) -> Option<&str> {
        if let Some(name) = self.default_entry.as_deref() {
            if self.entries.contains_key(name) {
                return Some(name);
            }
        }
        match self.entries.keys().collect::<Vec<_>>().as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    pub fn entry(&self, name: &str) -> Result<&Entry, ConfigError> {
        self.entries.get(name).ok_or_else(|| ConfigError::UnknownEntry {
            entry: name.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_status_concurrency")]
    pub status_concurrency: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            status_concurrency: default_status_concurrency(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}
fn default_status_concurrency() -> usize {
    DEFAULT_STATUS_CONCURRENCY
}

/// One configured vendor account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Entry {
    /// Display title; defaults to "SwitchBot Cloud".
    pub title: Option<String>,

    /// API token (plaintext; prefer keyring or env var).
    pub api_token: Option<String>,

    /// Environment variable name containing the API token.
    pub api_token_env: Option<String>,

    /// Override the default refresh interval.
    pub refresh_interval_secs: Option<u64>,

    /// Override the default status concurrency.
    pub status_concurrency: Option<usize>,
}

// ── Config file path ────────────────────────────────────────────────

/// Names an explicit config file, checked before the platform location.
pub const CONFIG_FILE_ENV: &str = "SWITCHBOT_CONFIG_FILE";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Where the config lives: `$SWITCHBOT_CONFIG_FILE`, else `config.toml`
/// in the platform config directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_FILE_ENV) {
        return Ok(PathBuf::from(path));
    }
    ProjectDirs::from("com", "switchbot", "switchbot-cloud")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

// ── Config loading ──────────────────────────────────────────────────

pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path()?)
}

/// Load config from `path` layered over defaults, with `SWITCHBOT_*`
/// environment variables on top. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path()?)
}

/// Write `cfg` as TOML. The file is replaced in one rename so readers
/// never see a partial config.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(cfg)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let staging = path.with_extension("toml.tmp");
    std::fs::write(&staging, rendered)?;
    std::fs::rename(&staging, path)?;
    debug!(path = %path.display(), entries = cfg.entries.len(), "config saved");
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve an entry's API token: named env var, then system keyring,
/// then plaintext in the config file.
pub fn resolve_api_token(entry: &Entry, entry_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Entry's api_token_env → env var lookup
    if let Some(ref env_name) = entry.api_token_env {
        if let Ok(val) = std::env::var(env_name) {
            debug!(entry = entry_name, source = "env", "API token resolved");
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(kr) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(entry_name)) {
        if let Ok(secret) = kr.get_password() {
            debug!(entry = entry_name, source = "keyring", "API token resolved");
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = entry.api_token {
        debug!(entry = entry_name, source = "config", "API token resolved");
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        entry: entry_name.into(),
    })
}

/// Store an entry's API token in the system keyring.
pub fn store_api_token(entry_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(entry_name))
        .and_then(|kr| kr.set_password(token.expose_secret()))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

fn keyring_user(entry_name: &str) -> String {
    format!("{entry_name}/api-token")
}

// ── Translation ─────────────────────────────────────────────────────

/// Build an `IntegrationConfig` for one entry, applying global defaults
/// and validating polling settings.
pub fn entry_to_integration_config(
    entry: &Entry,
    entry_name: &str,
    defaults: &Defaults,
) -> Result<IntegrationConfig, ConfigError> {
    let api_token = resolve_api_token(entry, entry_name)?;
    if api_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation {
            field: format!("entries.{entry_name}.api_token"),
            reason: "token is empty".into(),
        });
    }

    let coordinator = CoordinatorConfig {
        refresh_interval: Duration::from_secs(
            entry
                .refresh_interval_secs
                .unwrap_or(defaults.refresh_interval_secs),
        ),
        status_concurrency: entry
            .status_concurrency
            .unwrap_or(defaults.status_concurrency),
    };
    coordinator
        .validate()
        .map_err(|e| ConfigError::Validation {
            field: format!("entries.{entry_name}"),
            reason: e.to_string(),
        })?;

    let mut config = IntegrationConfig::new(api_token);
    if let Some(ref title) = entry.title {
        config.title.clone_from(title);
    }
    config.coordinator = coordinator;
    Ok(config)
}

/// Resolve the active entry of a loaded config into an `IntegrationConfig`.
pub fn active_integration_config(cfg: &Config) -> Result<IntegrationConfig, ConfigError> {
    let name = cfg.active_entry_name().ok_or_else(|| ConfigError::UnknownEntry {
        entry: cfg.default_entry.clone().unwrap_or_default(),
    })?;
    entry_to_integration_config(cfg.entry(name)?, name, &cfg.defaults)
}
