//! Settings for the MyQ bridge daemon.
//!
//! TOML file + `MYQ_*` environment merging via figment, a password
//! resolution chain (env var, system keyring, plaintext), and
//! translation to `myq_core::ControllerConfig`. The daemon is the only
//! consumer -- core never reads config files.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use myq_core::ControllerConfig;

/// Environment variable checked first for the account password.
const PASSWORD_ENV: &str = "MYQ_PASSWORD";

/// Keyring service name under which the password may be stored.
const KEYRING_SERVICE: &str = "myqd";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Startup cannot proceed without account credentials. Fatal.
    #[error(
        "MyQ account credentials are missing -- set 'username' and 'password' \
         in the settings file or the MYQ_USERNAME/MYQ_PASSWORD environment"
    )]
    MissingCredentials,

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// On-disk daemon settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct Settings {
    /// MyQ account email. Required.
    pub username: Option<String>,

    /// Account password (plaintext -- prefer the keyring or env var).
    pub password: Option<String>,

    /// Assumed token lifetime in seconds before a lazy refresh.
    #[serde(default = "default_token_ttl")]
    pub token_ttl: u64,

    /// Poll interval in seconds while a door is in motion or a command
    /// was recently issued.
    #[serde(default = "default_active_interval")]
    pub active_update_interval: u64,

    /// Poll interval in seconds while idle.
    #[serde(default = "default_inactive_interval")]
    pub inactive_update_interval: u64,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            token_ttl: default_token_ttl(),
            active_update_interval: default_active_interval(),
            inactive_update_interval: default_inactive_interval(),
            http_timeout: default_http_timeout(),
        }
    }
}

fn default_token_ttl() -> u64 {
    1200
}
fn default_active_interval() -> u64 {
    15
}
fn default_inactive_interval() -> u64 {
    60
}
fn default_http_timeout() -> u64 {
    10
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "goosed", "myqd").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where the daemon persists its node custom data.
pub fn data_path() -> PathBuf {
    ProjectDirs::from("com", "goosed", "myqd").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("nodes.json");
            p
        },
        |dirs| dirs.data_dir().join("nodes.json"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("myqd");
    p
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load settings from file + environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&config_path())
}

/// Load settings from an explicit file path + environment.
pub fn load_settings_from(path: &std::path::Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MYQ_"));

    let settings: Settings = figment.extract()?;
    Ok(settings)
}

/// Serialize settings to TOML at the canonical path.
pub fn save_settings(settings: &Settings) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the account password: env var, then keyring, then plaintext.
pub fn resolve_password(settings: &Settings, username: &str) -> Result<SecretString, ConfigError> {
    // 1. Environment
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, username) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 3. Plaintext in the settings file
    if let Some(ref pw) = settings.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::MissingCredentials)
}

/// Store the account password in the system keyring.
pub fn store_password(username: &str, password: &str) -> Result<(), ConfigError> {
    let entry =
        keyring::Entry::new(KEYRING_SERVICE, username).map_err(|e| ConfigError::Validation {
            field: "password".into(),
            reason: e.to_string(),
        })?;
    entry.set_password(password).map_err(|e| ConfigError::Validation {
        field: "password".into(),
        reason: e.to_string(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build the runtime `ControllerConfig`. Missing credentials are fatal
/// to startup -- the daemon surfaces a notice and exits.
pub fn to_controller_config(settings: &Settings) -> Result<ControllerConfig, ConfigError> {
    let username = settings
        .username
        .clone()
        .ok_or(ConfigError::MissingCredentials)?;

    let password = resolve_password(settings, &username)?;

    Ok(ControllerConfig {
        username,
        password,
        token_ttl: Duration::from_secs(settings.token_ttl),
        active_interval: Duration::from_secs(settings.active_update_interval),
        inactive_interval: Duration::from_secs(settings.inactive_update_interval),
        http_timeout: Duration::from_secs(settings.http_timeout),
        endpoints: myq_api::ApiEndpoints::default(),
    })
}
