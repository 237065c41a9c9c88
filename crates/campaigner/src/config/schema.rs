use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file. Falls back to [`crate::db::default_database_path`].
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_frequency_cap_days")]
    pub frequency_cap_days: u32,
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_stale_sending_secs")]
    pub stale_sending_secs: u64,
    #[serde(default)]
    pub footer: FooterConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_batch_size() -> u32 {
    100
}

fn default_frequency_cap_days() -> u32 {
    7
}

fn default_dispatch_timeout_secs() -> u64 {
    30
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_stale_sending_secs() -> u64 {
    900
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            batch_size: default_batch_size(),
            frequency_cap_days: default_frequency_cap_days(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
            tick_interval_secs: default_tick_interval_secs(),
            stale_sending_secs: default_stale_sending_secs(),
            footer: FooterConfig::default(),
            credentials: CredentialConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Resolved database location, expanding a leading `~`.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(expand_tilde(path)),
            None => crate::db::default_database_path(),
        }
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn stale_sending_after(&self) -> Duration {
        Duration::from_secs(self.stale_sending_secs)
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Values used by the fallback compliance footer and the unsubscribe link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FooterConfig {
    #[serde(default = "default_unsubscribe_url")]
    pub unsubscribe_url: String,
    #[serde(default = "default_company_name")]
    pub company_name: String,
}

fn default_unsubscribe_url() -> String {
    "https://example.com/unsubscribe".to_string()
}

fn default_company_name() -> String {
    "Your Company".to_string()
}

impl Default for FooterConfig {
    fn default() -> Self {
        Self {
            unsubscribe_url: default_unsubscribe_url(),
            company_name: default_company_name(),
        }
    }
}

/// Where the SMTP credential encryption key comes from.
///
/// Resolved in order: `key`, then `key_file`, then `key_env_var`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub key_file: Option<String>,
    #[serde(default = "default_key_env_var")]
    pub key_env_var: Option<String>,
}

fn default_key_env_var() -> Option<String> {
    Some(crate::secrets::CREDENTIAL_KEY_ENV_VAR.to_string())
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            key: None,
            key_file: None,
            key_env_var: default_key_env_var(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
