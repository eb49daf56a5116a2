// src/config.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::diagnosis::{DiagnosticPolicy, PolicyError};

/// Переменная окружения с паролем служебной учётной записи
pub const BIND_PASSWORD_ENV: &str = "LOGINDIAG_BIND_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub policy: DiagnosticPolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DirectoryConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_base_dn")]
    pub base_dn: String,
    /// Служебная учётная запись для поиска; без неё — анонимный поиск
    pub bind_dn: Option<String>,
    #[serde(default, skip_serializing)]
    pub bind_password: Option<String>,
    #[serde(default)]
    pub starttls: bool,
    #[serde(default)]
    pub no_tls_verify: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub attributes: AttributeNames,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            base_dn: default_base_dn(),
            bind_dn: None,
            bind_password: None,
            starttls: false,
            no_tls_verify: false,
            connect_timeout_secs: default_connect_timeout(),
            attributes: AttributeNames::default(),
        }
    }
}

fn default_url() -> String {
    "ldap://localhost:389".to_string()
}

fn default_base_dn() -> String {
    "DC=corp,DC=acme,DC=com".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

/// Имена атрибутов схемы каталога
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AttributeNames {
    #[serde(default = "default_failed_attempts")]
    pub failed_attempts: String,
    #[serde(default = "default_account_control")]
    pub account_control: String,
    #[serde(default = "default_password_set")]
    pub password_set: String,
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            failed_attempts: default_failed_attempts(),
            account_control: default_account_control(),
            password_set: default_password_set(),
        }
    }
}

fn default_failed_attempts() -> String { "badPwdCount".to_string() }
fn default_account_control() -> String { "userAccountControl".to_string() }
fn default_password_set() -> String { "pwdLastSet".to_string() }

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub enable_json_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            enable_json_output: false,
        }
    }
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.policy.validate()?;
        config.apply_env();
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/logindiag/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("logindiag").join("config.yaml"))
    }

    /// Пароль служебной учётной записи из окружения имеет приоритет над файлом
    fn apply_env(&mut self) {
        dotenvy::dotenv().ok();
        if let Ok(password) = std::env::var(BIND_PASSWORD_ENV) {
            self.directory.bind_password = Some(password);
        }
    }
}
