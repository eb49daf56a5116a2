// src/directory/memory.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use super::filter::Filter;
use super::{datetime_to_filetime, AccountRecord, DirectoryConnection, DirectoryError};
use crate::diagnosis::{AccountControl, DiagnosticPolicy};

/// Стоимость bcrypt для учётных записей, созданных в коде (минимально допустимая)
const HASH_COST: u32 = 4;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid fixture: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password_set_at of {username} is outside the FILETIME range: {at}")]
    TimestampOutOfRange { username: String, at: DateTime<Utc> },
}

/// Учётная запись каталога в памяти
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MemoryAccount {
    pub username: String,
    /// bcrypt-хеш пароля
    pub password_hash: String,
    #[serde(default)]
    pub failed_attempt_count: u32,
    #[serde(default)]
    pub account_control_bits: u32,
    /// Время смены пароля; отсутствие — pwdLastSet = 0
    #[serde(default)]
    pub password_set_at: Option<DateTime<Utc>>,
}

impl MemoryAccount {
    pub fn new(username: impl Into<String>, password: &str) -> Result<Self, FixtureError> {
        Ok(Self {
            username: username.into(),
            password_hash: bcrypt::hash(password, HASH_COST)?,
            failed_attempt_count: 0,
            account_control_bits: 0,
            password_set_at: Some(Utc::now()),
        })
    }

    pub fn with_failed_attempts(mut self, count: u32) -> Self {
        self.failed_attempt_count = count;
        self
    }

    pub fn with_account_control(mut self, bits: u32) -> Self {
        self.account_control_bits = bits;
        self
    }

    pub fn with_password_set_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.password_set_at = at;
        self
    }

    /// pwdLastSet; 0, если отметки нет
    fn password_set_timestamp(&self) -> Result<i64, FixtureError> {
        match &self.password_set_at {
            None => Ok(0),
            Some(at) => datetime_to_filetime(at).ok_or_else(|| FixtureError::TimestampOutOfRange {
                username: self.username.clone(),
                at: *at,
            }),
        }
    }

    fn snapshot(&self) -> Result<AccountRecord, DirectoryError> {
        let password_set_timestamp = self
            .password_set_timestamp()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        Ok(AccountRecord {
            username: self.username.clone(),
            failed_attempt_count: self.failed_attempt_count,
            account_control_bits: self.account_control_bits,
            password_set_timestamp,
        })
    }

    fn password_matches(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

#[derive(Deserialize)]
struct Fixture {
    accounts: Vec<MemoryAccount>,
}

/// Каталог в памяти, который ведёт себя при bind как контроллер домена:
/// считает неверные пароли, блокирует на пороге, отклоняет отключённые и
/// просроченные учётные записи без увеличения счётчика.
#[derive(Debug)]
pub struct MemoryDirectory {
    accounts: Vec<MemoryAccount>,
    policy: DiagnosticPolicy,
    searches: usize,
    binds: usize,
}

impl MemoryDirectory {
    pub fn new(policy: DiagnosticPolicy) -> Self {
        Self {
            accounts: Vec::new(),
            policy,
            searches: 0,
            binds: 0,
        }
    }

    pub fn with_account(mut self, account: MemoryAccount) -> Self {
        self.accounts.push(account);
        self
    }

    /// Загрузить учётные записи из YAML-файла вида `accounts: [...]`
    pub fn from_yaml_file<P: AsRef<Path>>(path: P, policy: DiagnosticPolicy) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content, policy)
    }

    pub fn from_yaml_str(content: &str, policy: DiagnosticPolicy) -> Result<Self, FixtureError> {
        let fixture: Fixture = serde_yaml::from_str(content)?;
        for account in &fixture.accounts {
            account.password_set_timestamp()?;
        }
        Ok(Self {
            accounts: fixture.accounts,
            ..Self::new(policy)
        })
    }

    /// Количество выполненных поисков
    pub fn searches(&self) -> usize {
        self.searches
    }

    /// Количество попыток входа
    pub fn binds(&self) -> usize {
        self.binds
    }

    pub fn account(&self, username: &str) -> Option<&MemoryAccount> {
        self.accounts.iter().find(|a| a.username.eq_ignore_ascii_case(username))
    }

    fn parse_filter(filter: &str) -> Result<Filter, DirectoryError> {
        Filter::parse(filter).map_err(|e| DirectoryError::Unavailable(format!("{}: {}", e, filter)))
    }
}

impl DirectoryConnection for MemoryDirectory {
    fn bind(&mut self, filter: &str, password: &str) -> Result<bool, DirectoryError> {
        self.binds += 1;
        let filter = Self::parse_filter(filter)?;
        let naming_attribute = self.policy.username_attribute.clone();
        let threshold = self.policy.lockout_threshold;
        let disabled_bit = self.policy.account_disabled_bit;
        let never_expires_bit = self.policy.password_never_expires_bit;

        let Some(account) = self
            .accounts
            .iter_mut()
            .find(|a| filter.matches_account(&naming_attribute, &a.username))
        else {
            return Ok(false);
        };

        if password.is_empty() || account.failed_attempt_count >= threshold {
            debug!(username = %account.username, "bind rejected without counting");
            return Ok(false);
        }

        if !account.password_matches(password) {
            account.failed_attempt_count += 1;
            debug!(username = %account.username, count = account.failed_attempt_count, "bad password counted");
            return Ok(false);
        }

        let control = AccountControl::new(account.account_control_bits);
        let expired = account.password_set_at.is_none() && !control.is_property_active(never_expires_bit);
        if control.is_property_active(disabled_bit) || expired {
            return Ok(false);
        }

        account.failed_attempt_count = 0;
        Ok(true)
    }

    fn search(&mut self, filter: &str) -> Result<Vec<AccountRecord>, DirectoryError> {
        self.searches += 1;
        let filter = Self::parse_filter(filter)?;
        let naming_attribute = &self.policy.username_attribute;

        self.accounts
            .iter()
            .filter(|a| filter.matches_account(naming_attribute, &a.username))
            .map(MemoryAccount::snapshot)
            .collect()
    }
}
