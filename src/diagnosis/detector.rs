// src/diagnosis/detector.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::flags::{AccountControl, ACCOUNT_DISABLED, PASSWORD_NEVER_EXPIRES};

/// Порог блокировки по умолчанию
pub const MAX_ATTEMPTS_COUNT: u32 = 20;

/// Недопустимые значения политики
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("username_attribute cannot be empty")]
    EmptyUsernameAttribute,
    #[error("lockout_threshold must be at least 1")]
    ZeroLockoutThreshold,
    #[error("{name} must be below 32, got {bit}")]
    BitIndexOutOfRange { name: &'static str, bit: u32 },
}

/// Параметры схемы и политики каталога, на которые опирается диагностика
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DiagnosticPolicy {
    #[serde(default = "default_username_attribute")]
    pub username_attribute: String,
    #[serde(default = "default_lockout_threshold")]
    pub lockout_threshold: u32,
    #[serde(default = "default_account_disabled_bit")]
    pub account_disabled_bit: u32,
    #[serde(default = "default_password_never_expires_bit")]
    pub password_never_expires_bit: u32,
}

fn default_username_attribute() -> String { "sAMAccountName".to_string() }
fn default_lockout_threshold() -> u32 { MAX_ATTEMPTS_COUNT }
fn default_account_disabled_bit() -> u32 { ACCOUNT_DISABLED }
fn default_password_never_expires_bit() -> u32 { PASSWORD_NEVER_EXPIRES }

impl Default for DiagnosticPolicy {
    fn default() -> Self {
        Self {
            username_attribute: default_username_attribute(),
            lockout_threshold: default_lockout_threshold(),
            account_disabled_bit: default_account_disabled_bit(),
            password_never_expires_bit: default_password_never_expires_bit(),
        }
    }
}

impl DiagnosticPolicy {
    pub fn with_lockout_threshold(mut self, threshold: u32) -> Self {
        self.lockout_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.username_attribute.trim().is_empty() {
            return Err(PolicyError::EmptyUsernameAttribute);
        }
        if self.lockout_threshold == 0 {
            return Err(PolicyError::ZeroLockoutThreshold);
        }
        for (name, bit) in [
            ("account_disabled_bit", self.account_disabled_bit),
            ("password_never_expires_bit", self.password_never_expires_bit),
        ] {
            if bit >= u32::BITS {
                return Err(PolicyError::BitIndexOutOfRange { name, bit });
            }
        }
        Ok(())
    }

    /// Пароль неверен, если сервер увеличил счётчик за время попытки входа
    pub fn is_wrong_password(&self, before: u32, after: u32) -> bool {
        after > before
    }

    pub fn is_disabled(&self, control: AccountControl) -> bool {
        control.is_property_active(self.account_disabled_bit)
    }

    /// Строгое равенство: после блокировки сервер перестаёт увеличивать счётчик
    pub fn is_locked_out(&self, failed_attempt_count: u32) -> bool {
        failed_attempt_count == self.lockout_threshold
    }

    /// pwdLastSet = 0 и нет флага «пароль не истекает».
    /// Сброс администратором выглядит так же и не отличается.
    pub fn is_password_expired(&self, password_set_timestamp: i64, control: AccountControl) -> bool {
        password_set_timestamp == 0 && !control.is_property_active(self.password_never_expires_bit)
    }
}
