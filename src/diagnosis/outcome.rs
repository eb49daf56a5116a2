// src/diagnosis/outcome.rs

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Итог диагностики входа. Ровно один на запрос.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthenticationOutcome {
    NotFound { username: String },
    Success { username: String },
    WrongPassword { username: String },
    AccountDisabled { username: String },
    AccountLockedOut { username: String },
    PasswordExpired { username: String },
    /// Вход отклонён, конкретная причина не установлена
    NotAuthorized { username: String },
}

impl AuthenticationOutcome {
    pub fn username(&self) -> &str {
        match self {
            Self::NotFound { username }
            | Self::Success { username }
            | Self::WrongPassword { username }
            | Self::AccountDisabled { username }
            | Self::AccountLockedOut { username }
            | Self::PasswordExpired { username }
            | Self::NotAuthorized { username } => username,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Короткое имя исхода, например `wrong_password`
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Success { .. } => "success",
            Self::WrongPassword { .. } => "wrong_password",
            Self::AccountDisabled { .. } => "account_disabled",
            Self::AccountLockedOut { .. } => "account_locked_out",
            Self::PasswordExpired { .. } => "password_expired",
            Self::NotAuthorized { .. } => "not_authorized",
        }
    }

    /// Для вызывающих, которые предпочитают `?`: успех даёт имя пользователя
    pub fn into_result(self) -> Result<String, LoginFailure> {
        match self {
            Self::Success { username } => Ok(username),
            Self::NotFound { username } => Err(LoginFailure::UserNotFound(username)),
            Self::WrongPassword { username } => Err(LoginFailure::WrongPassword(username)),
            Self::AccountDisabled { username } => Err(LoginFailure::AccountDisabled(username)),
            Self::AccountLockedOut { username } => Err(LoginFailure::AccountLockedOut(username)),
            Self::PasswordExpired { username } => Err(LoginFailure::PasswordExpired(username)),
            Self::NotAuthorized { username } => Err(LoginFailure::NotAuthorized(username)),
        }
    }
}

impl fmt::Display for AuthenticationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.username(), self.code())
    }
}

/// Классифицированные причины отказа во входе
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("wrong password for {0}")]
    WrongPassword(String),
    #[error("account {0} is disabled")]
    AccountDisabled(String),
    #[error("account {0} is locked out")]
    AccountLockedOut(String),
    #[error("password for {0} has expired")]
    PasswordExpired(String),
    #[error("{0} is not authorized")]
    NotAuthorized(String),
}
