// src/diagnosis/session.rs

use once_cell::unsync::OnceCell;
use std::fmt;
use tracing::debug;

use super::detector::DiagnosticPolicy;
use super::flags::AccountControl;
use super::outcome::AuthenticationOutcome;
use crate::directory::{lookup, AccountRecord, DirectoryConnection, DirectoryError, Filter};

/// Учётные данные входа. Пароль не попадает в `Debug`.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Результат первой фазы
#[derive(Debug)]
pub enum Begin {
    /// Учётная запись не найдена; попытка входа не нужна
    NotFound(AuthenticationOutcome),
    /// Снимок до входа получен, ожидается попытка входа
    Ready(DiagnosticSession),
}

/// Сеанс диагностики одного запроса: снимок до входа и
/// лениво декодированный userAccountControl.
#[derive(Debug)]
pub struct DiagnosticSession {
    username: String,
    filter: String,
    policy: DiagnosticPolicy,
    pre_bind: AccountRecord,
    account_control: OnceCell<AccountControl>,
}

impl DiagnosticSession {
    /// Фаза 1: найти учётную запись и зафиксировать её состояние до входа
    pub fn begin_diagnosis<C>(
        conn: &mut C,
        credentials: &Credentials,
        policy: &DiagnosticPolicy,
    ) -> Result<Begin, DirectoryError>
    where
        C: DirectoryConnection + ?Sized,
    {
        let filter = Filter::equality(policy.username_attribute.as_str(), credentials.username()).to_string();

        let Some(pre_bind) = lookup(conn, &filter)? else {
            return Ok(Begin::NotFound(AuthenticationOutcome::NotFound {
                username: credentials.username().to_string(),
            }));
        };

        debug!(
            failed_attempts = pre_bind.failed_attempt_count,
            password_set = ?pre_bind.password_set_at(),
            "pre-bind snapshot"
        );

        Ok(Begin::Ready(Self {
            username: credentials.username().to_string(),
            filter,
            policy: policy.clone(),
            pre_bind,
            account_control: OnceCell::new(),
        }))
    }

    /// Фильтр, по которому выполняется вход
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Фаза 2: зафиксировать результат единственной попытки входа
    pub fn record_bind_result(self, succeeded: bool) -> BindRecorded {
        debug!(succeeded, "bind result recorded");
        BindRecorded {
            session: self,
            succeeded,
        }
    }

    /// userAccountControl декодируется один раз, из снимка до входа
    fn account_control(&self) -> AccountControl {
        *self
            .account_control
            .get_or_init(|| AccountControl::new(self.pre_bind.account_control_bits))
    }

    fn outcome(&self, make: fn(String) -> AuthenticationOutcome) -> AuthenticationOutcome {
        make(self.username.clone())
    }
}

/// Сеанс после попытки входа
#[derive(Debug)]
pub struct BindRecorded {
    session: DiagnosticSession,
    succeeded: bool,
}

impl BindRecorded {
    /// Фаза 3: перечитать учётную запись и классифицировать отказ.
    ///
    /// При успешном входе каталог больше не читается. Иначе выполняется
    /// ровно одно дополнительное чтение, затем проверки по приоритету:
    /// неверный пароль, отключена, заблокирована, пароль истёк, прочее.
    pub fn conclude_diagnosis<C>(self, conn: &mut C) -> Result<AuthenticationOutcome, DirectoryError>
    where
        C: DirectoryConnection + ?Sized,
    {
        let session = self.session;
        if self.succeeded {
            return Ok(session.outcome(|username| AuthenticationOutcome::Success { username }));
        }

        let post_bind = lookup(conn, &session.filter)?;
        let policy = &session.policy;

        let before = session.pre_bind.failed_attempt_count;
        // Запись могла исчезнуть между чтениями: тогда сравнивать не с чем
        let current = post_bind.as_ref().unwrap_or(&session.pre_bind);
        let after = current.failed_attempt_count;
        debug!(before, after, found = post_bind.is_some(), "post-bind snapshot");

        if post_bind.is_some() && policy.is_wrong_password(before, after) {
            return Ok(session.outcome(|username| AuthenticationOutcome::WrongPassword { username }));
        }

        let control = session.account_control();
        debug!(flags = ?control.known_flags(), "account control");
        if policy.is_disabled(control) {
            return Ok(session.outcome(|username| AuthenticationOutcome::AccountDisabled { username }));
        }

        if policy.is_locked_out(after) {
            return Ok(session.outcome(|username| AuthenticationOutcome::AccountLockedOut { username }));
        }

        if policy.is_password_expired(current.password_set_timestamp, control) {
            return Ok(session.outcome(|username| AuthenticationOutcome::PasswordExpired { username }));
        }

        Ok(session.outcome(|username| AuthenticationOutcome::NotAuthorized { username }))
    }
}
