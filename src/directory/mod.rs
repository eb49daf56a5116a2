// src/directory/mod.rs

pub mod filter;
pub mod ldap;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use filter::Filter;
pub use ldap::LdapDirectory;
pub use memory::{MemoryAccount, MemoryDirectory};

/// Разница между эпохой FILETIME (1601-01-01) и Unix-эпохой в секундах
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;

/// Ошибки каталога
///
/// Ядро диагностики само не создаёт этих ошибок: они приходят из соединения
/// и пробрасываются вызывающему без изменений.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    #[error("directory unavailable: {0}")]
    Ldap(#[from] ldap3::LdapError),
}

/// Снимок учётной записи на момент чтения
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub username: String,
    /// badPwdCount — увеличивается самим сервером при неверном пароле
    pub failed_attempt_count: u32,
    /// userAccountControl
    pub account_control_bits: u32,
    /// pwdLastSet в формате FILETIME; 0 — отметки нет
    pub password_set_timestamp: i64,
}

impl AccountRecord {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            failed_attempt_count: 0,
            account_control_bits: 0,
            password_set_timestamp: 0,
        }
    }

    pub fn with_failed_attempts(mut self, count: u32) -> Self {
        self.failed_attempt_count = count;
        self
    }

    pub fn with_account_control(mut self, bits: u32) -> Self {
        self.account_control_bits = bits;
        self
    }

    pub fn with_password_set(mut self, timestamp: i64) -> Self {
        self.password_set_timestamp = timestamp;
        self
    }

    /// Время смены пароля, если отметка есть
    pub fn password_set_at(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.password_set_timestamp)
    }
}

/// FILETIME (100-нс интервалы с 1601 года) → UTC. 0 и отрицательные значения — отметки нет.
pub fn filetime_to_datetime(filetime: i64) -> Option<DateTime<Utc>> {
    if filetime <= 0 {
        return None;
    }
    let secs = filetime / 10_000_000 - FILETIME_UNIX_OFFSET_SECS;
    let nanos = (filetime % 10_000_000) as u32 * 100;
    DateTime::from_timestamp(secs, nanos)
}

/// UTC → FILETIME. `None`, если дата раньше 1601 года или не помещается в i64.
pub fn datetime_to_filetime(at: &DateTime<Utc>) -> Option<i64> {
    at.timestamp()
        .checked_add(FILETIME_UNIX_OFFSET_SECS)?
        .checked_mul(10_000_000)?
        .checked_add(i64::from(at.timestamp_subsec_nanos() / 100))
        .filter(|filetime| *filetime >= 0)
}

/// Соединение с каталогом
///
/// Реализации отвечают за транспорт, TLS и таймауты. Диагностика вызывает
/// методы строго последовательно в рамках одного сеанса.
pub trait DirectoryConnection {
    /// Попытка входа учётной записи, найденной по фильтру.
    /// `Ok(false)` — сервер отклонил вход, `Err` — каталог недоступен.
    fn bind(&mut self, filter: &str, password: &str) -> Result<bool, DirectoryError>;

    /// Поиск учётных записей по фильтру
    fn search(&mut self, filter: &str) -> Result<Vec<AccountRecord>, DirectoryError>;
}

impl<C: DirectoryConnection + ?Sized> DirectoryConnection for &mut C {
    fn bind(&mut self, filter: &str, password: &str) -> Result<bool, DirectoryError> {
        (**self).bind(filter, password)
    }

    fn search(&mut self, filter: &str) -> Result<Vec<AccountRecord>, DirectoryError> {
        (**self).search(filter)
    }
}

impl<C: DirectoryConnection + ?Sized> DirectoryConnection for Box<C> {
    fn bind(&mut self, filter: &str, password: &str) -> Result<bool, DirectoryError> {
        (**self).bind(filter, password)
    }

    fn search(&mut self, filter: &str) -> Result<Vec<AccountRecord>, DirectoryError> {
        (**self).search(filter)
    }
}

/// Найти учётную запись по фильтру.
///
/// Отсутствие записи — не ошибка. Если сервер вернул несколько записей,
/// используется первая.
pub fn lookup<C>(conn: &mut C, filter: &str) -> Result<Option<AccountRecord>, DirectoryError>
where
    C: DirectoryConnection + ?Sized,
{
    let records = conn.search(filter)?;
    if records.len() > 1 {
        warn!(filter, count = records.len(), "lookup matched several accounts, using the first");
    }
    let record = records.into_iter().next();
    debug!(filter, found = record.is_some(), "lookup");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<AccountRecord>);

    impl DirectoryConnection for Fixed {
        fn bind(&mut self, _filter: &str, _password: &str) -> Result<bool, DirectoryError> {
            Ok(false)
        }

        fn search(&mut self, _filter: &str) -> Result<Vec<AccountRecord>, DirectoryError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn lookup_returns_none_for_empty_result() {
        let mut conn = Fixed(vec![]);
        assert_eq!(lookup(&mut conn, "(sAMAccountName=ghost)").unwrap(), None);
    }

    #[test]
    fn lookup_uses_first_record() {
        let mut conn = Fixed(vec![
            AccountRecord::new("jdoe").with_failed_attempts(1),
            AccountRecord::new("jdoe").with_failed_attempts(7),
        ]);
        let record = lookup(&mut conn, "(sAMAccountName=jdoe)").unwrap().unwrap();
        assert_eq!(record.failed_attempt_count, 1);
    }

    #[test]
    fn filetime_conversion() {
        assert_eq!(filetime_to_datetime(0), None);

        // 2020-01-01T00:00:00Z
        let at = DateTime::from_timestamp(1_577_836_800, 0).unwrap();
        let filetime = datetime_to_filetime(&at).unwrap();
        assert_eq!(filetime, 132_223_104_000_000_000);
        assert_eq!(filetime_to_datetime(filetime), Some(at));
    }

    #[test]
    fn filetime_out_of_range() {
        let far_future: DateTime<Utc> = "+50000-01-01T00:00:00Z".parse().unwrap();
        assert_eq!(datetime_to_filetime(&far_future), None);

        let before_1601: DateTime<Utc> = "1500-01-01T00:00:00Z".parse().unwrap();
        assert_eq!(datetime_to_filetime(&before_1601), None);
    }
}
