// src/directory/ldap.rs

use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::{AccountRecord, DirectoryConnection, DirectoryError};
use crate::config::DirectoryConfig;

/// Код результата LDAP для неверных учётных данных
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Соединение с живым каталогом (Active Directory или совместимым) через ldap3
pub struct LdapDirectory {
    conn: LdapConn,
    config: DirectoryConfig,
    naming_attribute: String,
}

impl LdapDirectory {
    /// Подключиться и, если задана служебная учётная запись, выполнить bind
    pub fn connect(config: &DirectoryConfig, naming_attribute: &str) -> Result<Self, DirectoryError> {
        info!(url = %config.url, "connecting to directory");
        let mut conn = open(config)?;

        if let Some(bind_dn) = &config.bind_dn {
            let password = config.bind_password.as_deref().unwrap_or_default();
            conn.simple_bind(bind_dn, password)?.success()?;
            debug!(bind_dn = %bind_dn, "service bind succeeded");
        }

        Ok(Self {
            conn,
            config: config.clone(),
            naming_attribute: naming_attribute.to_string(),
        })
    }

    fn requested_attributes(&self) -> Vec<String> {
        let names = &self.config.attributes;
        vec![
            self.naming_attribute.clone(),
            names.failed_attempts.clone(),
            names.account_control.clone(),
            names.password_set.clone(),
        ]
    }

    fn record_from_entry(&self, entry: SearchEntry) -> Result<AccountRecord, DirectoryError> {
        let names = &self.config.attributes;
        let attrs = lowercase_keys(entry.attrs);

        let username = first_value(&attrs, &self.naming_attribute)
            .map(str::to_string)
            .unwrap_or_else(|| entry.dn.clone());

        let failed_attempt_count = parse_attr::<u32>(&attrs, &names.failed_attempts)?;
        let account_control_bits = parse_account_control(&attrs, &names.account_control)?;
        let password_set_timestamp = parse_attr::<i64>(&attrs, &names.password_set)?;

        Ok(AccountRecord {
            username,
            failed_attempt_count,
            account_control_bits,
            password_set_timestamp,
        })
    }

    fn resolve_dn(&mut self, filter: &str) -> Result<Option<String>, DirectoryError> {
        let (rs, _res) = self
            .conn
            .search(&self.config.base_dn, Scope::Subtree, filter, vec!["1.1"])?
            .success()?;
        Ok(rs.into_iter().next().map(|entry| SearchEntry::construct(entry).dn))
    }
}

impl DirectoryConnection for LdapDirectory {
    fn bind(&mut self, filter: &str, password: &str) -> Result<bool, DirectoryError> {
        // Пустой пароль при simple bind сервер трактует как анонимный вход
        if password.is_empty() {
            debug!(filter, "refusing bind with empty password");
            return Ok(false);
        }

        let Some(dn) = self.resolve_dn(filter)? else {
            return Ok(false);
        };

        // Вход на том же соединении: badPwdCount не реплицируется между
        // контроллерами, поэтому чтения и bind должны идти к одному серверу
        let result = self.conn.simple_bind(&dn, password)?;
        let accepted = match result.rc {
            0 => true,
            RC_INVALID_CREDENTIALS => {
                debug!(dn = %dn, diagnostic = %result.text, "bind rejected: invalid credentials");
                false
            }
            rc => {
                debug!(dn = %dn, rc, diagnostic = %result.text, "bind rejected");
                false
            }
        };

        if let Some((bind_dn, bind_password)) = identity_after_bind(&self.config, accepted) {
            self.conn.simple_bind(bind_dn, bind_password)?.success()?;
            debug!(bind_dn = %bind_dn, "connection identity restored");
        }

        Ok(accepted)
    }

    fn search(&mut self, filter: &str) -> Result<Vec<AccountRecord>, DirectoryError> {
        let attrs = self.requested_attributes();
        let (rs, _res) = self
            .conn
            .search(&self.config.base_dn, Scope::Subtree, filter, attrs)?
            .success()?;

        rs.into_iter()
            .map(|entry| self.record_from_entry(SearchEntry::construct(entry)))
            .collect()
    }
}

impl Drop for LdapDirectory {
    fn drop(&mut self) {
        let _ = self.conn.unbind();
    }
}

fn open(config: &DirectoryConfig) -> Result<LdapConn, DirectoryError> {
    let settings = LdapConnSettings::new()
        .set_conn_timeout(Duration::from_secs(config.connect_timeout_secs))
        .set_starttls(config.starttls)
        .set_no_tls_verify(config.no_tls_verify);
    Ok(LdapConn::with_settings(settings, &config.url)?)
}

/// Идентичность, которую нужно вернуть соединению после входа пользователя.
/// Неудачный bind без служебной учётной записи оставляет соединение анонимным.
fn identity_after_bind(config: &DirectoryConfig, user_bound: bool) -> Option<(&str, &str)> {
    match &config.bind_dn {
        Some(bind_dn) => Some((bind_dn.as_str(), config.bind_password.as_deref().unwrap_or_default())),
        None if user_bound => Some(("", "")),
        None => None,
    }
}

/// userAccountControl хранится как знаковое 32-битное целое;
/// беззнаковая запись тоже принимается, всё остальное отклоняется
fn parse_account_control(attrs: &HashMap<String, Vec<String>>, name: &str) -> Result<u32, DirectoryError> {
    let Some(raw) = first_value(attrs, name) else {
        return Ok(0);
    };
    let raw = raw.trim();
    raw.parse::<i32>()
        .map(|v| v as u32)
        .or_else(|_| raw.parse::<u32>())
        .map_err(|_| DirectoryError::Unavailable(format!("malformed {} value {:?}", name, raw)))
}

/// Имена атрибутов в LDAP нечувствительны к регистру
fn lowercase_keys(attrs: HashMap<String, Vec<String>>) -> HashMap<String, Vec<String>> {
    attrs.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect()
}

fn first_value<'a>(attrs: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
    attrs
        .get(&name.to_ascii_lowercase())
        .and_then(|values| values.first())
        .map(String::as_str)
}

/// Отсутствующий атрибут читается как 0
fn parse_attr<T>(attrs: &HashMap<String, Vec<String>>, name: &str) -> Result<T, DirectoryError>
where
    T: std::str::FromStr + Default,
{
    match first_value(attrs, name) {
        None => Ok(T::default()),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            DirectoryError::Unavailable(format!("malformed {} value {:?}", name, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        lowercase_keys(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
                .collect(),
        )
    }

    fn attrs_missing() -> HashMap<String, Vec<String>> {
        attrs(&[("sAMAccountName", "jdoe")])
    }

    #[test]
    fn missing_attribute_reads_as_zero() {
        let attrs = attrs(&[("sAMAccountName", "jdoe")]);
        assert_eq!(parse_attr::<u32>(&attrs, "badPwdCount").unwrap(), 0);
    }

    #[test]
    fn attribute_names_are_case_insensitive() {
        let attrs = attrs(&[("BADPWDCOUNT", "3")]);
        assert_eq!(parse_attr::<u32>(&attrs, "badPwdCount").unwrap(), 3);
    }

    #[test]
    fn negative_account_control_keeps_high_bit() {
        let attrs = attrs(&[("userAccountControl", "-2147483136")]);
        assert_eq!(parse_account_control(&attrs, "userAccountControl").unwrap(), 0x8000_0200);
    }

    #[test]
    fn unsigned_account_control_is_accepted() {
        let attrs = attrs(&[("userAccountControl", "4294967295")]);
        assert_eq!(parse_account_control(&attrs, "userAccountControl").unwrap(), u32::MAX);

        let attrs = attrs_missing();
        assert_eq!(parse_account_control(&attrs, "userAccountControl").unwrap(), 0);
    }

    #[test]
    fn account_control_beyond_32_bits_is_rejected() {
        // 2^32 + 2 не должно превратиться в «отключена»
        let attrs = attrs(&[("userAccountControl", "4294967298")]);
        let err = parse_account_control(&attrs, "userAccountControl").unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
    }

    #[test]
    fn service_identity_is_restored_after_user_bind() {
        let config = DirectoryConfig {
            bind_dn: Some("CN=svc,DC=corp,DC=acme,DC=com".to_string()),
            bind_password: Some("svc-secret".to_string()),
            ..DirectoryConfig::default()
        };
        assert_eq!(
            identity_after_bind(&config, true),
            Some(("CN=svc,DC=corp,DC=acme,DC=com", "svc-secret"))
        );
        assert_eq!(
            identity_after_bind(&config, false),
            Some(("CN=svc,DC=corp,DC=acme,DC=com", "svc-secret"))
        );
    }

    #[test]
    fn anonymous_connection_rebinds_only_after_successful_user_bind() {
        let config = DirectoryConfig::default();
        assert_eq!(identity_after_bind(&config, true), Some(("", "")));
        assert_eq!(identity_after_bind(&config, false), None);
    }

    #[test]
    fn malformed_value_is_unavailable() {
        let attrs = attrs(&[("badPwdCount", "lots")]);
        let err = parse_attr::<u32>(&attrs, "badPwdCount").unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
    }
}
