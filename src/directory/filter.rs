// src/directory/filter.rs

use std::fmt;
use thiserror::Error;

/// LDAP-фильтр (RFC 4515), подмножество, нужное для поиска учётных записей
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Equality(String, String),
    Present(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LdapFilterError {
    #[error("invalid filter syntax")]
    InvalidSyntax,
    #[error("invalid escape sequence in filter value")]
    InvalidEscape,
}

impl Filter {
    /// Фильтр равенства, например `(sAMAccountName=jdoe)`
    pub fn equality(attr: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equality(attr.into(), value.into())
    }

    /// Разбирает фильтр из строки (например, "(sAMAccountName=jdoe)")
    pub fn parse(s: &str) -> Result<Self, LdapFilterError> {
        let s = s.trim();
        if !s.starts_with('(') || !s.ends_with(')') {
            return Err(LdapFilterError::InvalidSyntax);
        }

        let inner = &s[1..s.len() - 1];
        if inner.is_empty() {
            return Err(LdapFilterError::InvalidSyntax);
        }

        Self::parse_inner(inner)
    }

    fn parse_inner(s: &str) -> Result<Self, LdapFilterError> {
        match s.chars().next() {
            Some('&') => Ok(Filter::And(Self::parse_list(&s[1..])?)),
            Some('|') => Ok(Filter::Or(Self::parse_list(&s[1..])?)),
            Some('!') => Ok(Filter::Not(Box::new(Filter::parse(&s[1..])?))),
            _ => {
                let (attr, value) = s.split_once('=').ok_or(LdapFilterError::InvalidSyntax)?;
                if attr.is_empty() {
                    return Err(LdapFilterError::InvalidSyntax);
                }
                if value == "*" {
                    Ok(Filter::Present(attr.to_string()))
                } else {
                    Ok(Filter::Equality(attr.to_string(), unescape(value)?))
                }
            }
        }
    }

    fn parse_list(s: &str) -> Result<Vec<Filter>, LdapFilterError> {
        let mut filters = Vec::new();
        let mut depth = 0i32;
        let mut start = 0;

        for (i, ch) in s.char_indices() {
            match ch {
                '(' => {
                    if depth == 0 {
                        start = i;
                    }
                    depth += 1;
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        filters.push(Filter::parse(&s[start..=i])?);
                    } else if depth < 0 {
                        return Err(LdapFilterError::InvalidSyntax);
                    }
                }
                _ if depth == 0 => return Err(LdapFilterError::InvalidSyntax),
                _ => {}
            }
        }

        if depth != 0 || filters.is_empty() {
            return Err(LdapFilterError::InvalidSyntax);
        }

        Ok(filters)
    }

    /// Проверяет, соответствует ли учётная запись фильтру.
    /// Известен только атрибут имени; прочие атрибуты не совпадают.
    pub fn matches_account(&self, naming_attribute: &str, username: &str) -> bool {
        match self {
            Filter::Equality(attr, value) => {
                attr.eq_ignore_ascii_case(naming_attribute) && value.eq_ignore_ascii_case(username)
            }
            Filter::Present(attr) => {
                attr.eq_ignore_ascii_case("objectClass")
                    || (attr.eq_ignore_ascii_case(naming_attribute) && !username.is_empty())
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches_account(naming_attribute, username)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches_account(naming_attribute, username)),
            Filter::Not(filter) => !filter.matches_account(naming_attribute, username),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Equality(attr, value) => write!(f, "({}={})", attr, ldap3::ldap_escape(value.as_str())),
            Filter::Present(attr) => write!(f, "({}=*)", attr),
            Filter::And(filters) => {
                write!(f, "(&")?;
                for item in filters {
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Filter::Or(filters) => {
                write!(f, "(|")?;
                for item in filters {
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Filter::Not(filter) => write!(f, "(!{})", filter),
        }
    }
}

/// Раскрывает `\XX` в значении фильтра
fn unescape(value: &str) -> Result<String, LdapFilterError> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let hex = value.get(i + 1..i + 3).ok_or(LdapFilterError::InvalidEscape)?;
                let byte = u8::from_str_radix(hex, 16).map_err(|_| LdapFilterError::InvalidEscape)?;
                out.push(byte);
                i += 3;
            }
            b'(' | b')' | b'*' => return Err(LdapFilterError::InvalidSyntax),
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| LdapFilterError::InvalidEscape)
}
