// src/diagnosis/flags.rs

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// ========================================
// 🛡️ UacFlags — известные биты userAccountControl
// ========================================

bitflags! {
    /// Флаги userAccountControl (MS-ADTS 2.2.16)
    #[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct UacFlags: u32 {
        const SCRIPT                 = 0x0000_0001;
        const ACCOUNTDISABLE         = 0x0000_0002;
        const HOMEDIR_REQUIRED       = 0x0000_0008;
        const LOCKOUT                = 0x0000_0010;
        const PASSWD_NOTREQD         = 0x0000_0020;
        const PASSWD_CANT_CHANGE     = 0x0000_0040;
        const NORMAL_ACCOUNT         = 0x0000_0200;
        const DONT_EXPIRE_PASSWORD   = 0x0001_0000;
        const SMARTCARD_REQUIRED     = 0x0004_0000;
        const PASSWORD_EXPIRED       = 0x0080_0000;
    }
}

/// Индекс бита «учётная запись отключена»
pub const ACCOUNT_DISABLED: u32 = 1;
/// Индекс бита «срок действия пароля не ограничен»
pub const PASSWORD_NEVER_EXPIRES: u32 = 16;

/// Декодированное значение userAccountControl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountControl(u32);

impl AccountControl {
    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Установлен ли бит с номером `bit_index` (0 — младший).
    /// Индексы за пределами разрядности всегда дают `false`.
    pub fn is_property_active(&self, bit_index: u32) -> bool {
        self.0.checked_shr(bit_index).is_some_and(|v| v & 1 == 1)
    }

    /// Известные флаги; неизвестные биты отбрасываются
    pub fn known_flags(&self) -> UacFlags {
        UacFlags::from_bits_truncate(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_has_no_active_bits() {
        let control = AccountControl::new(0);
        for i in 0..64 {
            assert!(!control.is_property_active(i));
        }
        assert!(!control.is_property_active(u32::MAX));
    }

    #[test]
    fn disabled_bit() {
        assert!(AccountControl::new(2).is_property_active(ACCOUNT_DISABLED));
        assert!(!AccountControl::new(0).is_property_active(ACCOUNT_DISABLED));
        assert!(AccountControl::new(66).is_property_active(ACCOUNT_DISABLED));
        assert!(!AccountControl::new(512).is_property_active(ACCOUNT_DISABLED));
    }

    #[test]
    fn never_expires_bit() {
        assert!(AccountControl::new(65536).is_property_active(PASSWORD_NEVER_EXPIRES));
        assert!(AccountControl::new(66048).is_property_active(PASSWORD_NEVER_EXPIRES));
        assert!(!AccountControl::new(512).is_property_active(PASSWORD_NEVER_EXPIRES));
    }

    #[test]
    fn high_bit_is_addressable() {
        let control = AccountControl::new(0x8000_0000);
        assert!(control.is_property_active(31));
        assert!(!control.is_property_active(32));
    }

    #[test]
    fn known_flags_match_bit_indices() {
        let control = AccountControl::new(514);
        assert_eq!(control.known_flags(), UacFlags::NORMAL_ACCOUNT | UacFlags::ACCOUNTDISABLE);
        assert_eq!(UacFlags::ACCOUNTDISABLE.bits(), 1 << ACCOUNT_DISABLED);
        assert_eq!(UacFlags::DONT_EXPIRE_PASSWORD.bits(), 1 << PASSWORD_NEVER_EXPIRES);
    }
}
