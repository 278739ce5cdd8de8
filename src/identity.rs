//! identity — составной ключ сессии и внедряемая стратегия его сериализации.
//!
//! CompositeKey — логическое имя контрагента (comp id'ы инициатора и
//! акцептора). Движок трактует сериализованный ключ как opaque blob;
//! формат задаёт SessionIdStrategy.
//!
//! SenderTargetStrategy (LE):
//! [sender_len u16][sender ASCII][target_len u16][target ASCII]
//!
//! load обязан быть терпимым к мусорному хвосту: любой не разобравшийся
//! blob — это None, не panic и не ошибка.

use crate::consts::INSUFFICIENT_SPACE;
use byteorder::{ByteOrder, LittleEndian};

/// Составной ключ: пара comp id'ов, уникально именующая сессию контрагента.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    sender_comp_id: String,
    target_comp_id: String,
}

impl CompositeKey {
    pub fn new<S: Into<String>, T: Into<String>>(sender: S, target: T) -> Self {
        Self {
            sender_comp_id: sender.into(),
            target_comp_id: target.into(),
        }
    }

    #[inline]
    pub fn sender_comp_id(&self) -> &str {
        &self.sender_comp_id
    }

    #[inline]
    pub fn target_comp_id(&self) -> &str {
        &self.target_comp_id
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.sender_comp_id, self.target_comp_id)
    }
}

/// Opaque-тег протокольного варианта, использованного при последнем logon'е.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    name: String,
}

impl Dictionary {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Внедряемая сериализация составного ключа.
pub trait SessionIdStrategy: Send {
    /// Сериализовать ключ в `buf` начиная с `offset`. Возвращает длину blob'а
    /// или INSUFFICIENT_SPACE, если не влезло.
    fn save(&self, key: &CompositeKey, buf: &mut [u8], offset: usize) -> i32;

    /// Разобрать blob длины `length` по `offset`. None — хвост не разобрался
    /// (обрезанная или мусорная запись).
    fn load(&self, buf: &[u8], offset: usize, length: usize) -> Option<CompositeKey>;
}

/// Дефолтная стратегия: length-prefixed ASCII пары sender/target.
#[derive(Debug, Default)]
pub struct SenderTargetStrategy;

impl SessionIdStrategy for SenderTargetStrategy {
    fn save(&self, key: &CompositeKey, buf: &mut [u8], offset: usize) -> i32 {
        let sender = key.sender_comp_id.as_bytes();
        let target = key.target_comp_id.as_bytes();
        if sender.len() > u16::MAX as usize || target.len() > u16::MAX as usize {
            return INSUFFICIENT_SPACE;
        }
        let total = 2 + sender.len() + 2 + target.len();
        if offset + total > buf.len() {
            return INSUFFICIENT_SPACE;
        }

        let mut pos = offset;
        LittleEndian::write_u16(&mut buf[pos..], sender.len() as u16);
        pos += 2;
        buf[pos..pos + sender.len()].copy_from_slice(sender);
        pos += sender.len();
        LittleEndian::write_u16(&mut buf[pos..], target.len() as u16);
        pos += 2;
        buf[pos..pos + target.len()].copy_from_slice(target);

        total as i32
    }

    fn load(&self, buf: &[u8], offset: usize, length: usize) -> Option<CompositeKey> {
        if offset + length > buf.len() || length < 4 {
            return None;
        }
        let blob = &buf[offset..offset + length];

        let sender_len = LittleEndian::read_u16(&blob[0..2]) as usize;
        if 2 + sender_len + 2 > blob.len() {
            return None;
        }
        let sender = &blob[2..2 + sender_len];

        let target_off = 2 + sender_len;
        let target_len = LittleEndian::read_u16(&blob[target_off..target_off + 2]) as usize;
        // длины обязаны покрывать blob целиком, иначе хвост мусорный
        if target_off + 2 + target_len != blob.len() {
            return None;
        }
        let target = &blob[target_off + 2..];

        let sender = std::str::from_utf8(sender).ok()?;
        let target = std::str::from_utf8(target).ok()?;
        if !sender.is_ascii() || !target.is_ascii() {
            return None;
        }

        Some(CompositeKey::new(sender, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_roundtrip() {
        let s = SenderTargetStrategy;
        let key = CompositeKey::new("INITIATOR", "ACCEPTOR");
        let mut buf = vec![0u8; 64];
        let len = s.save(&key, &mut buf, 4);
        assert!(len > 0);
        let got = s.load(&buf, 4, len as usize).expect("must parse");
        assert_eq!(got, key);
    }

    #[test]
    fn save_reports_insufficient_space() {
        let s = SenderTargetStrategy;
        let key = CompositeKey::new("INITIATOR", "ACCEPTOR");
        let mut buf = vec![0u8; 8];
        assert_eq!(s.save(&key, &mut buf, 0), INSUFFICIENT_SPACE);
    }

    #[test]
    fn load_rejects_malformed_tails() {
        let s = SenderTargetStrategy;
        let key = CompositeKey::new("A", "B");
        let mut buf = vec![0u8; 32];
        let len = s.save(&key, &mut buf, 0) as usize;

        // обрезанный blob
        assert!(s.load(&buf, 0, len - 1).is_none());
        // длина больше фактической
        assert!(s.load(&buf, 0, len + 1).is_none());
        // мусор в length-prefix
        buf[0] = 0xFF;
        buf[1] = 0xFF;
        assert!(s.load(&buf, 0, len).is_none());
    }

    #[test]
    fn keys_hash_and_compare_by_value() {
        use std::collections::HashMap;
        let mut m = HashMap::new();
        m.insert(CompositeKey::new("A", "B"), 1u64);
        assert_eq!(m.get(&CompositeKey::new("A", "B")), Some(&1));
        assert_eq!(m.get(&CompositeKey::new("B", "A")), None);
    }
}
