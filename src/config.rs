//! Centralized configuration and builder for the session store.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - RosterConfig::from_env() reads the same env vars the ops runbook names.
//! - Builder methods return the config by value; Roster::open consumes it.
//!
//! Env vars:
//! - RDB_FORCE = 0|false|off|no — пропускать msync после мутаций
//!   (бенчи/разработка; durability выключена осознанно).
//! - RDB_LOAD_STRICT = 1|true|yes|on — останавливать восстановление на
//!   первом секторе с несошедшимся CRC (по умолчанию: репортим и едем дальше).

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::consts::SECTOR_SIZE;

/// Дефолтная ёмкость стора: 4 MiB — хватает на десятки тысяч записей.
pub const DEFAULT_CAPACITY: usize = 4 * 1024 * 1024;

/// Дефолтное начальное поколение sequence-счётчика.
pub const DEFAULT_INITIAL_SEQUENCE_INDEX: i32 = 0;

#[derive(Debug, Clone)]
pub struct RosterConfig {
    /// Путь к файлу session-store.
    pub path: PathBuf,

    /// Ёмкость mmap-окна в байтах; кратна SECTOR_SIZE.
    pub capacity: usize,

    /// Начальный sequence_index, который слой сессий применяет при первом
    /// logon'е идентичности (сам стор хранит UNKNOWN до первого апдейта).
    pub initial_sequence_index: i32,

    /// Выполнять ли msync после каждой мутации записи.
    /// Env: RDB_FORCE (default true; "0|false|off|no" => false)
    pub force_writes: bool,

    /// Останавливать ли загрузку на первом секторе с плохим CRC.
    /// Env: RDB_LOAD_STRICT (default false)
    pub strict_load: bool,
}

impl RosterConfig {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            capacity: DEFAULT_CAPACITY,
            initial_sequence_index: DEFAULT_INITIAL_SEQUENCE_INDEX,
            force_writes: true,
            strict_load: false,
        }
    }

    /// Load env overrides on top of the given path (keeps builder defaults
    /// for everything not set in the environment).
    pub fn from_env<P: Into<PathBuf>>(path: P) -> Self {
        let mut cfg = Self::new(path);

        if let Ok(v) = std::env::var("RDB_FORCE") {
            let s = v.trim().to_ascii_lowercase();
            if s == "0" || s == "false" || s == "off" || s == "no" {
                cfg.force_writes = false;
            }
        }
        if let Ok(v) = std::env::var("RDB_LOAD_STRICT") {
            let s = v.trim().to_ascii_lowercase();
            if s == "1" || s == "true" || s == "yes" || s == "on" {
                cfg.strict_load = true;
            }
        }

        cfg
    }

    // ---------------- builder ----------------

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn initial_sequence_index(mut self, index: i32) -> Self {
        self.initial_sequence_index = index;
        self
    }

    pub fn force_writes(mut self, on: bool) -> Self {
        self.force_writes = on;
        self
    }

    pub fn strict_load(mut self, on: bool) -> Self {
        self.strict_load = on;
        self
    }

    /// Проверка геометрии: ёмкость — положительное число целых секторов.
    pub fn validate(&self) -> Result<()> {
        if self.capacity < SECTOR_SIZE || self.capacity % SECTOR_SIZE != 0 {
            return Err(anyhow!(
                "capacity must be a positive multiple of {}, got {}",
                SECTOR_SIZE,
                self.capacity
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn store_path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = RosterConfig::new("/tmp/sessions.ros");
        assert_eq!(cfg.capacity, DEFAULT_CAPACITY);
        assert!(cfg.force_writes);
        assert!(!cfg.strict_load);
        cfg.validate().unwrap();
    }

    #[test]
    fn builder_chains() {
        let cfg = RosterConfig::new("/tmp/s.ros")
            .capacity(8 * SECTOR_SIZE)
            .initial_sequence_index(5)
            .force_writes(false)
            .strict_load(true);
        assert_eq!(cfg.capacity, 8 * SECTOR_SIZE);
        assert_eq!(cfg.initial_sequence_index, 5);
        assert!(!cfg.force_writes);
        assert!(cfg.strict_load);
    }

    #[test]
    fn validate_rejects_unaligned_capacity() {
        assert!(RosterConfig::new("/tmp/s.ros").capacity(4000).validate().is_err());
        assert!(RosterConfig::new("/tmp/s.ros").capacity(0).validate().is_err());
        assert!(RosterConfig::new("/tmp/s.ros")
            .capacity(SECTOR_SIZE)
            .validate()
            .is_ok());
    }
}
