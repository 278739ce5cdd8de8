//! Lightweight global metrics for RosterDB.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Load/recovery (sessions loaded, CRC mismatches)
//! - Logon path (granted / duplicate)
//! - Persistence (records appended / patched, forces, out-of-space)
//! - Admin (resets, backups)

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Load / recovery -----
static SESSIONS_LOADED: AtomicU64 = AtomicU64::new(0);
static SECTOR_CRC_MISMATCHES: AtomicU64 = AtomicU64::new(0);

// ----- Logon path -----
static LOGONS_GRANTED: AtomicU64 = AtomicU64::new(0);
static LOGONS_DUPLICATE: AtomicU64 = AtomicU64::new(0);
static DISCONNECTS: AtomicU64 = AtomicU64::new(0);

// ----- Persistence -----
static RECORDS_APPENDED: AtomicU64 = AtomicU64::new(0);
static RECORDS_PATCHED: AtomicU64 = AtomicU64::new(0);
static FORCES: AtomicU64 = AtomicU64::new(0);
static OUT_OF_SPACE_EVENTS: AtomicU64 = AtomicU64::new(0);

// ----- Admin -----
static RESETS: AtomicU64 = AtomicU64::new(0);
static BACKUPS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub sessions_loaded: u64,
    pub sector_crc_mismatches: u64,

    pub logons_granted: u64,
    pub logons_duplicate: u64,
    pub disconnects: u64,

    pub records_appended: u64,
    pub records_patched: u64,
    pub forces: u64,
    pub out_of_space_events: u64,

    pub resets: u64,
    pub backups: u64,
}

impl MetricsSnapshot {
    /// Доля отклонённых logon'ов (duplicate) среди всех попыток.
    pub fn duplicate_logon_ratio(&self) -> f64 {
        let total = self.logons_granted + self.logons_duplicate;
        if total == 0 {
            0.0
        } else {
            self.logons_duplicate as f64 / total as f64
        }
    }
}

// ----- Recorders -----

pub fn record_session_loaded() {
    SESSIONS_LOADED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sector_crc_mismatch() {
    SECTOR_CRC_MISMATCHES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_logon_granted() {
    LOGONS_GRANTED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_logon_duplicate() {
    LOGONS_DUPLICATE.fetch_add(1, Ordering::Relaxed);
}

pub fn record_disconnect() {
    DISCONNECTS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_record_appended() {
    RECORDS_APPENDED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_record_patched() {
    RECORDS_PATCHED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_force() {
    FORCES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_out_of_space() {
    OUT_OF_SPACE_EVENTS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_reset() {
    RESETS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_backup() {
    BACKUPS.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        sessions_loaded: SESSIONS_LOADED.load(Ordering::Relaxed),
        sector_crc_mismatches: SECTOR_CRC_MISMATCHES.load(Ordering::Relaxed),

        logons_granted: LOGONS_GRANTED.load(Ordering::Relaxed),
        logons_duplicate: LOGONS_DUPLICATE.load(Ordering::Relaxed),
        disconnects: DISCONNECTS.load(Ordering::Relaxed),

        records_appended: RECORDS_APPENDED.load(Ordering::Relaxed),
        records_patched: RECORDS_PATCHED.load(Ordering::Relaxed),
        forces: FORCES.load(Ordering::Relaxed),
        out_of_space_events: OUT_OF_SPACE_EVENTS.load(Ordering::Relaxed),

        resets: RESETS.load(Ordering::Relaxed),
        backups: BACKUPS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    SESSIONS_LOADED.store(0, Ordering::Relaxed);
    SECTOR_CRC_MISMATCHES.store(0, Ordering::Relaxed);

    LOGONS_GRANTED.store(0, Ordering::Relaxed);
    LOGONS_DUPLICATE.store(0, Ordering::Relaxed);
    DISCONNECTS.store(0, Ordering::Relaxed);

    RECORDS_APPENDED.store(0, Ordering::Relaxed);
    RECORDS_PATCHED.store(0, Ordering::Relaxed);
    FORCES.store(0, Ordering::Relaxed);
    OUT_OF_SPACE_EVENTS.store(0, Ordering::Relaxed);

    RESETS.store(0, Ordering::Relaxed);
    BACKUPS.store(0, Ordering::Relaxed);
}
