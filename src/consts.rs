//! Общие константы формата session-store (сектора, заголовок, записи).
//!
//! Файл (LE):
//! [file header 8 байт] [записи ...] ... [CRC32 u32 в конце каждого сектора]
//!
//! File header (владелец раскладки — record codec):
//! [block_length u16][template_id u16][schema_id u16][schema_version u16]
//!
//! Сектор: 4096 байт, последние 4 байта — CRC32 (ISO 3309, LE) по данным
//! сектора [k*S .. (k+1)*S-4). Запись не пересекает границу сектора.

// -------- Sectors --------

pub const SECTOR_SIZE: usize = 4096;
pub const CHECKSUM_SIZE: usize = 4;
pub const SECTOR_DATA_LENGTH: usize = SECTOR_SIZE - CHECKSUM_SIZE;
pub const FIRST_CHECKSUM_LOCATION: usize = SECTOR_DATA_LENGTH;

/// Позиция "места нет": запись не попала на диск, контекст живёт только в памяти.
pub const OUT_OF_SPACE: i32 = -1;

// -------- File header --------

pub const HEADER_SIZE: usize = 8;

pub const HDR_OFF_BLOCK_LENGTH: usize = 0;
pub const HDR_OFF_TEMPLATE_ID: usize = 2;
pub const HDR_OFF_SCHEMA_ID: usize = 4;
pub const HDR_OFF_SCHEMA_VERSION: usize = 6;

// -------- Session record (fixed prefix) --------
//
// Layout:
// [session_id u64]                  -- 0 означает пустой слот
// [sequence_index i32]
// [logon_time i64]                  -- ms since epoch
// [last_sequence_reset_time i64]    -- ms since epoch
// [composite_key_length u16]
// затем var-часть: [dict_name_len u16][dict_name ASCII][composite key blob]

pub const REC_OFF_SESSION_ID: usize = 0;
pub const REC_OFF_SEQUENCE_INDEX: usize = 8;
pub const REC_OFF_LOGON_TIME: usize = 12;
pub const REC_OFF_LAST_RESET_TIME: usize = 20;
pub const REC_OFF_KEY_LENGTH: usize = 28;

pub const BLOCK_LENGTH: u16 = 30;
pub const SCHEMA_ID: u16 = 666;
pub const TEMPLATE_ID: u16 = 4;
pub const SCHEMA_VERSION: u16 = 1;

// -------- Sentinels (контракт со слоем сессий) --------

/// Поколение sequence-счётчика ещё не известно (свежая запись).
pub const UNKNOWN_SEQUENCE_INDEX: i32 = -1;

/// Время не известно; отличимо от любого реального wall-clock значения.
pub const UNKNOWN_TIME: i64 = i64::MIN;

pub const LOWEST_VALID_SESSION_ID: u64 = 1;

/// Identity strategy: ключ не поместился в scratch-буфер.
pub const INSUFFICIENT_SPACE: i32 = -2;

/// Начало сектора, в котором лежит позиция `pos`.
#[inline]
pub fn sector_start_of(pos: usize) -> usize {
    (pos / SECTOR_SIZE) * SECTOR_SIZE
}

/// Начало сектора, следующего за тем, что содержит `pos`.
#[inline]
pub fn next_sector_start(pos: usize) -> usize {
    sector_start_of(pos) + SECTOR_SIZE
}
