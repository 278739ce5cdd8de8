//! sector — секторный фреймер и CRC32 сектора.
//!
//! Каждый сектор (4096 байт) резервирует хвостовые 4 байта под CRC32
//! (ISO 3309, LE) области данных. Фреймер выдаёт позиции под записи так,
//! чтобы запись никогда не пересекала границу данных сектора: не влезло --
//! переносим на начало данных следующего сектора; следующего нет -- OUT_OF_SPACE.
//!
//! После успешного claim фреймер помнит сектор последней выдачи:
//! sector_start()/checksum_offset() нужны движку, чтобы пересчитать CRC
//! именно того сектора, который он только что мутировал.

use crate::consts::{
    next_sector_start, sector_start_of, CHECKSUM_SIZE, OUT_OF_SPACE, SECTOR_DATA_LENGTH,
};

/// Аллокатор позиций внутри секторной разметки.
#[derive(Debug)]
pub struct SectorFramer {
    capacity: usize,
    sector_start: usize,
    checksum_offset: usize,
}

impl SectorFramer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sector_start: 0,
            checksum_offset: SECTOR_DATA_LENGTH,
        }
    }

    /// Выдать диапазон длины `length`, начиная с `position` либо с начала
    /// следующего сектора. Возвращает позицию начала диапазона или
    /// OUT_OF_SPACE, если запись не помещается до конца файла.
    pub fn claim(&mut self, position: i32, length: usize) -> i32 {
        debug_assert!(position >= 0, "claim with negative position");
        let position = position as usize;

        let next_sector = next_sector_start(position);
        let claimed = if position + length > next_sector - CHECKSUM_SIZE {
            // Запись зацепила бы слот чексуммы: переносим целиком.
            next_sector
        } else {
            position
        };

        self.sector_start = sector_start_of(claimed);
        self.checksum_offset = self.sector_start + SECTOR_DATA_LENGTH;

        let end = claimed + length;
        if end > self.checksum_offset || end > self.capacity {
            return OUT_OF_SPACE;
        }
        claimed as i32
    }

    /// Начало сектора последней успешной выдачи.
    #[inline]
    pub fn sector_start(&self) -> usize {
        self.sector_start
    }

    /// Смещение слота CRC сектора последней успешной выдачи.
    #[inline]
    pub fn checksum_offset(&self) -> usize {
        self.checksum_offset
    }
}

// ---------------- CRC helpers ----------------

/// CRC32 (ISO 3309, полином 0xEDB88320) области данных сектора.
#[inline]
pub fn sector_crc(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
