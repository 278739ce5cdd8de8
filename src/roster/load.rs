//! roster/load — восстановление каталога из mmap-окна.
//!
//! Алгоритм:
//! 1. Header: нулевой — записываем константы схемы кодека, считаем CRC
//!    первого сектора и форсим; не совпавший с кодеком — репортим и едем
//!    дальше (best-effort).
//! 2. Идём по записям с HEADER_SIZE. При входе в новый сектор сверяем его
//!    CRC со слотом; несовпадение репортится, но загрузку не прерывает
//!    (файл считается частично восстановимым), кроме режима strict_load.
//! 3. session_id == 0: заглядываем в начало следующего сектора. Там тоже
//!    ноль — хвост файла, стоп. Иначе это zero-padding хвоста сектора,
//!    прыгаем на начало следующего и продолжаем.
//! 4. Не разобравшийся хвост записи (ключ/var-поле) — стоп на этой записи;
//!    более ранние секторы остаются валидными, дозапись пойдёт поверх.
//!
//! После загрузки counter = max(session_id) + 1, file_position — точка
//! дозаписи.

use anyhow::Result;

use crate::consts::{
    next_sector_start, CHECKSUM_SIZE, FIRST_CHECKSUM_LOCATION, HEADER_SIZE, SECTOR_SIZE,
};
use crate::errors::RosterError;
use crate::metrics::{record_sector_crc_mismatch, record_session_loaded};
use crate::sector::sector_crc;
use crate::session::SessionContext;

use super::core::Roster;

impl Roster {
    /// Восстановить in-memory индексы из файла. Вызывается один раз из open().
    pub(crate) fn load(&mut self) -> Result<()> {
        self.initialise_header()?;

        let header = self.codec.read_file_header(self.region.bytes());
        // acting-параметры берём из header'а файла: записи могли быть
        // написаны более старой схемой с другим block_length
        let acting_block_length = if header.block_length != 0 {
            header.block_length
        } else {
            self.codec.block_length()
        };
        let acting_version = header.schema_version;

        let capacity = self.region.capacity();
        // saturating: мусорный block_length из битого header'а не должен ронять скан
        let last_record_start = capacity.saturating_sub(acting_block_length as usize);

        let mut sector_end = 0usize;
        let mut position = HEADER_SIZE;

        while position < last_record_start {
            let (end, crc_ok) = self.validate_sector_checksum(position, sector_end);
            sector_end = end;
            if !crc_ok && self.strict_load {
                log::warn!(
                    "strict load: stopping at corrupt sector ending {}; later records are dropped",
                    sector_end
                );
                break;
            }

            let (mut record, mut limit) = match self.codec.decode_at(
                self.region.bytes(),
                position,
                acting_block_length,
                acting_version,
            ) {
                Ok(decoded) => decoded,
                Err(err) => {
                    self.report(RosterError::MalformedRecord {
                        position,
                        detail: format!("{err:#}"),
                    });
                    break;
                }
            };

            let mut record_position = position;
            if record.session_id == 0 {
                // хвост сектора добит нулями либо это конец данных
                let peek = sector_end;
                if peek > last_record_start {
                    break;
                }
                let (peeked, peeked_limit) = match self.codec.decode_at(
                    self.region.bytes(),
                    peek,
                    acting_block_length,
                    acting_version,
                ) {
                    Ok(decoded) => decoded,
                    Err(err) => {
                        self.report(RosterError::MalformedRecord {
                            position: peek,
                            detail: format!("{err:#}"),
                        });
                        break;
                    }
                };
                if peeked.session_id == 0 {
                    break;
                }
                record_position = peek;
                record = peeked;
                limit = peeked_limit;
            }

            let key_length = record.composite_key_length as usize;
            let Some(composite_key) = self.strategy.load(self.region.bytes(), limit, key_length)
            else {
                self.report(RosterError::MalformedRecord {
                    position: record_position,
                    detail: format!("composite key blob of {} bytes did not parse", key_length),
                });
                // дозапись пойдёт поверх отброшенной записи
                position = record_position;
                break;
            };

            let context = SessionContext {
                composite_key,
                session_id: record.session_id,
                sequence_index: record.sequence_index,
                last_logon_time: record.logon_time,
                last_sequence_reset_time: record.last_sequence_reset_time,
                file_position: record_position as i32,
                dictionary: crate::identity::Dictionary::named(record.dictionary_name),
            };
            self.counter = self.counter.max(record.session_id + 1);
            self.index(context);
            record_session_loaded();

            position = limit + key_length;
        }

        self.file_position = position as i32;
        Ok(())
    }

    /// Нулевой header — записать константы схемы, CRC первого сектора, force.
    /// Ненулевой, но чужой — репорт в sink, загрузка продолжается.
    pub(crate) fn initialise_header(&mut self) -> Result<()> {
        let header = self.codec.read_file_header(self.region.bytes());
        if header.is_zero() {
            self.codec.write_file_header(self.region.bytes_mut());
            self.update_checksum(0, FIRST_CHECKSUM_LOCATION);
            self.region.force()?;
            return Ok(());
        }

        if header.schema_id != self.codec.schema_id()
            || header.template_id != self.codec.template_id()
        {
            self.report(RosterError::MalformedRecord {
                position: 0,
                detail: format!(
                    "file header schema {}/{} does not match codec {}/{}",
                    header.schema_id,
                    header.template_id,
                    self.codec.schema_id(),
                    self.codec.template_id()
                ),
            });
        }
        Ok(())
    }

    /// Пересчитать CRC сектора [start..checksum_offset) и записать в слот.
    pub(crate) fn update_checksum(&mut self, start: usize, checksum_offset: usize) {
        let crc = sector_crc(&self.region.bytes()[start..checksum_offset]);
        self.region.put_u32(checksum_offset, crc);
    }

    /// При входе позиции в новый сектор сверить его CRC.
    /// Возвращает (конец текущего сектора, сошёлся ли CRC).
    fn validate_sector_checksum(&mut self, position: usize, sector_end: usize) -> (usize, bool) {
        if position <= sector_end {
            return (sector_end, true);
        }
        debug_assert_eq!(next_sector_start(position), sector_end + SECTOR_SIZE);

        let next_end = sector_end + SECTOR_SIZE;
        let checksum_at = next_end - CHECKSUM_SIZE;
        let calculated = sector_crc(&self.region.bytes()[sector_end..checksum_at]);
        let stored = self.region.get_u32(checksum_at);
        if stored != calculated {
            record_sector_crc_mismatch();
            self.report(RosterError::CorruptSector {
                sector_start: sector_end,
                sector_end: next_end,
                stored,
                calculated,
            });
            return (next_end, false);
        }
        (next_end, true)
    }

    #[inline]
    pub(crate) fn report(&self, err: RosterError) {
        self.errors.on_error(err);
    }
}
