//! roster/ops — мутации и запросы каталога.
//!
//! Все мутации — поток-владелец. Дисциплина записи одной записи:
//! encode → CRC сектора → force, в этом порядке. Нехватка места не фатальна:
//! контекст продолжает жить in-memory с file_position = OUT_OF_SPACE и будет
//! перезаписан после reset/расширения файла.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::codec::SessionRecord;
use crate::consts::{
    next_sector_start, HEADER_SIZE, INSUFFICIENT_SPACE, LOWEST_VALID_SESSION_ID, OUT_OF_SPACE,
    SECTOR_DATA_LENGTH, SECTOR_SIZE, UNKNOWN_SEQUENCE_INDEX, UNKNOWN_TIME,
};
use crate::errors::RosterError;
use crate::identity::{CompositeKey, Dictionary};
use crate::metrics::{
    record_backup, record_disconnect, record_logon_duplicate, record_logon_granted,
    record_out_of_space, record_record_appended, record_record_patched, record_reset,
};
use crate::sector::SectorFramer;
use crate::session::{LogonOutcome, SessionContext, SessionInfo};

use super::core::Roster;

impl Roster {
    // ---------------- logon path ----------------

    /// Logon идентичности: найти или создать контекст и занять его место в
    /// множестве аутентифицированных. Уже занято — Duplicate; никакой другой
    /// дедупликации конкурентных logon'ов движок не делает.
    pub fn on_logon(&mut self, key: CompositeKey, dictionary: Dictionary) -> LogonOutcome {
        let context = self.new_session_context(key, dictionary);
        if !self.authenticated.add(context.session_id) {
            record_logon_duplicate();
            return LogonOutcome::Duplicate;
        }
        record_logon_granted();
        LogonOutcome::Granted(context)
    }

    /// Найти контекст по ключу либо назначить свежий session_id и
    /// персистнуть новую запись. Известный ключ возвращается как есть:
    /// идентичность постоянна.
    pub fn new_session_context(
        &mut self,
        key: CompositeKey,
        dictionary: Dictionary,
    ) -> SessionContext {
        if let Some(existing) = self.by_key.get(&key) {
            return existing.clone();
        }

        let session_id = self.counter;
        self.counter += 1;

        let context = self.assign_session_id(key, session_id, UNKNOWN_SEQUENCE_INDEX, dictionary);
        self.index(context.clone());
        self.all_sessions.push(SessionInfo::from(&context));
        context
    }

    /// Персистнуть запись для свежего session_id. Любая нехватка места
    /// репортится и даёт рабочий, но не сохранённый на диск контекст.
    fn assign_session_id(
        &mut self,
        key: CompositeKey,
        session_id: u64,
        sequence_index: i32,
        dictionary: Dictionary,
    ) -> SessionContext {
        let mut file_position = OUT_OF_SPACE;

        let key_length = self.strategy.save(&key, &mut self.key_scratch, 0);
        if key_length == INSUFFICIENT_SPACE {
            record_out_of_space();
            self.report(RosterError::OutOfSpace {
                session_id,
                detail: format!(
                    "composite key {} does not fit the {}-byte scratch buffer",
                    key,
                    self.key_scratch.len()
                ),
            });
        } else if self.file_position != OUT_OF_SPACE {
            file_position =
                self.persist_record(&key, session_id, sequence_index, &dictionary, key_length as usize);
        }

        SessionContext {
            composite_key: key,
            session_id,
            sequence_index,
            last_logon_time: UNKNOWN_TIME,
            last_sequence_reset_time: UNKNOWN_TIME,
            file_position,
            dictionary,
        }
    }

    /// Выдать место фреймером, закодировать запись + blob ключа, обновить CRC
    /// сектора и форснуть. Возвращает позицию записи или OUT_OF_SPACE.
    fn persist_record(
        &mut self,
        key: &CompositeKey,
        session_id: u64,
        sequence_index: i32,
        dictionary: &Dictionary,
        key_length: usize,
    ) -> i32 {
        let total = self.codec.record_length(dictionary.name(), key_length);
        let claimed = self.framer.claim(self.file_position, total);
        if claimed == OUT_OF_SPACE {
            // файл исчерпан; курсор защёлкивается, дальнейшие назначения
            // остаются только in-memory
            self.file_position = OUT_OF_SPACE;
            record_out_of_space();
            self.report(RosterError::OutOfSpace {
                session_id,
                detail: format!("no sector can hold {} bytes for {}", total, key),
            });
            return OUT_OF_SPACE;
        }

        let record = SessionRecord {
            session_id,
            sequence_index,
            logon_time: UNKNOWN_TIME,
            last_sequence_reset_time: UNKNOWN_TIME,
            composite_key_length: key_length as u16,
            dictionary_name: dictionary.name().to_string(),
        };
        let limit = match self
            .codec
            .encode_at(self.region.bytes_mut(), claimed as usize, &record)
        {
            Ok(limit) => limit,
            Err(err) => {
                // после успешного claim сюда попадать некуда; не двигаем курсор
                log::error!("record encode at {} failed: {:#}", claimed, err);
                return OUT_OF_SPACE;
            }
        };

        self.region.put_bytes(limit, &self.key_scratch[..key_length]);
        self.file_position = (limit + key_length) as i32;

        let (sector_start, checksum_offset) =
            (self.framer.sector_start(), self.framer.checksum_offset());
        self.update_checksum(sector_start, checksum_offset);
        if let Err(err) = self.region.force() {
            log::error!("session store force failed: {:#}", err);
        }
        record_record_appended();

        claimed
    }

    // ---------------- in-place mutation ----------------

    /// Сброс sequence-счётчика: обновить время в контексте и переписать
    /// мутабельные поля записи на месте. Неизвестные id молча игнорируются.
    pub fn sequence_reset(&mut self, session_id: u64, reset_time: i64) {
        let Some(key) = self.by_id.get(&session_id).cloned() else {
            return;
        };
        let (file_position, sequence_index, last_logon_time) = {
            let Some(context) = self.by_key.get_mut(&key) else {
                return;
            };
            context.last_sequence_reset_time = reset_time;
            (
                context.file_position,
                context.sequence_index,
                context.last_logon_time,
            )
        };
        self.update_saved_data(file_position, sequence_index, last_logon_time, reset_time);
    }

    /// Переписать три мутабельных поля записи по известному смещению,
    /// пересчитать CRC её сектора и форснуть. Идемпотентна при равных
    /// аргументах; для OUT_OF_SPACE-позиций — no-op.
    pub fn update_saved_data(
        &mut self,
        file_position: i32,
        sequence_index: i32,
        logon_time: i64,
        last_sequence_reset_time: i64,
    ) {
        if file_position < HEADER_SIZE as i32 {
            // OUT_OF_SPACE или мусор: записи на диске нет
            return;
        }
        let position = file_position as usize;

        if let Err(err) = self.codec.patch_saved_fields(
            self.region.bytes_mut(),
            position,
            sequence_index,
            logon_time,
            last_sequence_reset_time,
        ) {
            log::error!("record patch at {} failed: {:#}", position, err);
            return;
        }

        let sector_start = next_sector_start(position) - SECTOR_SIZE;
        let checksum_offset = sector_start + SECTOR_DATA_LENGTH;
        self.update_checksum(sector_start, checksum_offset);
        if let Err(err) = self.region.force() {
            log::error!("session store force failed: {:#}", err);
        }
        record_record_patched();
    }

    // ---------------- disconnect / reset ----------------

    /// Идемпотентно убрать id из множества аутентифицированных. Диск не
    /// трогается: идентичность постоянна.
    pub fn on_disconnect(&mut self, session_id: u64) {
        self.authenticated.remove(session_id);
        record_disconnect();
    }

    /// Полный сброс каталога. Отказ, пока есть аутентифицированные сессии.
    /// backup_location: снять копию файла перед обнулением.
    pub fn reset(&mut self, backup_location: Option<&Path>) -> Result<()> {
        let authenticated = self.authenticated.len();
        if authenticated != 0 {
            return Err(RosterError::ResetWithAuth {
                count: authenticated,
            }
            .into());
        }

        if let Some(dest) = backup_location {
            self.region.transfer_to(dest)?;
            record_backup();
        }

        self.counter = LOWEST_VALID_SESSION_ID;
        self.by_key.clear();
        self.by_id.clear();
        self.all_sessions.clear();

        self.region.zero_fill();
        self.file_position = HEADER_SIZE as i32;
        self.framer = SectorFramer::new(self.region.capacity());
        self.initialise_header()?;

        record_reset();
        Ok(())
    }

    // ---------------- queries ----------------

    /// session_id ключа, если идентичность уже известна.
    pub fn lookup_session_id(&self, key: &CompositeKey) -> Option<u64> {
        self.by_key.get(key).map(|ctx| ctx.session_id)
    }

    pub fn is_authenticated(&self, session_id: u64) -> bool {
        self.authenticated.contains(session_id)
    }

    pub fn is_known_session_id(&self, session_id: u64) -> bool {
        self.by_id.contains_key(&session_id)
    }

    /// Текущий контекст идентичности (копия).
    pub fn context(&self, key: &CompositeKey) -> Option<SessionContext> {
        self.by_key.get(key).cloned()
    }

    /// Иммутабельный снапшот всех известных сессий.
    pub fn all_sessions(&self) -> Arc<Vec<SessionInfo>> {
        self.all_sessions.snapshot()
    }
}
