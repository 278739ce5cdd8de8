//! Error taxonomy and the injected error sink.
//!
//! Политика (как в оригинальном gateway): почти ничего не фатально. Ошибки
//! восстановления и нехватки места репортятся в sink, движок продолжает
//! работать in-memory. Фатальны только невозможность открыть/замапить файл
//! и `reset()` при живых аутентифицированных сессиях.

use std::sync::Mutex;

use thiserror::Error;

/// Классифицируемые состояния, которые движок репортит или возвращает.
#[derive(Debug, Error)]
pub enum RosterError {
    /// CRC сектора не сошёлся при загрузке. Загрузка продолжается
    /// (best-effort), если не включён strict_load.
    #[error(
        "corrupt sector [{sector_start}..{sector_end}): stored crc {stored:#010x}, calculated {calculated:#010x}"
    )]
    CorruptSector {
        sector_start: usize,
        sector_end: usize,
        stored: u32,
        calculated: u32,
    },

    /// Хвост записи не разобрался (ключ или var-поле). Загрузка
    /// останавливается на этой записи, более ранние секторы валидны.
    #[error("malformed record at {position}: {detail}")]
    MalformedRecord { position: usize, detail: String },

    /// Не хватило места в файле или в scratch-буфере ключа. Контекст
    /// остаётся рабочим in-memory (file_position = OUT_OF_SPACE).
    #[error("out of space storing session {session_id}: {detail}")]
    OutOfSpace { session_id: u64, detail: String },

    /// reset() при непустом множестве аутентифицированных сессий.
    #[error("reset refused: {count} session(s) still authenticated")]
    ResetWithAuth { count: usize },
}

/// One-method callback, в который движок репортит нефатальные ошибки.
/// Реализации обязаны быть потокобезопасными: sink шарится с владельцем
/// движка и может жить дольше одного вызова.
pub trait ErrorSink: Send + Sync {
    fn on_error(&self, err: RosterError);
}

/// Default sink: route everything to the `log` crate.
#[derive(Debug, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn on_error(&self, err: RosterError) {
        log::error!("{}", err);
    }
}

/// Sink, накапливающий ошибки (тесты и диагностика).
#[derive(Debug, Default)]
pub struct CollectingSink {
    errors: Mutex<Vec<RosterError>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<RosterError> {
        std::mem::take(&mut self.errors.lock().expect("sink poisoned"))
    }

    pub fn len(&self) -> usize {
        self.errors.lock().expect("sink poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Сколько накоплено ошибок, проходящих предикат.
    pub fn count_matching<F: Fn(&RosterError) -> bool>(&self, pred: F) -> usize {
        self.errors
            .lock()
            .expect("sink poisoned")
            .iter()
            .filter(|e| pred(e))
            .count()
    }
}

impl ErrorSink for CollectingSink {
    fn on_error(&self, err: RosterError) {
        self.errors.lock().expect("sink poisoned").push(err);
    }
}
