//! session — контекст сессии и публикуемые наружу представления.
//!
//! SessionContext — значение, не владеющее движком: связь с диском держится
//! через file_position (OUT_OF_SPACE = запись живёт только в памяти).
//! Слой сессий зовёт Roster::update_saved_data сам.

use crate::consts::OUT_OF_SPACE;
use crate::identity::{CompositeKey, Dictionary};

/// Состояние одной идентичности контрагента (in-memory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub composite_key: CompositeKey,
    pub session_id: u64,
    pub sequence_index: i32,
    pub last_logon_time: i64,
    pub last_sequence_reset_time: i64,
    /// Смещение fixed prefix'а записи в файле; OUT_OF_SPACE — не персистится.
    pub file_position: i32,
    pub dictionary: Dictionary,
}

impl SessionContext {
    #[inline]
    pub fn is_persisted(&self) -> bool {
        self.file_position != OUT_OF_SPACE
    }
}

/// Публикуемое представление для all_sessions(): только то, что нужно
/// админским читателям, без мутабельного состояния.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: u64,
    pub key: CompositeKey,
}

impl From<&SessionContext> for SessionInfo {
    fn from(ctx: &SessionContext) -> Self {
        Self {
            session_id: ctx.session_id,
            key: ctx.composite_key.clone(),
        }
    }
}

/// Результат on_logon. Дубликат — это отказ, а не "ядовитый" контекст.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogonOutcome {
    Granted(SessionContext),
    /// Эта идентичность уже аутентифицирована.
    Duplicate,
}

impl LogonOutcome {
    /// Контекст при успехе, None при дубликате.
    pub fn granted(self) -> Option<SessionContext> {
        match self {
            LogonOutcome::Granted(ctx) => Some(ctx),
            LogonOutcome::Duplicate => None,
        }
    }

    #[inline]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LogonOutcome::Duplicate)
    }
}
