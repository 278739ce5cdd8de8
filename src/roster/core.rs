//! roster/core — структура Roster, открытие стора и аксессоры.
//!
//! Модель владения: все мутации идут через один поток-владелец (framer
//! thread гейтвея). Наружу шарятся только хэндлы AuthSet/SessionList.
//! Контексты отдаются по значению; связь с диском — через file_position
//! (см. session.rs).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::codec::{RecordCodec, SessionRecordCodec};
use crate::config::RosterConfig;
use crate::consts::{HEADER_SIZE, LOWEST_VALID_SESSION_ID, SECTOR_DATA_LENGTH};
use crate::errors::{ErrorSink, LogSink};
use crate::identity::{CompositeKey, SenderTargetStrategy, SessionIdStrategy};
use crate::live::{AuthSet, SessionList};
use crate::lock::{self, LockGuard};
use crate::mapped::MappedRegion;
use crate::sector::SectorFramer;
use crate::session::{SessionContext, SessionInfo};

/// Персистентный каталог идентичностей сессий.
///
/// Держит mmap-окно стора, секторный фреймер и in-memory индексы; назначает
/// монотонные session_id и ведёт множество аутентифицированных сессий.
pub struct Roster {
    pub(crate) region: MappedRegion,
    pub(crate) framer: SectorFramer,
    pub(crate) codec: Box<dyn RecordCodec>,
    pub(crate) strategy: Box<dyn SessionIdStrategy>,
    pub(crate) errors: Arc<dyn ErrorSink>,

    pub(crate) initial_sequence_index: i32,
    pub(crate) strict_load: bool,

    // Scratch для сериализации ключа; размер = данные одного сектора.
    pub(crate) key_scratch: Vec<u8>,

    // Owner-thread-only индексы.
    pub(crate) by_key: HashMap<CompositeKey, SessionContext>,
    pub(crate) by_id: HashMap<u64, CompositeKey>,

    // Shared views.
    pub(crate) authenticated: AuthSet,
    pub(crate) all_sessions: SessionList,

    // Курсор дозаписи; OUT_OF_SPACE после исчерпания файла.
    pub(crate) file_position: i32,
    pub(crate) counter: u64,

    pub(crate) _lock: LockGuard, // держим writer lock до Drop
}

impl Roster {
    /// Открыть стор с дефолтным кодеком, стратегией и log-sink'ом.
    pub fn open(config: RosterConfig) -> Result<Self> {
        Self::open_with(
            config,
            Box::new(SessionRecordCodec),
            Box::new(SenderTargetStrategy),
            Arc::new(LogSink),
        )
    }

    /// Открыть стор с внедрёнными кодеком, стратегией и error sink'ом.
    pub fn open_with(
        config: RosterConfig,
        codec: Box<dyn RecordCodec>,
        strategy: Box<dyn SessionIdStrategy>,
        errors: Arc<dyn ErrorSink>,
    ) -> Result<Self> {
        config.validate()?;

        let guard = lock::try_acquire_exclusive(&config.path)
            .with_context(|| format!("session store writer lock {}", config.path.display()))?;

        let region = MappedRegion::open(&config.path, config.capacity, config.force_writes)?;

        let mut roster = Self {
            framer: SectorFramer::new(config.capacity),
            codec,
            strategy,
            errors,
            initial_sequence_index: config.initial_sequence_index,
            strict_load: config.strict_load,
            key_scratch: vec![0u8; SECTOR_DATA_LENGTH],
            by_key: HashMap::new(),
            by_id: HashMap::new(),
            authenticated: AuthSet::new(),
            all_sessions: SessionList::new(),
            file_position: HEADER_SIZE as i32,
            counter: LOWEST_VALID_SESSION_ID,
            region,
            _lock: guard,
        };

        roster.load()?;
        roster.publish_all();
        Ok(roster)
    }

    // ---------------- accessors ----------------

    #[inline]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    #[inline]
    pub fn initial_sequence_index(&self) -> i32 {
        self.initial_sequence_index
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Хэндл множества аутентифицированных сессий (для потоков-читателей).
    pub fn auth_view(&self) -> AuthSet {
        self.authenticated.clone()
    }

    /// Хэндл снапшот-списка всех сессий (для потоков-читателей).
    pub fn sessions_view(&self) -> SessionList {
        self.all_sessions.clone()
    }

    // ---------------- internal helpers ----------------

    /// Опубликовать текущее содержимое by_key в снапшот-список.
    pub(crate) fn publish_all(&self) {
        let mut all: Vec<SessionInfo> = self.by_key.values().map(SessionInfo::from).collect();
        // стабильный порядок публикации: по возрастанию session_id
        all.sort_by_key(|s| s.session_id);
        self.all_sessions.replace_all(all);
    }

    /// Установить контекст в оба индекса (без публикации).
    pub(crate) fn index(&mut self, ctx: SessionContext) {
        self.by_id.insert(ctx.session_id, ctx.composite_key.clone());
        self.by_key.insert(ctx.composite_key.clone(), ctx);
    }
}

impl std::fmt::Debug for Roster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Roster")
            .field("region", &self.region)
            .field("counter", &self.counter)
            .field("file_position", &self.file_position)
            .field("known_sessions", &self.by_key.len())
            .field("authenticated", &self.authenticated.len())
            .finish()
    }
}
