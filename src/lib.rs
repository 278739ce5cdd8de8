#![allow(non_snake_case)]

// Базовые модули
pub mod config;
pub mod consts;
pub mod errors;
pub mod metrics;

// Формат и персистентность
pub mod codec; // file header + раскладка записей (внедряемый кодек)
pub mod mapped; // mmap-окно стора: force/transfer_to/zero_fill
pub mod sector; // секторный фреймер + CRC32

// Идентичности и публикуемые представления
pub mod identity; // CompositeKey, Dictionary, SessionIdStrategy
pub mod live; // конкурентные хэндлы: AuthSet, SessionList
pub mod session; // SessionContext, SessionInfo, LogonOutcome

// Движок каталога
pub mod roster; // src/roster/{mod,core,load,ops}.rs

// Вспомогательное
pub mod lock;

// Удобные реэкспорты
pub use codec::{FileHeader, RecordCodec, SessionRecord, SessionRecordCodec};
pub use config::RosterConfig;
pub use errors::{CollectingSink, ErrorSink, LogSink, RosterError};
pub use identity::{CompositeKey, Dictionary, SenderTargetStrategy, SessionIdStrategy};
pub use live::{AuthSet, SessionList};
pub use roster::Roster;
pub use session::{LogonOutcome, SessionContext, SessionInfo};
