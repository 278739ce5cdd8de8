//! roster — движок персистентного каталога идентичностей сессий.
//!
//! Разделение по подмодулям:
//! - core.rs — структура Roster, open() (lock + mmap + load + публикация),
//!             аксессоры и shared-хэндлы
//! - load.rs — восстановление: header init, walk записей, валидация CRC
//!             секторов, zero-tail skip
//! - ops.rs  — мутации и запросы: on_logon, sequence_reset,
//!             update_saved_data, on_disconnect, reset, lookups

pub mod core;
pub mod load;
pub mod ops;

pub use core::Roster;
