//! live — конкурентные представления, шарящиеся с потоками-читателями.
//!
//! Модель: один поток-владелец мутирует, произвольные читатели смотрят.
//! - AuthSet: множество аутентифицированных session_id (membership-тесты
//!   из админских потоков).
//! - SessionList: copy-on-write список SessionInfo; снапшот — это Arc на
//!   иммутабельный Vec, обход не блокирует владельца.
//!
//! Хэндлы дешёво клонируются (Arc) и переживают сам движок.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::session::SessionInfo;

/// Множество текущих аутентифицированных session_id.
#[derive(Debug, Clone, Default)]
pub struct AuthSet {
    inner: Arc<RwLock<HashSet<u64>>>,
}

impl AuthSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// true, если id не был в множестве (вставка состоялась).
    pub fn add(&self, session_id: u64) -> bool {
        self.inner.write().expect("auth set poisoned").insert(session_id)
    }

    /// Идемпотентно удалить id.
    pub fn remove(&self, session_id: u64) {
        self.inner.write().expect("auth set poisoned").remove(&session_id);
    }

    pub fn contains(&self, session_id: u64) -> bool {
        self.inner.read().expect("auth set poisoned").contains(&session_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("auth set poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Копия содержимого (диагностика; не для горячего пути).
    pub fn to_vec(&self) -> Vec<u64> {
        self.inner
            .read()
            .expect("auth set poisoned")
            .iter()
            .copied()
            .collect()
    }
}

/// Copy-on-write публикация списка всех известных сессий.
#[derive(Debug, Clone, Default)]
pub struct SessionList {
    inner: Arc<RwLock<Arc<Vec<SessionInfo>>>>,
}

impl SessionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Иммутабельный снапшот; обход не держит никаких локов.
    pub fn snapshot(&self) -> Arc<Vec<SessionInfo>> {
        Arc::clone(&self.inner.read().expect("session list poisoned"))
    }

    /// Владелец: дописать одну сессию (копия старого списка + новая).
    pub fn push(&self, info: SessionInfo) {
        let mut slot = self.inner.write().expect("session list poisoned");
        let mut next = Vec::with_capacity(slot.len() + 1);
        next.extend_from_slice(&slot);
        next.push(info);
        *slot = Arc::new(next);
    }

    /// Владелец: опубликовать список целиком (после load).
    pub fn replace_all(&self, all: Vec<SessionInfo>) {
        *self.inner.write().expect("session list poisoned") = Arc::new(all);
    }

    /// Владелец: опустошить (reset).
    pub fn clear(&self) {
        self.replace_all(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("session list poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
