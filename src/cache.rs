//! User cache with reader/writer concurrency control.
//!
//! [`SharedUserStore`] wraps a `HashMap` in a `std::sync::RwLock`: lookups share the lock
//! and run in parallel, upserts and clears take it exclusively. A record is replaced as one
//! value under the write lock, so a reader sees either the old record or the new one.

use crate::model::User;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Storage for the latest known record per `user_id`.
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// Insert or replace the record under its `user_id`.
    fn upsert(&self, user: User);
    /// Snapshot of every cached record, in no particular order.
    fn get_all(&self) -> Vec<User>;
    /// Point lookup.
    fn get(&self, user_id: &str) -> Option<User>;
    /// Records whose nickname equals `nickname` exactly.
    fn get_by_nickname(&self, nickname: &str) -> Vec<User>;
    /// Remove every record.
    fn clear(&self);
    /// Number of cached records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> UserStore for Arc<T>
where
    T: UserStore + ?Sized,
{
    fn upsert(&self, user: User) {
        (**self).upsert(user)
    }

    fn get_all(&self) -> Vec<User> {
        (**self).get_all()
    }

    fn get(&self, user_id: &str) -> Option<User> {
        (**self).get(user_id)
    }

    fn get_by_nickname(&self, nickname: &str) -> Vec<User> {
        (**self).get_by_nickname(nickname)
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Production store: a `HashMap` behind a reader/writer lock.
#[derive(Debug, Default)]
pub struct SharedUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl SharedUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// Writers only ever insert, remove or clear whole entries, so the map behind a poisoned lock
// is still consistent; recover it instead of propagating the panic.
impl UserStore for SharedUserStore {
    fn upsert(&self, user: User) {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        users.insert(user.user_id.clone(), user);
    }

    fn get_all(&self) -> Vec<User> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.values().cloned().collect()
    }

    fn get(&self, user_id: &str) -> Option<User> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.get(user_id).cloned()
    }

    fn get_by_nickname(&self, nickname: &str) -> Vec<User> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.values().filter(|u| u.nickname == nickname).cloned().collect()
    }

    fn clear(&self) {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        users.clear();
    }

    fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Test store that also records every upsert in call order.
#[derive(Debug, Default)]
pub struct RecordingUserStore {
    inner: Mutex<RecordingState>,
}

#[derive(Debug, Default)]
struct RecordingState {
    users: HashMap<String, User>,
    upserts: Vec<User>,
    clears: usize,
}

impl RecordingUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record passed to `upsert`, oldest first.
    pub fn upserts(&self) -> Vec<User> {
        self.lock().upserts.clone()
    }

    /// Number of `clear` calls.
    pub fn clears(&self) -> usize {
        self.lock().clears
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UserStore for RecordingUserStore {
    fn upsert(&self, user: User) {
        let mut state = self.lock();
        state.upserts.push(user.clone());
        state.users.insert(user.user_id.clone(), user);
    }

    fn get_all(&self) -> Vec<User> {
        self.lock().users.values().cloned().collect()
    }

    fn get(&self, user_id: &str) -> Option<User> {
        self.lock().users.get(user_id).cloned()
    }

    fn get_by_nickname(&self, nickname: &str) -> Vec<User> {
        self.lock().users.values().filter(|u| u.nickname == nickname).cloned().collect()
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.users.clear();
        state.clears += 1;
    }

    fn len(&self) -> usize {
        self.lock().users.len()
    }
}
