//! Application identity, swapped atomically on re-initialisation.
//!
//! Every request build reads the session, while it only changes when the application is
//! (re)initialised, so reads go through `ArcSwap` and never block.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Credentials identifying the application a client talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub application_id: String,
    pub api_token: String,
}

impl Session {
    pub fn new(application_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self { application_id: application_id.into(), api_token: api_token.into() }
    }

    /// True once an application id has been supplied.
    pub fn is_initialized(&self) -> bool {
        !self.application_id.is_empty()
    }
}

/// Shared handle to the current `Session`.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<ArcSwap<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(session)) }
    }

    /// Snapshot the current session (cheap clone of Arc).
    pub fn get(&self) -> Arc<Session> {
        self.inner.load_full()
    }

    /// Install a new session, returning the one it replaced.
    pub fn replace(&self, session: Session) -> Arc<Session> {
        self.inner.swap(Arc::new(session))
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new(Session::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_is_uninitialized() {
        let handle = SessionHandle::default();
        assert!(!handle.get().is_initialized());
    }

    #[test]
    fn replace_returns_previous() {
        let handle = SessionHandle::new(Session::new("app-1", "t1"));
        let previous = handle.replace(Session::new("app-2", "t2"));
        assert_eq!(previous.application_id, "app-1");
        assert_eq!(handle.get().application_id, "app-2");
    }

    #[test]
    fn clones_observe_replacement() {
        let handle = SessionHandle::new(Session::new("app-1", "t1"));
        let other = handle.clone();
        handle.replace(Session::new("app-9", "t9"));
        assert_eq!(other.get().api_token, "t9");
    }
}
