//! Registry of in-flight generation sessions.
//!
//! Every generation request opens a session and holds its [`SessionGuard`] for
//! as long as output can still reach the client. When the HTTP connection
//! drops, axum drops the response future or stream, the guard goes with it,
//! and the session's [`CancellationToken`] fires so the producer stops at its
//! next chunk.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct SessionManager {
    active: DashMap<Uuid, CancellationToken>,
}

/// Cancels and unregisters its session when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    session_id: Uuid,
    cancel: CancellationToken,
    manager: Arc<SessionManager>,
}

impl SessionGuard {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Token to check from the generation loop.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.manager.active.remove(&self.session_id);
        tracing::debug!(session = %self.session_id, "session closed");
    }
}

impl SessionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new session.
    pub fn open(self: &Arc<Self>) -> SessionGuard {
        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.active.insert(session_id, cancel.clone());
        tracing::debug!(session = %session_id, "session opened");
        SessionGuard {
            session_id,
            cancel,
            manager: Arc::clone(self),
        }
    }

    /// Number of currently active sessions.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_registers_and_unregisters() {
        let manager = SessionManager::new();
        let guard = manager.open();
        assert_eq!(manager.active_count(), 1);

        drop(guard);
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn dropping_guard_cancels_token() {
        let manager = SessionManager::new();
        let guard = manager.open();
        let token = guard.cancellation_token();
        assert!(!token.is_cancelled());
        drop(guard);
        assert!(token.is_cancelled());
    }

    #[test]
    fn sessions_are_independent() {
        let manager = SessionManager::new();
        let a = manager.open();
        let b = manager.open();
        assert_ne!(a.session_id(), b.session_id());
        drop(a);
        assert_eq!(manager.active_count(), 1);
        assert!(!b.cancellation_token().is_cancelled());
    }
}
