//! Application-side session state established after verification

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use stride_core::common::Identity;

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Who the session belongs to
    pub identity: Identity,
    /// When verification completed
    pub established_at: DateTime<Utc>,
}

/// Shared holder for the process's authenticated session.
///
/// Clones share state. The verification flow is the only writer,
/// everything else observes.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<AuthSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish a session for `identity`, replacing any previous one.
    pub fn establish(&self, identity: Identity) -> AuthSession {
        let session = AuthSession {
            identity,
            established_at: Utc::now(),
        };
        *self.inner.write() = Some(session.clone());
        session
    }

    /// The current session, if signed in
    pub fn current(&self) -> Option<AuthSession> {
        self.inner.read().clone()
    }

    /// Drop the session
    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            id: "u1".to_string(),
            name: "A".to_string(),
            email: "a@b.com".to_string(),
            phone_verified: None,
            recovery_email_verified: None,
        }
    }

    #[test]
    fn test_establish_replaces_and_clear_removes() {
        let store = SessionStore::new();
        assert_eq!(store.current(), None);

        let session = store.establish(identity());
        assert_eq!(store.current(), Some(session));

        store.clear();
        assert_eq!(store.current(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let store = SessionStore::new();
        let observer = store.clone();

        store.establish(identity());

        assert_eq!(
            observer.current().map(|session| session.identity.id),
            Some("u1".to_string())
        );
    }
}
