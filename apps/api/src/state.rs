use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::conversation::store::ConversationStore;
use crate::llm_client::CompletionBackend;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    /// Completion backend behind a trait object so tests can script replies.
    pub llm: Arc<dyn CompletionBackend>,
    /// Conversation persistence. Redis in production, in-memory in tests.
    pub conversations: Arc<dyn ConversationStore>,
    pub locks: SessionLocks,
    pub config: Config,
}

/// At most one generate call may be in flight per session: the store's
/// append is a read-modify-write, and two interleaved generations would lose
/// one of the two appends. A second request arriving while the lock is held
/// is rejected with 409 rather than queued.
#[derive(Clone, Default)]
pub struct SessionLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn for_session(&self, session: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .expect("session lock map poisoned")
            .entry(session)
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_session_gets_same_lock() {
        let locks = SessionLocks::default();
        let session = Uuid::new_v4();
        let a = locks.for_session(session);
        let b = locks.for_session(session);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_distinct_sessions_get_distinct_locks() {
        let locks = SessionLocks::default();
        let a = locks.for_session(Uuid::new_v4());
        let b = locks.for_session(Uuid::new_v4());
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_second_acquire_fails_while_first_is_held() {
        let locks = SessionLocks::default();
        let session = Uuid::new_v4();

        let lock = locks.for_session(session);
        let guard = lock.try_lock().unwrap();

        let second = locks.for_session(session);
        assert!(second.try_lock().is_err());

        drop(guard);
        assert!(second.try_lock().is_ok());
    }
}
