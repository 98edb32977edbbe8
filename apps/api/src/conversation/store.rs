//! Conversation store — ordered turn history and its durable persistence.
//!
//! The persisted payload is a wholesale JSON array of `{role, content}`
//! objects, one key-value slot per session. Persisted conversations never
//! contain a `system` turn; the system turn is synthesized per request by
//! the composer. Loaders tolerate sequences that do not strictly alternate
//! user/assistant rather than assuming the invariant holds.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A loaded conversation plus the clear-epoch it was loaded under. Appends
/// must present the epoch back; a mismatch means the conversation was
/// cleared in the meantime and the append target no longer exists.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub turns: Vec<Turn>,
    pub epoch: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("persisted conversation is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("conversation was cleared since load (epoch {expected}, now {found})")]
    Stale { expected: u64, found: u64 },
}

/// Durable, single-writer turn history for one session. Implementations are
/// swappable (Redis in production, in-memory in tests); callers hold the
/// per-session generate lock, so no two appends race each other — the epoch
/// check only guards against a clear landing between `load` and `append`.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the last persisted state, or an empty conversation if none.
    async fn load(&self, session: Uuid) -> Result<Snapshot, StoreError>;

    /// Persists the full updated sequence (existing turns + `turns`) before
    /// returning. Fails with [`StoreError::Stale`] when the conversation was
    /// cleared after the `epoch` was observed; the caller drops the result.
    async fn append(&self, session: Uuid, epoch: u64, turns: Vec<Turn>)
        -> Result<(), StoreError>;

    /// Removes all turns and advances the epoch. Irreversible.
    async fn clear(&self, session: Uuid) -> Result<(), StoreError>;
}

fn decode_turns(raw: Option<String>) -> Result<Vec<Turn>, StoreError> {
    match raw {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

/// Production store: one Redis key per session holding the serialized turn
/// array, plus an epoch counter key bumped on every clear.
#[derive(Clone)]
pub struct RedisConversationStore {
    client: redis::Client,
}

impl RedisConversationStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn turns_key(session: Uuid) -> String {
        format!("conversation:{session}")
    }

    fn epoch_key(session: Uuid) -> String {
        format!("conversation:{session}:epoch")
    }
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn load(&self, session: Uuid) -> Result<Snapshot, StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = con.get(Self::turns_key(session)).await?;
        let epoch: Option<u64> = con.get(Self::epoch_key(session)).await?;
        Ok(Snapshot {
            turns: decode_turns(raw)?,
            epoch: epoch.unwrap_or(0),
        })
    }

    async fn append(
        &self,
        session: Uuid,
        epoch: u64,
        turns: Vec<Turn>,
    ) -> Result<(), StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;

        let found: Option<u64> = con.get(Self::epoch_key(session)).await?;
        let found = found.unwrap_or(0);
        if found != epoch {
            return Err(StoreError::Stale {
                expected: epoch,
                found,
            });
        }

        let raw: Option<String> = con.get(Self::turns_key(session)).await?;
        let mut all = decode_turns(raw)?;
        all.extend(turns);

        let payload = serde_json::to_string(&all)?;
        let _: () = con.set(Self::turns_key(session), payload).await?;
        Ok(())
    }

    async fn clear(&self, session: Uuid) -> Result<(), StoreError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let _: () = con.del(Self::turns_key(session)).await?;
        let _: u64 = con.incr(Self::epoch_key(session), 1).await?;
        info!("Cleared conversation for session {session}");
        Ok(())
    }
}

/// In-memory store used by tests and local development without Redis.
#[derive(Default)]
pub struct MemoryConversationStore {
    sessions: Mutex<HashMap<Uuid, (Vec<Turn>, u64)>>,
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn load(&self, session: Uuid) -> Result<Snapshot, StoreError> {
        let sessions = self.sessions.lock().expect("store mutex poisoned");
        let (turns, epoch) = sessions.get(&session).cloned().unwrap_or_default();
        Ok(Snapshot { turns, epoch })
    }

    async fn append(
        &self,
        session: Uuid,
        epoch: u64,
        turns: Vec<Turn>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().expect("store mutex poisoned");
        let entry = sessions.entry(session).or_default();
        if entry.1 != epoch {
            return Err(StoreError::Stale {
                expected: epoch,
                found: entry.1,
            });
        }
        entry.0.extend(turns);
        Ok(())
    }

    async fn clear(&self, session: Uuid) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().expect("store mutex poisoned");
        let entry = sessions.entry(session).or_default();
        entry.0.clear();
        entry.1 += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serializes_with_lowercase_role() {
        let json = serde_json::to_string(&Turn::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn test_persisted_format_is_plain_role_content_array() {
        let turns = vec![Turn::user("q"), Turn::assistant("a")];
        let json = serde_json::to_string(&turns).unwrap();
        let back: Vec<Turn> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turns);
    }

    #[test]
    fn test_decode_missing_slot_is_empty_conversation() {
        assert_eq!(decode_turns(None).unwrap(), Vec::<Turn>::new());
    }

    #[test]
    fn test_decode_tolerates_non_alternating_history() {
        let raw = r#"[{"role":"user","content":"a"},{"role":"user","content":"b"}]"#;
        let turns = decode_turns(Some(raw.to_string())).unwrap();
        assert_eq!(turns.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_load_is_empty_before_first_append() {
        let store = MemoryConversationStore::default();
        let snapshot = store.load(Uuid::new_v4()).await.unwrap();
        assert!(snapshot.turns.is_empty());
        assert_eq!(snapshot.epoch, 0);
    }

    #[tokio::test]
    async fn test_memory_store_append_grows_by_pair() {
        let store = MemoryConversationStore::default();
        let session = Uuid::new_v4();

        let snapshot = store.load(session).await.unwrap();
        store
            .append(
                session,
                snapshot.epoch,
                vec![Turn::user("q"), Turn::assistant("a")],
            )
            .await
            .unwrap();

        let snapshot = store.load(session).await.unwrap();
        assert_eq!(snapshot.turns.len(), 2);
        assert_eq!(snapshot.turns[0].role, Role::User);
        assert_eq!(snapshot.turns[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_clear_empties_turns_and_advances_epoch() {
        let store = MemoryConversationStore::default();
        let session = Uuid::new_v4();

        store
            .append(session, 0, vec![Turn::user("q"), Turn::assistant("a")])
            .await
            .unwrap();
        store.clear(session).await.unwrap();

        let snapshot = store.load(session).await.unwrap();
        assert!(snapshot.turns.is_empty());
        assert_eq!(snapshot.epoch, 1);
    }

    #[tokio::test]
    async fn test_append_with_pre_clear_epoch_is_stale() {
        let store = MemoryConversationStore::default();
        let session = Uuid::new_v4();

        let before = store.load(session).await.unwrap();
        store.clear(session).await.unwrap();

        let err = store
            .append(session, before.epoch, vec![Turn::user("late")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Stale { .. }));

        // The late result must not have corrupted the fresh conversation.
        let after = store.load(session).await.unwrap();
        assert!(after.turns.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = MemoryConversationStore::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.append(a, 0, vec![Turn::user("only a")]).await.unwrap();

        assert_eq!(store.load(a).await.unwrap().turns.len(), 1);
        assert!(store.load(b).await.unwrap().turns.is_empty());
    }
}
