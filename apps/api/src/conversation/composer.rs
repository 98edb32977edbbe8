//! Prompt composer — orchestrates one voice exchange: system prompt from the
//! candidate profile, persisted history, new utterance, completion call, and
//! the append of the resulting turn pair.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::conversation::store::{ConversationStore, StoreError, Turn};
use crate::llm_client::prompts::INTERVIEW_SYSTEM_TEMPLATE;
use crate::llm_client::{CompletionBackend, CompletionParams, LlmError};
use crate::models::profile::CandidateProfile;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct PromptComposer {
    backend: Arc<dyn CompletionBackend>,
    store: Arc<dyn ConversationStore>,
    params: CompletionParams,
}

impl PromptComposer {
    pub fn new(backend: Arc<dyn CompletionBackend>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            backend,
            store,
            params: CompletionParams::default(),
        }
    }

    /// Runs one exchange for `session`. On success the store grows by exactly
    /// two turns (user, assistant) and the assistant text is returned. On any
    /// failure the store is untouched.
    ///
    /// Returns `Ok(None)` when the completion resolved after the conversation
    /// was cleared: the late result is dropped (and logged) instead of being
    /// appended to a conversation it no longer belongs to.
    ///
    /// The caller must not run two calls concurrently for one session; the
    /// HTTP layer holds a per-session lock for the duration.
    pub async fn generate(
        &self,
        session: Uuid,
        utterance: &str,
        profile: &CandidateProfile,
    ) -> Result<Option<String>, ComposeError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(ComposeError::Validation(
                "Utterance must not be empty".to_string(),
            ));
        }

        let snapshot = self.store.load(session).await?;

        // System turn first, then persisted history, then the new utterance.
        // The system turn is synthesized fresh each request and never stored.
        let mut messages = Vec::with_capacity(snapshot.turns.len() + 2);
        messages.push(Turn::system(render_system_prompt(profile)));
        messages.extend(snapshot.turns.iter().cloned());
        messages.push(Turn::user(utterance));

        let reply = self.backend.complete(&messages, &self.params).await?;

        let appended = self
            .store
            .append(
                session,
                snapshot.epoch,
                vec![Turn::user(utterance), Turn::assistant(reply.clone())],
            )
            .await;

        match appended {
            Ok(()) => Ok(Some(reply)),
            Err(StoreError::Stale { expected, found }) => {
                warn!(
                    "Dropping completion for session {session}: conversation cleared \
                     mid-flight (epoch {expected} -> {found})"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Embeds the profile fields verbatim into the fixed persona template.
fn render_system_prompt(profile: &CandidateProfile) -> String {
    INTERVIEW_SYSTEM_TEMPLATE
        .replace("{name}", &profile.name)
        .replace("{programming_language}", &profile.programming_language)
        .replace("{target_company}", &profile.target_company)
        .replace("{job_role}", &profile.job_role)
        .replace("{job_description}", &profile.job_description)
        .replace("{experience}", &profile.experience)
        .replace("{education}", &profile.education)
        .replace("{projects}", &profile.projects)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Mutex;

    use super::*;
    use crate::conversation::store::{MemoryConversationStore, Role};
    use crate::resume::sections::ResumeSections;

    /// Scripted backend: returns a canned reply (or error) and records the
    /// message sequence it was called with.
    struct ScriptedBackend {
        reply: Result<String, ()>,
        seen: Mutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedBackend {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(
            &self,
            messages: &[Turn],
            _params: &CompletionParams,
        ) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.reply
                .clone()
                .map_err(|()| LlmError::Malformed("scripted failure".to_string()))
        }
    }

    fn profile() -> CandidateProfile {
        CandidateProfile::new(
            "Ada".into(),
            "Initech".into(),
            "Backend Engineer".into(),
            "Build APIs".into(),
            "Rust".into(),
            ResumeSections {
                experience: "shipped a compiler".into(),
                education: "BS CS".into(),
                projects: "built a database".into(),
            },
        )
        .unwrap()
    }

    fn composer_with(
        backend: Arc<ScriptedBackend>,
    ) -> (PromptComposer, Arc<MemoryConversationStore>) {
        let store = Arc::new(MemoryConversationStore::default());
        (
            PromptComposer::new(backend, store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn test_empty_utterance_fails_validation_and_leaves_store_unchanged() {
        let backend = Arc::new(ScriptedBackend::replying("unused"));
        let (composer, store) = composer_with(backend.clone());
        let session = Uuid::new_v4();

        let err = composer.generate(session, "   ", &profile()).await.unwrap_err();
        assert!(matches!(err, ComposeError::Validation(_)));
        assert!(store.load(session).await.unwrap().turns.is_empty());
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_exchange_appends_exactly_two_turns() {
        let backend = Arc::new(ScriptedBackend::replying("use a BTreeMap"));
        let (composer, store) = composer_with(backend);
        let session = Uuid::new_v4();

        let reply = composer
            .generate(session, "how do I sort a map?", &profile())
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("use a BTreeMap"));

        let turns = store.load(session).await.unwrap().turns;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::user("how do I sort a map?"));
        assert_eq!(turns[1], Turn::assistant("use a BTreeMap"));
    }

    #[tokio::test]
    async fn test_messages_are_system_then_history_then_utterance() {
        let backend = Arc::new(ScriptedBackend::replying("second answer"));
        let (composer, store) = composer_with(backend.clone());
        let session = Uuid::new_v4();

        store
            .append(session, 0, vec![Turn::user("q1"), Turn::assistant("a1")])
            .await
            .unwrap();

        composer.generate(session, "q2", &profile()).await.unwrap();

        let seen = backend.seen.lock().unwrap();
        let messages = &seen[0];
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], Turn::user("q1"));
        assert_eq!(messages[2], Turn::assistant("a1"));
        assert_eq!(messages[3], Turn::user("q2"));
    }

    #[tokio::test]
    async fn test_system_turn_is_never_persisted() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let (composer, store) = composer_with(backend);
        let session = Uuid::new_v4();

        composer.generate(session, "hello", &profile()).await.unwrap();

        let turns = store.load(session).await.unwrap().turns;
        assert!(turns.iter().all(|t| t.role != Role::System));
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_store_unchanged() {
        let backend = Arc::new(ScriptedBackend::failing());
        let (composer, store) = composer_with(backend);
        let session = Uuid::new_v4();

        let err = composer.generate(session, "hello", &profile()).await.unwrap_err();
        assert!(matches!(err, ComposeError::Llm(_)));
        assert!(store.load(session).await.unwrap().turns.is_empty());
    }

    /// Backend that resets the conversation while the completion is
    /// "in flight", reproducing a user hitting clear mid-request.
    struct ClearingBackend {
        store: Arc<MemoryConversationStore>,
        session: Uuid,
    }

    #[async_trait]
    impl CompletionBackend for ClearingBackend {
        async fn complete(
            &self,
            _messages: &[Turn],
            _params: &CompletionParams,
        ) -> Result<String, LlmError> {
            self.store.clear(self.session).await.unwrap();
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_clear_during_flight_drops_the_late_result() {
        let store = Arc::new(MemoryConversationStore::default());
        let session = Uuid::new_v4();
        let backend = Arc::new(ClearingBackend {
            store: store.clone(),
            session,
        });
        let composer = PromptComposer::new(backend, store.clone());

        let reply = composer.generate(session, "hello?", &profile()).await.unwrap();

        // Dropped, not surfaced as an error — and the fresh (cleared)
        // conversation stays empty.
        assert_eq!(reply, None);
        assert!(store.load(session).await.unwrap().turns.is_empty());
    }

    #[test]
    fn test_system_prompt_embeds_profile_fields_verbatim() {
        let rendered = render_system_prompt(&profile());
        assert!(rendered.contains("Ada"));
        assert!(rendered.contains("Rust"));
        assert!(rendered.contains("Initech"));
        assert!(rendered.contains("Backend Engineer"));
        assert!(rendered.contains("shipped a compiler"));
        assert!(rendered.contains("BS CS"));
        assert!(rendered.contains("built a database"));
        assert!(!rendered.contains("{name}"));
    }
}
