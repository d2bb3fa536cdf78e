//! Session management
//!
//! A session binds one credential to one knowledge store, one conversation
//! and one language-model client. Sessions are created and owned by the
//! caller; [`SessionManager`] is a convenience map, not a process global.
//!
//! Every reset bumps the session generation. Work that started against an
//! older generation must not write into the new state.
use crate::conversation::{Conversation, Role, Turn};
use crate::knowledge::{IndexedDocument, KnowledgeStore};
use crate::llm::LanguageModel;
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Mutable per-session state, guarded by one lock
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) generation: u64,
    pub(crate) knowledge: KnowledgeStore,
    pub(crate) conversation: Conversation,
    pub(crate) tokens_used: u64,
}

/// One user session
pub struct Session {
    id: Uuid,
    credential: String,
    created_at: DateTime<Utc>,
    model: Arc<dyn LanguageModel>,
    /// Serializes queries; held for the whole of `Router::answer`
    query_lock: Mutex<()>,
    state: Mutex<SessionState>,
}

impl Session {
    /// Create a session whose knowledge store holds `dimension`-sized vectors
    pub fn new(
        credential: impl Into<String>,
        model: Arc<dyn LanguageModel>,
        dimension: usize,
    ) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            credential: credential.into(),
            created_at: Utc::now(),
            model,
            query_lock: Mutex::new(()),
            state: Mutex::new(SessionState {
                generation: 0,
                knowledge: KnowledgeStore::new(dimension),
                conversation: Conversation::new(),
                tokens_used: 0,
            }),
        };
        tracing::info!(session = %session.id, "Session created");
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Opaque partition key; never validated
    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// Full conversation, oldest first
    pub async fn history(&self) -> Vec<Turn> {
        self.state.lock().await.conversation.all().to_vec()
    }

    /// Last `n` turns
    pub async fn history_tail(&self, n: usize) -> Vec<Turn> {
        self.state.lock().await.conversation.tail(n).to_vec()
    }

    /// Approximate tokens used by every answered query since the last reset
    pub async fn tokens_used(&self) -> u64 {
        self.state.lock().await.tokens_used
    }

    pub async fn document_count(&self) -> usize {
        self.state.lock().await.knowledge.document_count()
    }

    pub async fn chunk_count(&self) -> usize {
        self.state.lock().await.knowledge.chunk_count()
    }

    /// Start over: clears the knowledge store and the conversation
    ///
    /// Does not wait for an in-flight query; that query's answer is dropped
    /// instead of being recorded.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.knowledge.reset();
        state.conversation.clear();
        state.tokens_used = 0;
        tracing::info!(
            session = %self.id,
            generation = state.generation,
            "Knowledge base has been reset."
        );
    }

    pub(crate) async fn lock_queries(&self) -> MutexGuard<'_, ()> {
        self.query_lock.lock().await
    }

    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Append turns if the session is still on `generation`
    pub(crate) async fn append_turns(&self, generation: u64, turns: &[(Role, &str)]) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(
                session = %self.id,
                started = generation,
                current = state.generation,
                "Dropping turns from a previous generation"
            );
            return false;
        }
        for (role, text) in turns {
            state.conversation.append(*role, *text);
        }
        true
    }

    /// Append the outbound prompt and return the history the model should see
    ///
    /// `None` when the session moved past `generation`.
    pub(crate) async fn push_prompt(&self, generation: u64, prompt: &str) -> Option<Vec<Turn>> {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return None;
        }
        state.conversation.append(Role::User, prompt);
        Some(state.conversation.all().to_vec())
    }

    /// Record the model's reply and its token estimate if still on `generation`
    pub(crate) async fn record_reply(&self, generation: u64, reply: &str, tokens: u64) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(session = %self.id, "Reply arrived after reset; not recorded");
            return false;
        }
        state.conversation.append(Role::Assistant, reply);
        state.tokens_used += tokens;
        true
    }

    /// Insert a document built against `generation`
    pub(crate) async fn insert_document(
        &self,
        generation: u64,
        indexed: IndexedDocument,
    ) -> crate::Result<bool> {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return Ok(false);
        }
        state.knowledge.insert(indexed)?;
        Ok(true)
    }
}

/// Builds the language-model client for a credential
pub type ModelFactory = Arc<dyn Fn(&str) -> Arc<dyn LanguageModel> + Send + Sync>;

/// Credential-keyed session map
pub struct SessionManager {
    sessions: AHashMap<String, Arc<Session>>,
    model_factory: ModelFactory,
    dimension: usize,
}

impl SessionManager {
    pub fn new(model_factory: ModelFactory, dimension: usize) -> Self {
        Self {
            sessions: AHashMap::new(),
            model_factory,
            dimension,
        }
    }

    /// Session for `credential`, created on first use
    pub fn get_or_create(&mut self, credential: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.get(credential) {
            return Arc::clone(session);
        }

        let model = (self.model_factory)(credential);
        let session = Arc::new(Session::new(credential, model, self.dimension));
        self.sessions
            .insert(credential.to_string(), Arc::clone(&session));
        session
    }

    pub fn get(&self, credential: &str) -> Option<Arc<Session>> {
        self.sessions.get(credential).cloned()
    }

    /// Forget a session; in-flight work holding the `Arc` finishes normally
    pub fn remove(&mut self, credential: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(credential);
        if let Some(session) = &removed {
            tracing::info!(session = %session.id(), "Session removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunker;
    use crate::embedding::HashingEmbedder;
    use crate::knowledge::Document;
    use crate::llm::LlmError;
    use async_trait::async_trait;

    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn complete(&self, history: &[Turn]) -> std::result::Result<String, LlmError> {
            Ok(history.last().map(|t| t.text.clone()).unwrap_or_default())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn session() -> Session {
        Session::new("key-a", Arc::new(EchoModel), 64)
    }

    fn indexed(text: &str) -> IndexedDocument {
        IndexedDocument::build(
            Document::new(text, "test.txt", false),
            &Chunker::new(100, 10).unwrap(),
            &HashingEmbedder::new(64),
        )
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn test_session_creation() {
        let session = session();
        assert_eq!(session.credential(), "key-a");
        assert_eq!(session.generation().await, 0);
        assert!(session.history().await.is_empty());
        assert_eq!(session.tokens_used().await, 0);
        assert_eq!(session.model().model_name(), "echo");
    }

    #[tokio::test]
    async fn test_append_turns_current_generation() {
        let session = session();
        assert!(
            session
                .append_turns(0, &[(Role::User, "q"), (Role::Assistant, "a")])
                .await
        );
        assert_eq!(
            session.history().await,
            vec![Turn::user("q"), Turn::assistant("a")]
        );
        assert_eq!(session.history_tail(1).await, vec![Turn::assistant("a")]);
    }

    #[tokio::test]
    async fn test_reset_clears_and_bumps_generation() {
        let session = session();
        session.insert_document(0, indexed("Some text.")).await.unwrap();
        session.push_prompt(0, "q").await.unwrap();
        assert!(session.record_reply(0, "a", 12).await);
        assert_eq!(session.tokens_used().await, 12);

        session.reset().await;

        assert_eq!(session.generation().await, 1);
        assert_eq!(session.document_count().await, 0);
        assert_eq!(session.chunk_count().await, 0);
        assert!(session.history().await.is_empty());
        assert_eq!(session.tokens_used().await, 0);
    }

    #[tokio::test]
    async fn test_stale_generation_is_dropped() {
        let session = session();
        session.reset().await;

        assert!(!session.append_turns(0, &[(Role::User, "late")]).await);
        assert!(session.push_prompt(0, "late prompt").await.is_none());
        assert!(!session.record_reply(0, "late reply", 5).await);
        assert!(!session.insert_document(0, indexed("Late text.")).await.unwrap());

        assert!(session.history().await.is_empty());
        assert_eq!(session.tokens_used().await, 0);
        assert_eq!(session.chunk_count().await, 0);
    }

    #[test]
    fn test_session_manager() {
        let factory: ModelFactory = Arc::new(|_: &str| Arc::new(EchoModel) as Arc<dyn LanguageModel>);
        let mut manager = SessionManager::new(factory, 64);
        assert!(manager.is_empty());

        let a = manager.get_or_create("key-a");
        let again = manager.get_or_create("key-a");
        let b = manager.get_or_create("key-b");

        assert!(Arc::ptr_eq(&a, &again));
        assert_ne!(a.id(), b.id());
        assert_eq!(manager.len(), 2);

        assert!(manager.remove("key-a").is_some());
        assert!(manager.get("key-a").is_none());
        assert!(manager.get("key-b").is_some());
        assert_eq!(manager.len(), 1);
    }
}
