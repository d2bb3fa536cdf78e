//! Question routing and document ingestion for a session

use crate::chunking::Chunker;
use crate::config::{parse_duration, AssistantConfig, Config};
use crate::conversation::Role;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::Result;
use crate::extraction::DocumentExtractor;
use crate::knowledge::{Document, IndexedDocument};
use crate::llm::LlmError;
use crate::retrieval::prompt::{build_prompt, estimate_tokens, local_context, web_context};
use crate::retrieval::{Answer, IngestOutcome, Route};
use crate::security::SecurityGate;
use crate::session::Session;
use crate::websearch::WebSearch;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// Stateless router; all per-user state lives in the [`Session`]
///
/// One router can serve any number of sessions concurrently.
pub struct Router {
    embedder: Arc<dyn EmbeddingProvider>,
    web: Arc<dyn WebSearch>,
    extractor: Arc<dyn DocumentExtractor>,
    gate: SecurityGate,
    chunker: Chunker,
    assistant: AssistantConfig,
    top_k: usize,
    web_results: usize,
    llm_timeout: Duration,
}

impl Router {
    /// A `top_k` of 0 is raised to 1 so a populated store always yields a chunk
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        web: Arc<dyn WebSearch>,
        extractor: Arc<dyn DocumentExtractor>,
        gate: SecurityGate,
        chunker: Chunker,
        assistant: AssistantConfig,
        top_k: usize,
        web_results: usize,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            web,
            extractor,
            gate,
            chunker,
            assistant,
            top_k: top_k.max(1),
            web_results,
            llm_timeout,
        }
    }

    /// Router with the configured gate, chunker and limits
    pub fn from_config(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        web: Arc<dyn WebSearch>,
        extractor: Arc<dyn DocumentExtractor>,
    ) -> Result<Self> {
        let gate = SecurityGate::from_config(config)?;
        let chunker = Chunker::from_config(&config.chunking)?;
        let llm_timeout = parse_duration(&config.llm.timeout).unwrap_or(DEFAULT_LLM_TIMEOUT);

        Ok(Self::new(
            embedder,
            web,
            extractor,
            gate,
            chunker,
            config.assistant.clone(),
            config.retrieval.top_k,
            config.web_search.max_results,
            llm_timeout,
        ))
    }

    pub fn gate(&self) -> &SecurityGate {
        &self.gate
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Answer `question` within `session`
    ///
    /// Never fails: collaborator errors become an apology text with zero cost.
    pub async fn answer(&self, session: &Session, question: &str) -> Answer {
        let _in_flight = session.lock_queries().await;

        let (generation, store_empty) = {
            let state = session.lock_state().await;
            (state.generation, state.knowledge.is_empty())
        };

        let (blocked, response) = self.gate.check(question);
        if blocked {
            let recorded = session
                .append_turns(
                    generation,
                    &[(Role::User, question), (Role::Assistant, response.as_str())],
                )
                .await;
            return Answer {
                text: response,
                tokens: 0,
                route: Route::Blocked,
                recorded,
            };
        }

        if store_empty {
            debug!(session = %session.id(), "Knowledge base empty; asking for an upload");
            return Answer {
                text: self.assistant.empty_knowledge_message.clone(),
                tokens: 0,
                route: Route::EmptyKnowledgeBase,
                recorded: false,
            };
        }

        let local = match self.search_local(session, generation, question).await {
            Some(chunks) => chunks,
            None => return cancelled(),
        };

        let (route, context) = self.assemble_context(&local, question).await;
        debug!(session = %session.id(), ?route, chunks = local.len(), "Context assembled");

        let prompt = build_prompt(&self.assistant, &context, question);
        let history = match session.push_prompt(generation, &prompt).await {
            Some(history) => history,
            None => return cancelled(),
        };

        let reply = match tokio::time::timeout(self.llm_timeout, session.model().complete(&history))
            .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return apology(route, e),
            Err(_) => return apology(route, LlmError::Timeout(self.llm_timeout)),
        };

        let tokens = estimate_tokens(&prompt, &context, &reply);
        let recorded = session.record_reply(generation, &reply, tokens).await;

        Answer {
            text: reply,
            tokens,
            route,
            recorded,
        }
    }

    /// Pick the context for `question` given the local search result
    ///
    /// Local chunks win; with none, the web is searched and an empty web
    /// result becomes the no-results marker.
    pub async fn assemble_context(&self, local_chunks: &[String], question: &str) -> (Route, String) {
        if !local_chunks.is_empty() {
            return (Route::LocalHit, local_context(local_chunks));
        }

        let results = self.web.search(question, self.web_results).await;
        debug!(results = results.len(), "Local search empty; used web fallback");
        (Route::WebFallback, web_context(&results))
    }

    /// Top-k chunk texts for `question`, `None` if the session was reset meanwhile
    async fn search_local(
        &self,
        session: &Session,
        generation: u64,
        question: &str,
    ) -> Option<Vec<String>> {
        let query = match embedding::encode(Arc::clone(&self.embedder), question.to_string()).await
        {
            Ok(query) => Some(query),
            Err(e) => {
                warn!("Query embedding failed: {}", e);
                None
            }
        };

        let state = session.lock_state().await;
        if state.generation != generation {
            return None;
        }

        let Some(query) = query else {
            return Some(Vec::new());
        };

        match state.knowledge.search(&query, self.top_k) {
            Ok(hits) => Some(hits.into_iter().map(|hit| hit.text).collect()),
            Err(e) => {
                warn!("Knowledge search failed: {}", e);
                Some(Vec::new())
            }
        }
    }

    /// Extract, chunk, embed and add a file to the session's knowledge store
    pub async fn ingest_file(&self, session: &Session, path: &Path) -> IngestOutcome {
        let extraction = self.extractor.extract(path).await;
        if extraction.text.trim().is_empty() {
            warn!("No text extracted from {:?}", path);
            return IngestOutcome::failed("Could not read document content");
        }

        let document = Document::new(
            extraction.text,
            path.display().to_string(),
            extraction.ocr_used,
        );
        self.ingest_document(session, document).await
    }

    /// Chunk, embed and add an already extracted document
    ///
    /// Embedding runs outside the session lock; the finished document is
    /// inserted in one step, and dropped if the session was reset meanwhile.
    pub async fn ingest_document(&self, session: &Session, document: Document) -> IngestOutcome {
        let generation = session.generation().await;
        let source = document.metadata.source.clone();
        let ocr_used = document.metadata.ocr_used;

        let indexed =
            match IndexedDocument::build_async(document, &self.chunker, Arc::clone(&self.embedder))
                .await
            {
                Ok(Some(indexed)) => indexed,
                Ok(None) => return IngestOutcome::failed("Failed to add document to vector store"),
                Err(e) => {
                    error!("Error adding document: {}", e);
                    return IngestOutcome::failed(format!("Error adding document: {}", e));
                }
            };

        let chunks = indexed.chunks.len();
        match session.insert_document(generation, indexed).await {
            Ok(true) => {
                let ocr = if ocr_used { " (OCR was used)" } else { "" };
                info!(
                    session = %session.id(),
                    chunks,
                    "Document '{}' added to the knowledge base{}.",
                    source,
                    ocr
                );
                IngestOutcome::added(chunks, ocr_used)
            }
            Ok(false) => {
                info!(session = %session.id(), "Knowledge base was reset during upload of '{}'", source);
                IngestOutcome::failed("Knowledge base was reset during upload")
            }
            Err(e) => {
                error!("Error adding document: {}", e);
                IngestOutcome::failed(format!("Error adding document: {}", e))
            }
        }
    }
}

fn cancelled() -> Answer {
    debug!("Session reset while the query was in flight");
    Answer {
        text: String::new(),
        tokens: 0,
        route: Route::Cancelled,
        recorded: false,
    }
}

fn apology(route: Route, e: LlmError) -> Answer {
    error!("Error generating response: {}", e);
    Answer {
        text: format!("I apologize, but I encountered an error: {}", e),
        tokens: 0,
        route,
        recorded: false,
    }
}
