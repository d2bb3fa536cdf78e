//! Fake collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use docqa::chunking::Chunker;
use docqa::config::AssistantConfig;
use docqa::conversation::Turn;
use docqa::embedding::{EmbeddingError, EmbeddingProvider, HashingEmbedder};
use docqa::extraction::{DocumentExtractor, Extraction};
use docqa::llm::{LanguageModel, LlmError};
use docqa::retrieval::Router;
use docqa::security::SecurityGate;
use docqa::session::Session;
use docqa::websearch::{WebResult, WebSearch};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const DIM: usize = 128;

/// Hashing embedder that counts calls and can refuse single-text queries
///
/// Embedding runs on the blocking pool, so a gated batch waits on a std
/// channel rather than an async `Notify`.
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    fail_queries: bool,
    gate_batches: bool,
    pub query_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub batch_entered: Notify,
    release_tx: Mutex<Sender<()>>,
    release_rx: Mutex<Receiver<()>>,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        let (release_tx, release_rx) = mpsc::channel();
        Self {
            inner: HashingEmbedder::new(DIM),
            fail_queries: false,
            gate_batches: false,
            query_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            batch_entered: Notify::new(),
            release_tx: Mutex::new(release_tx),
            release_rx: Mutex::new(release_rx),
        }
    }

    /// Signals `batch_entered` on every batch, then waits for `release_batch`
    pub fn gated_batches() -> Self {
        Self {
            gate_batches: true,
            ..Self::new()
        }
    }

    pub fn release_batch(&self) {
        let _ = self.release_tx.lock().unwrap().send(());
    }

    /// Embeds documents normally but fails every query embedding
    pub fn failing_queries() -> Self {
        Self {
            fail_queries: true,
            ..Self::new()
        }
    }

    pub fn queries(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for CountingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries {
            return Err(EmbeddingError::GenerationError("model unavailable".to_string()));
        }
        self.inner.embed(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.gate_batches {
            self.batch_entered.notify_one();
            let _ = self.release_rx.lock().unwrap().recv();
        }
        self.inner.embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "counting"
    }
}

/// Web search returning canned results; can block until released
pub struct FakeWeb {
    results: Vec<WebResult>,
    blocking: bool,
    pub calls: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
    pub entered: Notify,
    pub release: Notify,
}

impl FakeWeb {
    pub fn new(results: Vec<WebResult>) -> Self {
        Self {
            results,
            blocking: false,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn blocking(results: Vec<WebResult>) -> Self {
        Self {
            blocking: true,
            ..Self::new(results)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for FakeWeb {
    async fn search(&self, query: &str, max_results: usize) -> Vec<WebResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        if self.blocking {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.results.iter().take(max_results).cloned().collect()
    }
}

pub enum Behavior {
    Reply(String),
    /// Reply with the last turn of the history it was given
    Echo,
    Fail,
    Hang,
    /// Signal `entered`, then wait for `release` before replying
    WaitForRelease(String),
}

/// Language model with scripted behavior that records every history it sees
pub struct FakeModel {
    behavior: Behavior,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<Vec<Turn>>>,
    pub entered: Notify,
    pub release: Notify,
}

impl FakeModel {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(Behavior::Reply(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, history: &[Turn]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(history.to_vec());

        match &self.behavior {
            Behavior::Reply(text) => Ok(text.clone()),
            Behavior::Echo => Ok(history.last().map(|t| t.text.clone()).unwrap_or_default()),
            Behavior::Fail => Err(LlmError::Api {
                status: 500,
                message: "boom".to_string(),
            }),
            Behavior::Hang => Ok(std::future::pending::<String>().await),
            Behavior::WaitForRelease(text) => {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(text.clone())
            }
        }
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

/// Extractor returning fixed text for every file
pub struct FakeExtractor {
    extraction: Extraction,
}

impl FakeExtractor {
    pub fn new(text: &str, ocr_used: bool) -> Self {
        Self {
            extraction: Extraction {
                text: text.to_string(),
                ocr_used,
            },
        }
    }
}

#[async_trait]
impl DocumentExtractor for FakeExtractor {
    async fn extract(&self, _path: &Path) -> Extraction {
        self.extraction.clone()
    }
}

pub struct Harness {
    pub router: Arc<Router>,
    pub embedder: Arc<CountingEmbedder>,
    pub web: Arc<FakeWeb>,
}

pub struct HarnessBuilder {
    embedder: CountingEmbedder,
    web: FakeWeb,
    extractor: Arc<dyn DocumentExtractor>,
    top_k: usize,
    llm_timeout: Duration,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            embedder: CountingEmbedder::new(),
            web: FakeWeb::empty(),
            extractor: Arc::new(FakeExtractor::new("", false)),
            top_k: 3,
            llm_timeout: Duration::from_secs(5),
        }
    }

    pub fn embedder(mut self, embedder: CountingEmbedder) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn web(mut self, web: FakeWeb) -> Self {
        self.web = web;
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn build(self) -> Harness {
        let assistant = AssistantConfig::default();
        let embedder = Arc::new(self.embedder);
        let web = Arc::new(self.web);
        let router = Router::new(
            embedder.clone(),
            web.clone(),
            self.extractor,
            SecurityGate::with_default_rules(&assistant).unwrap(),
            Chunker::new(200, 20).unwrap(),
            assistant,
            self.top_k,
            3,
            self.llm_timeout,
        );

        Harness {
            router: Arc::new(router),
            embedder,
            web,
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::new().build()
}

pub fn session(credential: &str, model: &Arc<FakeModel>) -> Arc<Session> {
    Arc::new(Session::new(credential, model.clone(), DIM))
}
