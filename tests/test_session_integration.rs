//! Session isolation, query serialization and reset during in-flight work

mod common;

use common::{harness, session, Behavior, CountingEmbedder, FakeModel, FakeWeb, HarnessBuilder, DIM};
use docqa::conversation::Role;
use docqa::knowledge::Document;
use docqa::llm::LanguageModel;
use docqa::retrieval::Route;
use docqa::session::{ModelFactory, SessionManager};
use std::sync::Arc;

#[tokio::test]
async fn test_sessions_are_isolated_under_concurrent_ingestion() {
    let h = harness();
    let model_a = Arc::new(FakeModel::new(Behavior::Echo));
    let model_b = Arc::new(FakeModel::new(Behavior::Echo));
    let a = session("key-a", &model_a);
    let b = session("key-b", &model_b);

    let (outcome_a, outcome_b) = tokio::join!(
        h.router.ingest_document(
            &a,
            Document::new("Alpha reactor coolant runs at forty degrees.", "alpha.txt", false)
        ),
        h.router.ingest_document(
            &b,
            Document::new("Beta orchard harvests apples in October.", "beta.txt", false)
        ),
    );
    assert!(outcome_a.success && outcome_b.success);

    let (answer_a, answer_b) = tokio::join!(
        h.router.answer(&a, "Tell me about the contents"),
        h.router.answer(&b, "Tell me about the contents"),
    );

    assert!(answer_a.text.contains("Alpha reactor"));
    assert!(!answer_a.text.contains("Beta orchard"));
    assert!(answer_b.text.contains("Beta orchard"));
    assert!(!answer_b.text.contains("Alpha reactor"));

    assert_eq!(a.document_count().await, 1);
    assert_eq!(b.document_count().await, 1);
    assert_eq!(a.history().await.len(), 2);
    assert_eq!(b.history().await.len(), 2);
    assert_eq!(model_a.calls(), 1);
    assert_eq!(model_b.calls(), 1);
}

#[tokio::test]
async fn test_reset_of_one_session_leaves_others() {
    let h = harness();
    let model = Arc::new(FakeModel::replying("ok"));
    let a = session("key-a", &model);
    let b = session("key-b", &model);
    for s in [&a, &b] {
        h.router
            .ingest_document(s, Document::new("Shared wording.", "doc.txt", false))
            .await;
        h.router.answer(s, "What does it say?").await;
    }

    a.reset().await;

    assert_eq!(a.chunk_count().await, 0);
    assert!(a.history().await.is_empty());
    assert_eq!(b.chunk_count().await, 1);
    assert_eq!(b.history().await.len(), 2);

    let answer = h.router.answer(&a, "What does it say?").await;
    assert_eq!(answer.route, Route::EmptyKnowledgeBase);
}

#[tokio::test]
async fn test_concurrent_questions_are_serialized() {
    let h = harness();
    let model = Arc::new(FakeModel::new(Behavior::Echo));
    let s = session("key", &model);
    h.router
        .ingest_document(&s, Document::new("Some shared facts.", "doc.txt", false))
        .await;

    let (first, second) = tokio::join!(
        h.router.answer(&s, "First question?"),
        h.router.answer(&s, "Second question?"),
    );
    assert!(first.recorded && second.recorded);

    // Turns never interleave: each prompt is followed by its own reply
    let history = s.history().await;
    assert_eq!(history.len(), 4);
    for pair in history.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
        assert_eq!(pair[0].text, pair[1].text);
    }
}

#[tokio::test]
async fn test_reply_after_reset_is_not_recorded() {
    let h = harness();
    let model = Arc::new(FakeModel::new(Behavior::WaitForRelease(
        "Late answer.".to_string(),
    )));
    let s = session("key", &model);
    h.router
        .ingest_document(&s, Document::new("Old document.", "old.txt", false))
        .await;

    let router = h.router.clone();
    let in_flight = s.clone();
    let task = tokio::spawn(async move { router.answer(&in_flight, "What is in it?").await });

    model.entered.notified().await;
    s.reset().await;
    model.release.notify_one();

    let answer = task.await.unwrap();
    assert_eq!(answer.text, "Late answer.");
    assert!(!answer.recorded);

    assert!(s.history().await.is_empty());
    assert_eq!(s.tokens_used().await, 0);
    assert_eq!(s.generation().await, 1);
}

#[tokio::test]
async fn test_reset_before_prompt_cancels_query() {
    let h = HarnessBuilder::new()
        .embedder(CountingEmbedder::failing_queries())
        .web(FakeWeb::blocking(Vec::new()))
        .build();
    let model = Arc::new(FakeModel::replying("never"));
    let s = session("key", &model);
    h.router
        .ingest_document(&s, Document::new("Old document.", "old.txt", false))
        .await;

    let router = h.router.clone();
    let in_flight = s.clone();
    let task = tokio::spawn(async move { router.answer(&in_flight, "What is in it?").await });

    h.web.entered.notified().await;
    s.reset().await;
    h.web.release.notify_one();

    let answer = task.await.unwrap();
    assert_eq!(answer.route, Route::Cancelled);
    assert!(!answer.recorded);
    assert_eq!(model.calls(), 0);
    assert!(s.history().await.is_empty());
}

#[tokio::test]
async fn test_reset_during_ingestion_discards_document() {
    let h = HarnessBuilder::new()
        .embedder(CountingEmbedder::gated_batches())
        .build();
    let model = Arc::new(FakeModel::replying("unused"));
    let s = session("key", &model);

    let router = h.router.clone();
    let uploading = s.clone();
    let task = tokio::spawn(async move {
        router
            .ingest_document(
                &uploading,
                Document::new("Quarterly revenue grew by nine percent.", "q3.txt", false),
            )
            .await
    });

    h.embedder.batch_entered.notified().await;
    s.reset().await;
    h.embedder.release_batch();

    let outcome = task.await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.message, "Knowledge base was reset during upload");
    assert_eq!(s.chunk_count().await, 0);
    assert_eq!(s.document_count().await, 0);
    assert_eq!(s.generation().await, 1);
}

#[tokio::test]
async fn test_session_manager_partitions_by_credential() {
    let model = Arc::new(FakeModel::replying("ok"));
    let factory_model = model.clone();
    let factory: ModelFactory =
        Arc::new(move |_: &str| factory_model.clone() as Arc<dyn LanguageModel>);
    let mut manager = SessionManager::new(factory, DIM);

    let h = harness();
    let a = manager.get_or_create("key-a");
    h.router
        .ingest_document(&a, Document::new("Only in A.", "a.txt", false))
        .await;

    let b = manager.get_or_create("key-b");
    assert_eq!(b.chunk_count().await, 0);
    assert_eq!(manager.get_or_create("key-a").chunk_count().await, 1);
    assert_eq!(manager.len(), 2);
}
