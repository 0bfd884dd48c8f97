// Tests for the Retriever pipeline: over-fetch, filter, rerank, truncate

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use tempfile::TempDir;

use session_rag::rag::errors::RagError;
use session_rag::{
    Chunk, Embedding, EmbeddingProvider, Modality, Retriever, SessionVectorStore, UpsertItem,
};

const DIM: usize = 4;

/// Deterministic embedder: returns pre-registered vectors by exact text.
struct StaticEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

impl StaticEmbedder {
    fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect(),
        }
    }
}

impl EmbeddingProvider for StaticEmbedder {
    fn embed_text(&self, text: &str) -> Result<Embedding, RagError> {
        self.vectors
            .get(text)
            .cloned()
            .map(Embedding::new)
            .ok_or_else(|| RagError::Embedding(format!("no vector registered for {:?}", text)))
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

fn store_at(dir: &TempDir) -> Arc<SessionVectorStore> {
    Arc::new(SessionVectorStore::with_storage(
        DIM,
        dir.path().to_path_buf(),
        8,
    ))
}

/// Unit vector at `angle` radians in the first two dimensions; cosine
/// against `axis(0.0)` is `cos(angle)`, giving exact raw scores.
fn at_angle(angle: f32) -> Vec<f32> {
    vec![angle.cos(), angle.sin(), 0.0, 0.0]
}

fn text_item(embedding: Vec<f32>, content: &str, file_name: &str) -> UpsertItem {
    UpsertItem {
        embedding: Embedding::new(embedding),
        chunk: Chunk::new(content, file_name, Modality::Text),
    }
}

fn image_item(embedding: Vec<f32>, content: &str, file_name: &str) -> UpsertItem {
    UpsertItem {
        embedding: Embedding::new(embedding),
        chunk: Chunk::new(content, file_name, Modality::Image),
    }
}

#[test]
fn test_missing_chat_id_returns_empty() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let embedder = Arc::new(StaticEmbedder::new(&[("q", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    let results = retriever.retrieve("q", None, 5, None, 0.0, None).unwrap();
    assert!(results.is_empty());
    let results = retriever
        .retrieve("q", Some("  "), 5, None, 0.0, None)
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_threshold_applies_to_raw_score() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .upsert(
            vec![
                text_item(at_angle(0.1), "close match", "a.txt"),
                // Raw score ~0.2; the verbatim-content boost of +0.10
                // must not rescue it past a 0.25 threshold.
                text_item(at_angle(1.369), "the query text", "b.txt"),
            ],
            "chat-1",
        )
        .unwrap();

    let embedder = Arc::new(StaticEmbedder::new(&[("the query text", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    let results = retriever
        .retrieve("the query text", Some("chat-1"), 5, None, 0.25, None)
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata.content, "close match");
    for r in &results {
        assert!(r.score >= 0.25);
    }
}

#[test]
fn test_unreachable_threshold_returns_empty_not_error() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .upsert(vec![text_item(at_angle(0.5), "something", "a.txt")], "chat-1")
        .unwrap();

    let embedder = Arc::new(StaticEmbedder::new(&[("q", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    let results = retriever
        .retrieve("q", Some("chat-1"), 5, None, 0.9999, None)
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_content_match_boost_reorders() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .upsert(
            vec![
                // Raw ~0.995 without the query text in the content.
                text_item(at_angle(0.1), "unrelated prose", "a.txt"),
                // Raw ~0.98 but contains the query verbatim: +0.10.
                text_item(at_angle(0.2), "notes about rust lifetimes here", "b.txt"),
            ],
            "chat-1",
        )
        .unwrap();

    let embedder = Arc::new(StaticEmbedder::new(&[("Rust Lifetimes", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    let results = retriever
        .retrieve("Rust Lifetimes", Some("chat-1"), 2, None, 0.0, None)
        .unwrap();

    assert_eq!(results[0].metadata.content, "notes about rust lifetimes here");
    assert!(results[0].rerank_score > results[0].score);
    // Raw ordering is preserved in the score field.
    assert!(results[0].score < results[1].score);
}

#[test]
fn test_file_name_token_boost() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .upsert(
            vec![
                text_item(at_angle(0.1), "first", "other.pdf"),
                text_item(at_angle(0.15), "second", "budget-report.pdf"),
            ],
            "chat-1",
        )
        .unwrap();

    let embedder = Arc::new(StaticEmbedder::new(&[("budget summary", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    let results = retriever
        .retrieve("budget summary", Some("chat-1"), 2, None, 0.0, None)
        .unwrap();

    // +0.05 for the "budget" token outweighs the small raw deficit.
    assert_eq!(results[0].metadata.file_name, "budget-report.pdf");
}

#[test]
fn test_image_modality_boost_breaks_near_ties() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .upsert(
            vec![
                text_item(at_angle(0.1), "caption text", "page.txt"),
                image_item(at_angle(0.12), "figure caption", "figure.png"),
            ],
            "chat-1",
        )
        .unwrap();

    let embedder = Arc::new(StaticEmbedder::new(&[("q", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    let results = retriever
        .retrieve("q", Some("chat-1"), 2, None, 0.0, None)
        .unwrap();
    assert_eq!(results[0].metadata.modality, Modality::Image);
}

#[test]
fn test_modality_filter() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .upsert(
            vec![
                text_item(at_angle(0.0), "text chunk", "a.txt"),
                image_item(at_angle(0.1), "image chunk", "b.png"),
            ],
            "chat-1",
        )
        .unwrap();

    let embedder = Arc::new(StaticEmbedder::new(&[("q", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    let results = retriever
        .retrieve("q", Some("chat-1"), 5, Some(Modality::Image), 0.0, None)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata.modality, Modality::Image);
}

#[test]
fn test_session_files_filter() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .upsert(
            vec![
                text_item(at_angle(0.0), "selected", "wanted.txt"),
                text_item(at_angle(0.1), "excluded", "other.txt"),
            ],
            "chat-1",
        )
        .unwrap();

    let embedder = Arc::new(StaticEmbedder::new(&[("q", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    let allowed: HashSet<String> = ["wanted.txt".to_string()].into_iter().collect();
    let results = retriever
        .retrieve("q", Some("chat-1"), 5, None, 0.0, Some(&allowed))
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata.file_name, "wanted.txt");
}

#[test]
fn test_truncates_to_top_k() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let items: Vec<UpsertItem> = (0..10)
        .map(|i| text_item(at_angle(0.05 * i as f32), &format!("doc {}", i), "f.txt"))
        .collect();
    store.upsert(items, "chat-1").unwrap();

    let embedder = Arc::new(StaticEmbedder::new(&[("q", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    let results = retriever
        .retrieve("q", Some("chat-1"), 3, None, 0.0, None)
        .unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].metadata.content, "doc 0");
}

#[test]
fn test_extreme_top_k_does_not_overflow() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .upsert(
            vec![
                text_item(at_angle(0.0), "one", "f.txt"),
                text_item(at_angle(0.1), "two", "f.txt"),
            ],
            "chat-1",
        )
        .unwrap();

    let embedder = Arc::new(StaticEmbedder::new(&[("q", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    // Over-fetch saturates instead of overflowing on a huge top_k.
    let results = retriever
        .retrieve("q", Some("chat-1"), usize::MAX, None, 0.0, None)
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn test_empty_session_returns_empty() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let embedder = Arc::new(StaticEmbedder::new(&[("q", at_angle(0.0))]));
    let retriever = Retriever::new(store, embedder);

    let results = retriever
        .retrieve("q", Some("never-ingested"), 5, None, 0.0, None)
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_wrong_dimension_query_degrades_to_empty() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    store
        .upsert(vec![text_item(at_angle(0.0), "content", "a.txt")], "chat-1")
        .unwrap();

    // Embedder hands back a vector of the wrong length; retrieval
    // degrades to "no results" instead of failing the call.
    let embedder = Arc::new(StaticEmbedder::new(&[("q", vec![1.0; DIM * 2])]));
    let retriever = Retriever::new(store, embedder);

    let results = retriever
        .retrieve("q", Some("chat-1"), 5, None, 0.0, None)
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_embedder_failure_propagates() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir);
    let embedder = Arc::new(StaticEmbedder::new(&[]));
    let retriever = Retriever::new(store, embedder);

    let err = retriever
        .retrieve("unregistered", Some("chat-1"), 5, None, 0.0, None)
        .unwrap_err();
    assert_eq!(err.error_code(), "EMBEDDING_FAILED");
}
