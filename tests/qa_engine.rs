//! Q&A engine scenarios: evidence gating, degradation, citations.

use std::sync::Arc;

use tempfile::TempDir;

use oya_rs::core::config::{GateMode, OyaConfig};
use oya_rs::core::repository::WikiLayout;
use oya_rs::index::{EmbeddingMetadata, FtsIndex, VectorStore};
use oya_rs::llm::mock::{pseudo_embedding, MockLlmClient};
use oya_rs::qa::{Confidence, QaEngine, SearchQuality};
use oya_rs::store::notes::{NoteScope, NotesStore};
use oya_rs::Repository;

const ANSWER_WITH_CITATIONS: &str = "\
Authentication uses session cookies [1].

[CITATIONS]
path: files/auth-py.md, lines: 3-9
path: files/fabricated.md
";

/// Build a production index holding only authentication pages.
fn indexed_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let layout = WikiLayout::new(dir.path().join(".oya"));

    let vector = VectorStore::open(&layout.vector_dir()).unwrap();
    let fts = FtsIndex::open(&layout.fts_db()).unwrap();

    for (path, content) in [
        (
            "files/auth-py.md",
            "Handles user authentication, login sessions and password checks.",
        ),
        (
            "files/session-py.md",
            "Tracks user authentication login state and session expiry.",
        ),
    ] {
        vector
            .insert(path, path, "file", content, &pseudo_embedding(content))
            .unwrap();
        fts.insert(path, path, "file", content).unwrap();
    }

    EmbeddingMetadata {
        provider: "mock".to_string(),
        model: "mock-embed".to_string(),
        indexed_at: chrono::Utc::now(),
    }
    .write(&layout.embedding_metadata_file())
    .unwrap();

    dir
}

fn engine(dir: &TempDir, config: OyaConfig, llm: MockLlmClient) -> QaEngine {
    let repo = Repository::open(dir.path()).unwrap();
    let mut config = config;
    // The mock provider matches the recorded embedding metadata.
    config.llm.provider = "mock".to_string();
    config.llm.embedding_model = "mock-embed".to_string();
    QaEngine::open(&repo, config, Arc::new(llm)).unwrap()
}

#[tokio::test]
async fn on_topic_question_is_answered_with_citations() {
    let dir = indexed_repo();
    let llm = MockLlmClient::new().with_default_response(ANSWER_WITH_CITATIONS);
    let engine = engine(&dir, OyaConfig::default(), llm);

    let answer = engine
        .ask("how does user authentication and login work?")
        .await
        .unwrap();

    assert_eq!(answer.search_quality, SearchQuality::Full);
    assert!(answer.answer.contains("session cookies"));
    assert!(answer.disclaimer.is_none());
    assert_ne!(answer.confidence, Confidence::Low);

    // The fabricated citation is dropped; the valid one survives.
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].path, "files/auth-py.md");
    assert_eq!(answer.citations[0].lines, Some((3, 9)));

    // Every citation is a prefix of a retrieved path.
    assert!(answer.citations.iter().all(|c| c.path.starts_with("files/")));
}

#[tokio::test]
async fn scenario_f_gated_mode_refuses_off_topic_question() {
    let dir = indexed_repo();
    let llm = MockLlmClient::new().with_default_response("should never be used");
    let engine = engine(&dir, OyaConfig::default(), llm);

    let answer = engine.ask("how is billing processed?").await.unwrap();

    assert_eq!(answer.confidence, Confidence::Low);
    assert!(answer.citations.is_empty());
    assert!(answer.disclaimer.is_some());
    assert!(answer.answer.contains("could not find enough relevant material"));
}

#[tokio::test]
async fn scenario_f_loose_mode_answers_with_disclaimer() {
    let dir = indexed_repo();
    let llm = MockLlmClient::new()
        .with_default_response("Billing is not covered by the wiki.\n\n[CITATIONS]\n");
    let mut config = OyaConfig::default();
    config.retrieval.gate_mode = GateMode::Loose;
    let engine = engine(&dir, config, llm);

    let answer = engine.ask("how is billing processed?").await.unwrap();

    assert_eq!(answer.confidence, Confidence::Low);
    assert!(answer
        .disclaimer
        .as_deref()
        .unwrap()
        .contains("Limited evidence"));
    assert!(answer.answer.contains("not covered"));
}

#[tokio::test]
async fn general_notes_join_retrieval_and_outrank_pages() {
    let dir = indexed_repo();
    let notes = NotesStore::new(dir.path().join(".oya/notes"));
    notes
        .add(
            NoteScope::General,
            "",
            "Authentication is being migrated to OAuth next quarter.",
            None,
        )
        .unwrap();

    let llm = MockLlmClient::new().with_default_response(ANSWER_WITH_CITATIONS);
    let engine = engine(&dir, OyaConfig::default(), llm);

    let answer = engine
        .ask("how does user authentication and login work?")
        .await
        .unwrap();
    // The note participated; the answer still flows through the gate.
    assert_eq!(answer.search_quality, SearchQuality::Full);
    assert!(!answer.citations.is_empty());
}

#[tokio::test]
async fn embedding_model_mismatch_is_surfaced() {
    let dir = indexed_repo();
    let llm = MockLlmClient::new().with_default_response(ANSWER_WITH_CITATIONS);

    let repo = Repository::open(dir.path()).unwrap();
    let mut config = OyaConfig::default();
    config.llm.provider = "other-provider".to_string();
    let engine = QaEngine::open(&repo, config, Arc::new(llm)).unwrap();

    let answer = engine
        .ask("how does user authentication and login work?")
        .await
        .unwrap();
    assert!(answer
        .warnings
        .iter()
        .any(|w| w.contains("embedding model mismatch")));
}
