extern crate finrag;

mod common;

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;

use common::{HashEmbedder, sample_chunks};
use finrag::config::{
    DEFAULT_CHAT_API_VERSION, DEFAULT_EMBEDDING_DEPLOYMENT, DEFAULT_TOP_K, EmbeddingProvider,
};
use finrag::frontend::{self, App, SETUP_REQUIRED};
use finrag::{Answer, DataLayout, IndexBuilder, RAGError, Result, Settings};

struct Echo {
    calls: usize,
}

impl Answer for Echo {
    fn answer(&mut self, question: &str) -> Result<String> {
        self.calls += 1;
        if question.contains("boom") {
            return Err(RAGError::Generation("connection reset".to_string()));
        }
        Ok(format!("echo: {question}"))
    }
}

fn settings(pairs: &[(&str, &str)]) -> Settings {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Settings::from_lookup(|key| map.get(key).cloned())
}

fn session(app: &mut App, input: &str) -> String {
    let mut out = Vec::new();
    frontend::run(app, Cursor::new(input.as_bytes()), &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_questions_answered_in_order() {
    let mut app = App::Ready(Box::new(Echo { calls: 0 }));
    let out = session(&mut app, "first?\n\n   \nboom\nquit\nnever asked\n");

    let first = out.find("Answer\necho: first?").unwrap();
    let second = out.find("Error: Answer generation failed: connection reset").unwrap();
    assert!(first < second);
    assert!(!out.contains("never asked"));
}

#[test]
fn test_setup_required_disables_questions() {
    let mut app = App::SetupRequired(SETUP_REQUIRED.to_string());
    assert!(!app.is_ready());
    let out = session(&mut app, "What is the revenue?\n");
    assert_eq!(out.trim(), SETUP_REQUIRED);
}

#[test]
fn test_initialize_without_index() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let settings = settings(&[
        ("FINRAG_EMBEDDING_PROVIDER", "azure"),
        ("AZURE_OPENAI_ENDPOINT", "https://example.invalid"),
        ("AZURE_OPENAI_API_KEY", "test-key"),
    ]);
    match App::initialize(&settings, &layout) {
        App::SetupRequired(msg) => assert_eq!(msg, SETUP_REQUIRED),
        App::Ready(_) => panic!("no index exists"),
    }
}

#[test]
fn test_initialize_with_partial_index() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let settings = settings(&[
        ("FINRAG_EMBEDDING_PROVIDER", "azure"),
        ("AZURE_OPENAI_ENDPOINT", "https://example.invalid"),
        ("AZURE_OPENAI_API_KEY", "test-key"),
    ]);
    let mut embedder = HashEmbedder::new(DEFAULT_EMBEDDING_DEPLOYMENT);
    IndexBuilder::new(&layout.index_dir)
        .rebuild(&sample_chunks(), &mut embedder)
        .unwrap();
    assert!(App::initialize(&settings, &layout).is_ready());

    fs::remove_file(layout.index_dir.join("vectors.bin")).unwrap();
    match App::initialize(&settings, &layout) {
        App::SetupRequired(msg) => assert_eq!(msg, SETUP_REQUIRED),
        App::Ready(_) => panic!("vectors.bin is gone"),
    }
}

#[test]
fn test_initialize_without_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let settings = settings(&[("FINRAG_EMBEDDING_PROVIDER", "azure")]);
    match App::initialize(&settings, &layout) {
        App::SetupRequired(msg) => assert!(msg.contains("AZURE_OPENAI_ENDPOINT"), "{msg}"),
        App::Ready(_) => panic!("credentials are missing"),
    }
}

#[test]
fn test_settings_defaults() {
    let s = settings(&[]);
    assert_eq!(s.embedding_provider, EmbeddingProvider::Local);
    assert_eq!(s.embedding_model_name(), "all-MiniLM-L6-v2");
    assert_eq!(s.azure.embedding_deployment, "text-embedding-ada-002");
    assert_eq!(s.azure.embedding_api_version, "2023-05-15");
    assert_eq!(s.azure.chat_deployment, "gpt-4o-mini");
    assert_eq!(s.azure.chat_api_version, DEFAULT_CHAT_API_VERSION);
    assert_eq!(s.top_k, DEFAULT_TOP_K);
    assert!(matches!(
        s.azure.credentials(),
        Err(RAGError::MissingConfig("AZURE_OPENAI_ENDPOINT"))
    ));
}

#[test]
fn test_settings_overrides() {
    let s = settings(&[
        ("AZURE_OPENAI_ENDPOINT", "https://acme.openai.azure.com/"),
        ("OPENAI_API_KEY", "fallback-key"),
        ("AZURE_OPENAI_DEPLOYMENT", "embed-large"),
        ("FINRAG_EMBEDDING_PROVIDER", "Azure"),
        ("FINRAG_TOP_K", "0"),
    ]);
    assert_eq!(s.embedding_model_name(), "embed-large");
    assert_eq!(s.top_k, DEFAULT_TOP_K);
    let (endpoint, key) = s.azure.credentials().unwrap();
    assert_eq!(endpoint, "https://acme.openai.azure.com/");
    assert_eq!(key, "fallback-key");
}
