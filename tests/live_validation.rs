use std::{env, sync::Once};

use docqa::{
    config, embedding,
    generation::{self, AnswerModel},
    processing::DocumentQaService,
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("QDRANT_URL", "http://127.0.0.1:6333");
        set_default_env("QDRANT_COLLECTION_NAME", "docqa");
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "all-minilm");
        set_default_env("EMBEDDING_DIMENSION", "384");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        set_default_env("LLM_MODEL", "llama3");
        config::init_config().expect("live configuration");
    });
}

#[tokio::test]
#[ignore = "Requires live Qdrant"]
async fn live_qdrant_status() {
    init_config_once();
    let service = DocumentQaService::new().expect("service");
    let status = service.status().await;
    assert!(status.qdrant_reachable, "Qdrant should be reachable: {status:?}");
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_roundtrip() {
    init_config_once();
    let client = embedding::get_embedding_client().expect("embedding client");
    let vectors = client
        .generate_embeddings(vec!["docqa live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input chunk");
    let dimension = config::get_config().embedding_dimension;
    assert_eq!(vectors[0].len(), dimension, "embedding dimension mismatch");
}

#[tokio::test]
#[ignore = "Requires live Ollama model"]
async fn live_ollama_generation() {
    init_config_once();
    let model = generation::get_answer_model().expect("answer model");
    let answer = model
        .generate("Reply with the single word: ready")
        .await
        .expect("generation");
    assert!(!answer.is_empty());
}
