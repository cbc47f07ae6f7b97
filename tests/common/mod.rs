use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use neochat::storage::{PersistenceGateway, SledStore};

/// Gateway over a sled store in a fresh temporary directory
#[allow(dead_code)]
pub fn create_temp_gateway() -> (PersistenceGateway, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let gateway = open_gateway(&tmp);
    (gateway, tmp)
}

/// Open (or reopen) the sled store inside `dir`
#[allow(dead_code)]
pub fn open_gateway(dir: &TempDir) -> PersistenceGateway {
    let store = SledStore::open(dir.path().join("store")).expect("failed to open sled store");
    PersistenceGateway::new(Arc::new(store), "neo2_")
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Body of a streamed `/api/chat` response carrying `fragments`
#[allow(dead_code)]
pub fn ndjson_chat_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        let line = json!({
            "model": "llama3:8b",
            "message": { "role": "assistant", "content": fragment },
            "done": false
        });
        body.push_str(&line.to_string());
        body.push('\n');
    }
    let last = json!({
        "model": "llama3:8b",
        "message": { "role": "assistant", "content": "" },
        "done": true
    });
    body.push_str(&last.to_string());
    body.push('\n');
    body
}

/// Mount a `/api/chat` mock streaming `fragments`
#[allow(dead_code)]
pub async fn mount_chat(server: &MockServer, fragments: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(ndjson_chat_body(fragments), "application/x-ndjson"),
        )
        .mount(server)
        .await;
}

/// Mount a `/api/tags` mock listing two models
#[allow(dead_code)]
pub async fn mount_tags(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {
                    "name": "llama3:8b",
                    "modified_at": "2024-05-01T10:00:00Z",
                    "size": 1610612736u64,
                    "digest": "sha256:abc",
                    "details": {
                        "family": "llama",
                        "format": "gguf",
                        "parameter_size": "8B",
                        "quantization_level": "Q4_0"
                    }
                },
                {
                    "name": "hf.co/bartowski/Qwen3-4B-GGUF:Q4_K_M",
                    "size": 52428800u64,
                    "details": { "family": "qwen3", "format": "gguf" }
                }
            ]
        })))
        .mount(server)
        .await;
}
