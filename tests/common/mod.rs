use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;
use westline::config::{Config, GeminiConfig};

pub const TEST_API_KEY: &str = "test-key";

/// Gemini settings pointing at a mock server, one distinct model per role
#[allow(dead_code)]
pub fn gemini_config(api_base: &str) -> GeminiConfig {
    GeminiConfig {
        api_base: api_base.to_string(),
        api_key: Some(TEST_API_KEY.to_string()),
        chat_model: "chat-model".to_string(),
        premium_chat_model: "premium-model".to_string(),
        utility_model: "utility-model".to_string(),
        image_model: "image-model".to_string(),
        speech_model: "speech-model".to_string(),
        request_timeout_seconds: 5,
    }
}

/// Application config over a mock server and a fresh database
#[allow(dead_code)]
pub fn app_config(api_base: &str, db_path: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.gateway.gemini = gemini_config(api_base);
    config.storage.path = Some(db_path.to_string_lossy().to_string());
    config.session.splash_delay_ms = 0;
    config
}

#[allow(dead_code)]
pub fn temp_db() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("westline.db");
    (tmp, db_path)
}

/// A `generateContent` body with a single text part
#[allow(dead_code)]
pub fn text_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] }
        }]
    })
}

/// A `generateContent` body with one inline payload
#[allow(dead_code)]
pub fn inline_response(mime_type: &str, data: &str) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "inlineData": { "mimeType": mime_type, "data": data } }]
            }
        }]
    })
}

/// An SSE body with one event per chunk
#[allow(dead_code)]
pub fn sse_body(chunks: &[&str]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("data: {}\r\n\r\n", text_response(chunk)))
        .collect()
}
