//! Test utilities for Westline
//!
//! This module provides common test helpers: temporary directories, error
//! assertions, a test configuration and [`FakeGateway`], a scripted
//! [`AiGateway`] that records what it was asked.

use crate::audio::SpeechAudio;
use crate::config::Config;
use crate::error::{Result, WestlineError};
use crate::gateway::{AiGateway, ChatRequest, EventStream, StreamEvent};
use crate::models::{AspectRatio, ImageAttachment, Voice};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use crate::storage::{KeyValueStore, MemoryStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// # Panics
///
/// Panics if the directory cannot be created
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Default configuration without the splash delay
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.session.splash_delay_ms = 0;
    config
}

/// In-memory store whose writes can be switched to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_prefix: Mutex<Option<String>>,
}

impl FlakyStore {
    /// Create a store that accepts writes
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `set` fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        *self.failing_prefix.lock().unwrap() = fail.then(String::new);
    }

    /// Make writes to keys starting with `prefix` fail
    pub fn fail_writes_under(&self, prefix: &str) {
        *self.failing_prefix.lock().unwrap() = Some(prefix.to_string());
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let failing = self
            .failing_prefix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix));
        if failing {
            return Err(WestlineError::Storage(format!("write to {} refused", key)).into());
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }
}

/// A scripted stream item: an event or a transport failure message
pub type ScriptedItem = std::result::Result<StreamEvent, String>;

/// Scripted gateway
///
/// Each call to `stream_response` pops the next script; with no scripts
/// left it streams a single fixed fragment.
#[derive(Default)]
pub struct FakeGateway {
    scripts: Mutex<VecDeque<Option<Vec<ScriptedItem>>>>,
    title: Option<String>,
    json_list: Option<Vec<String>>,
    image: Option<ImageAttachment>,
    speech: Option<SpeechAudio>,
    requests: Mutex<Vec<ChatRequest>>,
    image_prompts: Mutex<Vec<String>>,
    json_prompts: Mutex<Vec<String>>,
    speech_calls: AtomicUsize,
}

/// Text streamed when no script is queued
pub const DEFAULT_REPLY: &str = "Hello from Westline";

impl FakeGateway {
    /// A gateway whose optional calls all fail
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a stream script
    pub fn with_stream(self, items: Vec<ScriptedItem>) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .push_back(Some(items));
        self
    }

    /// Queue a stream that fails to open
    pub fn with_open_failure(self) -> Self {
        self.scripts.lock().expect("scripts lock").push_back(None);
        self
    }

    /// Title returned by `generate_title`
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// List returned by `generate_json_list`
    pub fn with_json_list(mut self, items: &[&str]) -> Self {
        self.json_list = Some(items.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Image returned by image generation and editing
    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }

    /// Audio returned by speech synthesis
    pub fn with_speech(mut self, audio: SpeechAudio) -> Self {
        self.speech = Some(audio);
        self
    }

    /// Chat requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Image prompts received so far
    pub fn image_prompts(&self) -> Vec<String> {
        self.image_prompts.lock().expect("prompts lock").clone()
    }

    /// JSON-list prompts received so far
    pub fn json_prompts(&self) -> Vec<String> {
        self.json_prompts.lock().expect("prompts lock").clone()
    }

    /// Number of speech synthesis calls
    pub fn speech_calls(&self) -> usize {
        self.speech_calls.load(Ordering::SeqCst)
    }

    fn unavailable(what: &str) -> anyhow::Error {
        WestlineError::Gateway(format!("{} unavailable", what)).into()
    }
}

#[async_trait]
impl AiGateway for FakeGateway {
    async fn stream_response(&self, request: ChatRequest) -> Result<EventStream> {
        self.requests.lock().expect("requests lock").push(request);
        let script = self.scripts.lock().expect("scripts lock").pop_front();
        let items = match script {
            Some(Some(items)) => items,
            Some(None) => return Err(Self::unavailable("stream")),
            None => vec![Ok(StreamEvent::TextFragment(DEFAULT_REPLY.to_string()))],
        };
        let mapped: Vec<Result<StreamEvent>> = items
            .into_iter()
            .map(|item| item.map_err(|e| WestlineError::Gateway(e).into()))
            .collect();
        Ok(stream::iter(mapped).boxed())
    }

    async fn generate_title(&self, _first_message: &str) -> Result<String> {
        self.title.clone().ok_or_else(|| Self::unavailable("title"))
    }

    async fn generate_json_list(&self, prompt: &str) -> Result<Vec<String>> {
        self.json_prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        self.json_list.clone().ok_or_else(|| Self::unavailable("list"))
    }

    async fn generate_image(
        &self,
        prompt: &str,
        _aspect_ratio: AspectRatio,
    ) -> Result<Option<ImageAttachment>> {
        self.image_prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        Ok(self.image.clone())
    }

    async fn edit_image(
        &self,
        _image: &ImageAttachment,
        prompt: &str,
    ) -> Result<Option<ImageAttachment>> {
        self.image_prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        Ok(self.image.clone())
    }

    async fn synthesize_speech(&self, _text: &str, _voice: Voice) -> Result<Option<SpeechAudio>> {
        self.speech_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.speech.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn request() -> ChatRequest {
        ChatRequest {
            prompt: "hi".to_string(),
            history: Vec::new(),
            aura: Default::default(),
            premium: false,
            learning_level: Default::default(),
        }
    }

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    fn test_test_config_is_valid() {
        let config = test_config();
        assert_eq!(config.session.splash_delay_ms, 0);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_fake_gateway_plays_scripts_in_order() {
        let gateway = FakeGateway::new()
            .with_stream(vec![Ok(StreamEvent::TextFragment("one".into()))])
            .with_open_failure();

        let events: Vec<_> = gateway
            .stream_response(request())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(gateway.stream_response(request()).await.is_err());

        let fallback: Vec<_> = gateway
            .stream_response(request())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(
            fallback[0].as_ref().unwrap(),
            &StreamEvent::TextFragment(DEFAULT_REPLY.to_string())
        );
        assert_eq!(gateway.requests().len(), 3);
    }
}
