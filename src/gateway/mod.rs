//! AI gateway abstraction for Westline
//!
//! This module defines the [`AiGateway`] trait the chat core talks to, the
//! structured events a streamed reply is made of, and the Gemini
//! implementation.

pub mod gemini;
pub mod logo;
pub mod persona;
pub mod sse;

pub use gemini::GeminiGateway;

use crate::audio::SpeechAudio;
use crate::config::GatewayConfig;
use crate::error::{Result, WestlineError};
use crate::models::{AspectRatio, Aura, ImageAttachment, LearningLevel, Voice};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// One piece of a streamed reply
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text to append to the reply
    TextFragment(String),

    /// A static asset that replaces the reply text; later fragments are
    /// ignored
    AssetAttachment {
        /// Text shown with the asset
        caption: String,
        /// The asset itself
        image: ImageAttachment,
    },
}

/// Lazy stream of reply events; an `Err` item ends the reply as failed
pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// Speaker of a prior turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRole {
    /// The user
    User,
    /// The assistant
    Model,
}

impl HistoryRole {
    /// Role name on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// A prior turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    /// Who spoke
    pub role: HistoryRole,
    /// What was said
    pub text: String,
}

/// Everything needed to request one streamed reply
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// The new user prompt (final turn)
    pub prompt: String,
    /// Prior turns, oldest first
    pub history: Vec<HistoryTurn>,
    /// Persona flavor
    pub aura: Aura,
    /// Selects the premium model tier
    pub premium: bool,
    /// Tone and depth of the answer
    pub learning_level: LearningLevel,
}

/// Generative AI backend
///
/// Non-streaming calls return `Ok(None)` when the model answered but
/// produced nothing usable (for example an image request that came back
/// text-only); transport and API failures are `Err`.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Open a streamed chat reply
    async fn stream_response(&self, request: ChatRequest) -> Result<EventStream>;

    /// Ask for a short conversation title for `first_message`
    async fn generate_title(&self, first_message: &str) -> Result<String>;

    /// Ask for a list of short strings for `prompt` (JSON array of strings)
    async fn generate_json_list(&self, prompt: &str) -> Result<Vec<String>>;

    /// Generate an image from text
    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<Option<ImageAttachment>>;

    /// Edit `image` according to `prompt`
    async fn edit_image(
        &self,
        image: &ImageAttachment,
        prompt: &str,
    ) -> Result<Option<ImageAttachment>>;

    /// Synthesize `text` as speech with `voice`
    async fn synthesize_speech(&self, text: &str, voice: Voice) -> Result<Option<SpeechAudio>>;
}

/// Create a gateway instance based on configuration
///
/// # Errors
///
/// Returns error if the gateway type is unknown or initialization fails
pub fn create_gateway(config: &GatewayConfig) -> Result<Arc<dyn AiGateway>> {
    match config.gateway_type.as_str() {
        "gemini" => Ok(Arc::new(GeminiGateway::new(config.gemini.clone())?)),
        other => Err(WestlineError::Gateway(format!("Unknown gateway type: {}", other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;

    #[test]
    fn test_create_gateway_rejects_unknown_type() {
        let config = GatewayConfig {
            gateway_type: "other".to_string(),
            gemini: GeminiConfig::default(),
        };
        let err = create_gateway(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown gateway type"));
    }

    #[test]
    fn test_create_gemini_gateway() {
        let mut gemini = GeminiConfig::default();
        gemini.api_key = Some("test-key".to_string());
        let config = GatewayConfig {
            gateway_type: "gemini".to_string(),
            gemini,
        };
        assert!(create_gateway(&config).is_ok());
    }

    #[test]
    fn test_history_role_names() {
        assert_eq!(HistoryRole::User.as_str(), "user");
        assert_eq!(HistoryRole::Model.as_str(), "model");
    }
}
