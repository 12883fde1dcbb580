//! Gemini REST gateway
//!
//! Implements [`AiGateway`] over the Gemini `generateContent` and
//! `streamGenerateContent` endpoints. Streaming replies arrive as SSE,
//! are parsed in a background task and flow through a
//! [`LogoMarkerFilter`] on their way out.

use crate::audio::SpeechAudio;
use crate::config::GeminiConfig;
use crate::error::{Result, WestlineError};
use crate::gateway::logo::LogoMarkerFilter;
use crate::gateway::{persona, sse, AiGateway, ChatRequest, EventStream, StreamEvent};
use crate::models::{AspectRatio, ImageAttachment, Voice};

use async_trait::async_trait;
use futures::{future, stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Keyring service holding the API key
pub const KEYRING_SERVICE: &str = "westline";

/// Keyring entry holding the API key
pub const KEYRING_USER: &str = "gemini_api_key";

/// Environment variables consulted for the API key, in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["WESTLINE_API_KEY", "GEMINI_API_KEY"];

/// Gemini API gateway
///
/// # Examples
///
/// ```
/// use westline::config::GeminiConfig;
/// use westline::gateway::GeminiGateway;
///
/// let config = GeminiConfig {
///     api_key: Some("test-key".to_string()),
///     ..Default::default()
/// };
/// let gateway = GeminiGateway::new(config);
/// assert!(gateway.is_ok());
/// ```
pub struct GeminiGateway {
    client: Client,
    config: GeminiConfig,
}

/// Request body shared by all Gemini calls
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<serde_json::Value>,
}

/// One turn of content
#[derive(Debug, Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart::text(text)],
        }
    }
}

/// Text or inline binary part
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

/// Base64 payload with its MIME type
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

/// Response body (also the shape of each streamed chunk)
#[derive(Debug, Deserialize, Default)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiApiError>,
}

#[derive(Debug, Deserialize, Default)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

impl GeminiResponse {
    fn parts(&self) -> impl Iterator<Item = &GeminiPart> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter())
            .into_iter()
            .flatten()
    }

    /// Concatenated text of the first candidate
    fn text(&self) -> String {
        self.parts().filter_map(|p| p.text.as_deref()).collect()
    }

    /// First inline payload of the first candidate
    fn inline_data(&self) -> Option<&InlineData> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }

    fn into_result(self) -> Result<Self> {
        match self.error {
            Some(err) => Err(WestlineError::Gateway(format!(
                "Gemini returned error {}: {}",
                err.code, err.message
            ))
            .into()),
            None => Ok(self),
        }
    }
}

fn format_gemini_api_error(status: reqwest::StatusCode, body: &str) -> WestlineError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        WestlineError::Gateway(format!(
            "Gemini rejected the API key ({}): {}. Set it with `westline key set`",
            status, body
        ))
    } else {
        WestlineError::Gateway(format!("Gemini returned error {}: {}", status, body))
    }
}

/// Parse one streamed chunk into its text
fn chunk_text(data: &str) -> Result<String> {
    let chunk: GeminiResponse = serde_json::from_str(data)
        .map_err(|e| WestlineError::Gateway(format!("Malformed stream chunk: {}", e)))?;
    Ok(chunk.into_result()?.text())
}

/// Store the API key in the OS keyring
pub fn store_api_key(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
    entry.set_password(key)?;
    tracing::info!("Stored Gemini API key in keyring");
    Ok(())
}

/// Remove the API key from the OS keyring (best-effort)
pub fn clear_api_key() -> Result<()> {
    match keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        Ok(entry) => {
            if let Err(e) = entry.delete_password() {
                tracing::warn!("Failed to clear Gemini API key: {}", e);
            } else {
                tracing::info!("Cleared Gemini API key from keyring");
            }
        }
        Err(e) => tracing::warn!("Keyring not available while clearing API key: {}", e),
    }
    Ok(())
}

impl GeminiGateway {
    /// Create a new Gemini gateway
    ///
    /// The API key is resolved lazily on each request, so a gateway can be
    /// built before a key is configured.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("westline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WestlineError::Gateway(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Gemini gateway: base={}, chat_model={}",
            config.api_base,
            config.chat_model
        );

        Ok(Self { client, config })
    }

    /// The configuration this gateway was built with
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Resolve the API key: config, then environment, then OS keyring
    fn api_key(&self) -> Result<String> {
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }

        for var in API_KEY_ENV_VARS {
            if let Ok(key) = std::env::var(var) {
                if !key.is_empty() {
                    return Ok(key);
                }
            }
        }

        match keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).and_then(|e| e.get_password()) {
            Ok(key) if !key.is_empty() => Ok(key),
            Ok(_) | Err(_) => Err(WestlineError::MissingCredentials(
                "no Gemini API key in config, WESTLINE_API_KEY/GEMINI_API_KEY or keyring"
                    .to_string(),
            )
            .into()),
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.api_base.trim_end_matches('/'),
            model,
            method
        )
    }

    async fn post(&self, url: &str, body: &GeminiRequest) -> Result<reqwest::Response> {
        let api_key = self.api_key()?;
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e);
                WestlineError::Gateway(format!("Gemini request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!("Gemini returned error {}: {}", status, text);
            return Err(format_gemini_api_error(status, &text).into());
        }
        Ok(response)
    }

    async fn generate(&self, model: &str, body: GeminiRequest) -> Result<GeminiResponse> {
        let url = self.endpoint(model, "generateContent");
        let response = self.post(&url, &body).await?;
        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| WestlineError::Gateway(format!("Failed to parse Gemini response: {}", e)))?;
        parsed.into_result()
    }

    fn image_from(response: &GeminiResponse) -> Option<ImageAttachment> {
        response
            .inline_data()
            .map(|inline| ImageAttachment::from_base64(inline.mime_type.clone(), &inline.data))
    }
}

#[async_trait]
impl AiGateway for GeminiGateway {
    async fn stream_response(&self, request: ChatRequest) -> Result<EventStream> {
        let model = if request.premium {
            &self.config.premium_chat_model
        } else {
            &self.config.chat_model
        };

        let mut contents: Vec<GeminiContent> = request
            .history
            .iter()
            .map(|turn| GeminiContent::text(Some(turn.role.as_str()), turn.text.clone()))
            .collect();
        contents.push(GeminiContent::text(Some("user"), request.prompt.clone()));

        let body = GeminiRequest {
            contents,
            system_instruction: Some(GeminiContent::text(
                None,
                persona::system_instruction(request.learning_level, request.aura, &request.prompt),
            )),
            generation_config: None,
        };

        let url = format!("{}?alt=sse", self.endpoint(model, "streamGenerateContent"));
        let response = self.post(&url, &body).await?;
        tracing::debug!(
            "Streaming reply from {} ({} history turns)",
            model,
            request.history.len()
        );

        let (data_tx, data_rx) = mpsc::unbounded_channel();
        tokio::spawn(sse::parse_sse_stream(response.bytes_stream(), data_tx));

        let items = UnboundedReceiverStream::new(data_rx)
            .map(Some)
            .chain(stream::once(future::ready(None)));

        let events = items
            .scan(LogoMarkerFilter::new(), |filter, item| {
                let out: Vec<Result<StreamEvent>> = match item {
                    Some(Ok(data)) => match chunk_text(&data) {
                        Ok(text) => filter.push(&text).into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(e)],
                    },
                    Some(Err(e)) => vec![Err(e)],
                    None => filter.finish().into_iter().map(Ok).collect(),
                };
                future::ready(Some(out))
            })
            .flat_map(stream::iter);

        Ok(events.boxed())
    }

    async fn generate_title(&self, first_message: &str) -> Result<String> {
        let body = GeminiRequest {
            contents: vec![GeminiContent::text(
                Some("user"),
                persona::title_prompt(first_message),
            )],
            system_instruction: None,
            generation_config: None,
        };
        let response = self.generate(&self.config.utility_model, body).await?;
        Ok(response.text())
    }

    async fn generate_json_list(&self, prompt: &str) -> Result<Vec<String>> {
        let body = GeminiRequest {
            contents: vec![GeminiContent::text(Some("user"), prompt)],
            system_instruction: None,
            generation_config: Some(json!({
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" }
                }
            })),
        };
        let response = self.generate(&self.config.utility_model, body).await?;
        let text = response.text();
        serde_json::from_str(text.trim()).map_err(|e| {
            WestlineError::Gateway(format!("Expected a JSON array of strings: {}", e)).into()
        })
    }

    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<Option<ImageAttachment>> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::text(prompt)],
            }],
            system_instruction: None,
            generation_config: Some(json!({
                "imageConfig": { "aspectRatio": aspect_ratio.as_str() }
            })),
        };
        let response = self.generate(&self.config.image_model, body).await?;
        let image = Self::image_from(&response);
        if image.is_none() {
            tracing::warn!("Image model answered without an image");
        }
        Ok(image)
    }

    async fn edit_image(
        &self,
        image: &ImageAttachment,
        prompt: &str,
    ) -> Result<Option<ImageAttachment>> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![
                    GeminiPart::inline(image.mime_type.clone(), image.base64_payload()),
                    GeminiPart::text(prompt),
                ],
            }],
            system_instruction: None,
            generation_config: None,
        };
        let response = self.generate(&self.config.image_model, body).await?;
        let edited = Self::image_from(&response);
        if edited.is_none() {
            tracing::warn!("Image model answered an edit without an image");
        }
        Ok(edited)
    }

    async fn synthesize_speech(&self, text: &str, voice: Voice) -> Result<Option<SpeechAudio>> {
        let body = GeminiRequest {
            contents: vec![GeminiContent::text(None, text)],
            system_instruction: None,
            generation_config: Some(json!({
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice.as_str() }
                    }
                }
            })),
        };
        let response = self.generate(&self.config.speech_model, body).await?;
        response
            .inline_data()
            .map(|inline| SpeechAudio::from_base64(&inline.data))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_gateway() -> GeminiGateway {
        GeminiGateway::new(GeminiConfig {
            api_base: "http://localhost:9/".to_string(),
            api_key: Some("test-key".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let gateway = test_gateway();
        assert_eq!(
            gateway.endpoint("gemini-2.5-flash", "generateContent"),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_api_key_from_config_wins() {
        assert_eq!(test_gateway().api_key().unwrap(), "test-key");
    }

    #[test]
    fn test_chunk_text_joins_parts() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#;
        assert_eq!(chunk_text(data).unwrap(), "Hello");
    }

    #[test]
    fn test_chunk_text_without_candidates_is_empty() {
        assert_eq!(chunk_text(r#"{"usageMetadata":{}}"#).unwrap(), "");
    }

    #[test]
    fn test_chunk_text_reports_api_error() {
        let data = r#"{"error":{"code":429,"message":"quota"}}"#;
        let err = chunk_text(data).unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::inline("image/png", "AAAA"), GeminiPart::text("hi")],
            }],
            system_instruction: Some(GeminiContent::text(None, "sys")),
            generation_config: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(value.get("generationConfig").is_none());
        assert!(value["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn test_format_api_error_mentions_key_on_401() {
        let err = format_gemini_api_error(reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert!(err.to_string().contains("westline key set"));
        let err = format_gemini_api_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_image_from_response() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"here"},{"inlineData":{"mimeType":"image/png","data":"iVBO"}}]}}]}"#,
        )
        .unwrap();
        let image = GeminiGateway::image_from(&response).unwrap();
        assert_eq!(image.data, "data:image/png;base64,iVBO");
    }
}
