//! Integration tests for the Gemini gateway against a mock HTTP server

mod common;

use common::{gemini_config, inline_response, sse_body, text_response, TEST_API_KEY};
use futures::StreamExt;
use serial_test::serial;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use westline::gateway::logo::LOGO_CAPTION;
use westline::gateway::{AiGateway, ChatRequest, GeminiGateway, HistoryRole, HistoryTurn, StreamEvent};
use westline::models::{AspectRatio, Aura, ImageAttachment, LearningLevel, Voice};

fn request(prompt: &str, premium: bool) -> ChatRequest {
    ChatRequest {
        prompt: prompt.to_string(),
        history: vec![
            HistoryTurn {
                role: HistoryRole::User,
                text: "Earlier question".to_string(),
            },
            HistoryTurn {
                role: HistoryRole::Model,
                text: "Earlier answer".to_string(),
            },
        ],
        aura: Aura::Rain,
        premium,
        learning_level: LearningLevel::Creator,
    }
}

async fn collect(gateway: &GeminiGateway, req: ChatRequest) -> Vec<StreamEvent> {
    gateway
        .stream_response(req)
        .await
        .expect("stream should open")
        .map(|item| item.expect("stream item"))
        .collect()
        .await
}

fn text_of(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextFragment(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_stream_response_yields_text_fragments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/chat-model:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", TEST_API_KEY))
        .and(body_string_contains("LEARNING MODE: CREATOR"))
        .and(body_string_contains("Earlier answer"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Hello", ", ", "world"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let events = collect(&gateway, request("Say hi", false)).await;

    assert_eq!(text_of(&events), "Hello, world");
}

#[tokio::test]
async fn test_premium_requests_use_premium_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/premium-model:streamGenerateContent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["Premium"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let events = collect(&gateway, request("hi", true)).await;
    assert_eq!(text_of(&events), "Premium");
}

#[tokio::test]
async fn test_logo_marker_split_across_chunks_becomes_asset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/chat-model:streamGenerateContent"))
        .and(body_string_contains("[[WESTLINE_LOGO]]"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(&["Here you go: [[WESTLINE_", "LOGO]]", " trailing text"]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let events = collect(&gateway, request("Show me the logo", false)).await;

    let asset = events
        .iter()
        .find_map(|e| match e {
            StreamEvent::AssetAttachment { caption, image } => Some((caption, image)),
            _ => None,
        })
        .expect("logo asset");
    assert_eq!(asset.0, LOGO_CAPTION);
    assert_eq!(asset.1.mime_type, "image/svg+xml");
    assert!(!text_of(&events).contains("[[WESTLINE"));
    assert!(!text_of(&events).contains("trailing"));
}

#[tokio::test]
async fn test_stream_open_failure_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/chat-model:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let err = match gateway.stream_response(request("hi", false)).await {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("500"));
    assert!(err.to_string().contains("backend exploded"));
}

#[tokio::test]
async fn test_unauthorized_mentions_key_command() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/utility-model:generateContent"))
        .respond_with(ResponseTemplate::new(401).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let err = gateway.generate_title("hello").await.unwrap_err();
    assert!(err.to_string().contains("westline key set"));
}

#[tokio::test]
async fn test_error_chunk_mid_stream_is_an_error_item() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\ndata: {}\n\n",
        text_response("partial"),
        serde_json::json!({"error": {"code": 503, "message": "overloaded"}})
    );
    Mock::given(method("POST"))
        .and(path("/v1beta/models/chat-model:streamGenerateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let items: Vec<_> = gateway
        .stream_response(request("hi", false))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(
        items[0].as_ref().unwrap(),
        &StreamEvent::TextFragment("partial".to_string())
    );
    assert!(items.iter().any(|i| i.is_err()));
}

#[tokio::test]
async fn test_generate_title_uses_utility_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/utility-model:generateContent"))
        .and(body_string_contains("max 4 words"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Trip Planning Ideas")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let title = gateway.generate_title("Help me plan a trip").await.unwrap();
    assert_eq!(title, "Trip Planning Ideas");
}

#[tokio::test]
async fn test_generate_json_list_requests_schema() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/utility-model:generateContent"))
        .and(body_string_contains("\"responseMimeType\":\"application/json\""))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(text_response(r#"["One?", "Two?", "Three?", "Four?"]"#)),
        )
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let list = gateway.generate_json_list("follow ups").await.unwrap();
    assert_eq!(list, vec!["One?", "Two?", "Three?", "Four?"]);
}

#[tokio::test]
async fn test_generate_json_list_rejects_non_array() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/utility-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("not json")))
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    assert!(gateway.generate_json_list("follow ups").await.is_err());
}

#[tokio::test]
async fn test_generate_image_sends_aspect_ratio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/image-model:generateContent"))
        .and(body_string_contains("\"aspectRatio\":\"16:9\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(inline_response("image/png", "iVBORw0KGgo=")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let image = gateway
        .generate_image("a fox", AspectRatio::Landscape)
        .await
        .unwrap()
        .expect("image");
    assert_eq!(image.mime_type, "image/png");
    assert_eq!(image.data, "data:image/png;base64,iVBORw0KGgo=");
}

#[tokio::test]
async fn test_text_only_image_answer_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/image-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("I can't draw that")))
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let image = gateway
        .generate_image("a fox", AspectRatio::Square)
        .await
        .unwrap();
    assert!(image.is_none());
}

#[tokio::test]
async fn test_edit_image_sends_inline_source() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/image-model:generateContent"))
        .and(body_string_contains("\"inlineData\":{\"mimeType\":\"image/jpeg\",\"data\":\"SOURCE\"}"))
        .and(body_string_contains("make it blue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inline_response("image/png", "RURJVEVE")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let source = ImageAttachment::from_base64("image/jpeg", "SOURCE");
    let edited = gateway
        .edit_image(&source, "make it blue")
        .await
        .unwrap()
        .expect("edited image");
    assert_eq!(edited.base64_payload(), "RURJVEVE");
}

#[tokio::test]
async fn test_synthesize_speech_decodes_pcm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/speech-model:generateContent"))
        .and(body_string_contains("\"voiceName\":\"Kore\""))
        .and(body_string_contains("\"responseModalities\":[\"AUDIO\"]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inline_response("audio/L16;rate=24000", "AAABAA==")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = GeminiGateway::new(gemini_config(&server.uri())).unwrap();
    let audio = gateway
        .synthesize_speech("Hello there", Voice::Kore)
        .await
        .unwrap()
        .expect("audio");
    assert_eq!(audio.samples(), vec![0, 1]);
    assert_eq!(audio.sample_rate, 24_000);
}

#[tokio::test]
#[serial]
async fn test_api_key_from_environment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/utility-model:generateContent"))
        .and(header("x-goog-api-key", "env-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Env Title")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = gemini_config(&server.uri());
    config.api_key = None;
    std::env::remove_var("GEMINI_API_KEY");
    std::env::set_var("WESTLINE_API_KEY", "env-key");

    let gateway = GeminiGateway::new(config).unwrap();
    let title = gateway.generate_title("hi").await;
    std::env::remove_var("WESTLINE_API_KEY");

    assert_eq!(title.unwrap(), "Env Title");
}
