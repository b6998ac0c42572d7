use std::io::Write;
use std::time::Duration;

use mockito::Matcher;
use postscope::llm::gemini::GeminiClient;
use postscope::llm::{ModelClient, ModelError, ModelSettings};

fn settings() -> ModelSettings {
    ModelSettings {
        api_key: "fake-api-key".to_string(),
        model: "gemini-test".to_string(),
    }
}

#[tokio::test]
async fn test_generate_text_only() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/v1beta/models/gemini-test:generateContent")
        .match_header("x-goog-api-key", "fake-api-key")
        .match_body(Matcher::PartialJsonString(
            r#"{"contents":[{"role":"user","parts":[{"text":"Summarize this"}]}]}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "This is a test response"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
            }"#,
        )
        .create_async()
        .await;

    let client = GeminiClient::new(&server.url()).expect("client");
    let text = client
        .summarize(&settings(), "Summarize this", None)
        .await
        .expect("summarize");

    assert_eq!(text, "This is a test response");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_models_prefix_is_not_doubled() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-test:generateContent")
        .with_status(200)
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#)
        .create_async()
        .await;

    let client = GeminiClient::new(&server.url()).unwrap();
    let settings = ModelSettings {
        model: "models/gemini-test".to_string(),
        ..settings()
    };
    assert_eq!(client.summarize(&settings, "p", None).await.unwrap(), "ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_text_returns_empty_string() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1beta/models/gemini-test:generateContent")
        .with_status(200)
        .with_body(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#)
        .create_async()
        .await;

    let client = GeminiClient::new(&server.url()).unwrap();
    let text = client.summarize(&settings(), "p", None).await.unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn test_api_error_is_generic_failure() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1beta/models/gemini-test:generateContent")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": {"message": "Rate limit exceeded"}}"#)
        .create_async()
        .await;

    let client = GeminiClient::new(&server.url()).unwrap();
    let err = client.summarize(&settings(), "p", None).await.unwrap_err();

    assert!(matches!(err, ModelError::Api { status: 429, .. }));
    assert!(!err.is_unavailable());
    assert!(err.to_string().contains("Rate limit exceeded"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_backend_is_unavailable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = GeminiClient::new(&format!("http://127.0.0.1:{}", port)).unwrap();
    let err = client.summarize(&settings(), "p", None).await.unwrap_err();
    assert!(err.is_unavailable(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_media_is_uploaded_then_referenced() {
    let mut server = mockito::Server::new_async().await;
    let session_url = format!("{}/upload-session/abc", server.url());

    let start = server
        .mock("POST", "/upload/v1beta/files")
        .match_header("x-goog-api-key", "fake-api-key")
        .match_header("x-goog-upload-protocol", "resumable")
        .match_header("x-goog-upload-command", "start")
        .match_header("x-goog-upload-header-content-length", "10")
        .match_header("x-goog-upload-header-content-type", "video/mp4")
        .with_status(200)
        .with_header("x-goog-upload-url", &session_url)
        .create_async()
        .await;

    let finalize = server
        .mock("POST", "/upload-session/abc")
        .match_header("x-goog-upload-command", "upload, finalize")
        .match_header("x-goog-upload-offset", "0")
        .match_body("fake video")
        .with_status(200)
        .with_body(
            r#"{"file": {
                "name": "files/abc",
                "uri": "https://example.test/v1beta/files/abc",
                "mimeType": "video/mp4",
                "state": "PROCESSING"
            }}"#,
        )
        .create_async()
        .await;

    let poll = server
        .mock("GET", "/v1beta/files/abc")
        .with_status(200)
        .with_body(
            r#"{"name": "files/abc", "uri": "https://example.test/v1beta/files/abc",
                "mimeType": "video/mp4", "state": "ACTIVE"}"#,
        )
        .create_async()
        .await;

    let generate = server
        .mock("POST", "/v1beta/models/gemini-test:generateContent")
        .match_body(Matcher::PartialJsonString(
            r#"{"contents":[{"role":"user","parts":[
                {"fileData":{"mimeType":"video/mp4","fileUri":"https://example.test/v1beta/files/abc"}},
                {"text":"Describe"}
            ]}]}"#
                .to_string(),
        ))
        .with_status(200)
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"A cat jumps."}]}}]}"#)
        .create_async()
        .await;

    let mut video = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    video.write_all(b"fake video").unwrap();

    let client = GeminiClient::new(&server.url())
        .unwrap()
        .with_polling(Duration::from_millis(10), 3);
    let text = client
        .summarize(&settings(), "Describe", Some(video.path()))
        .await
        .expect("summarize with media");

    assert_eq!(text, "A cat jumps.");
    start.assert_async().await;
    finalize.assert_async().await;
    poll.assert_async().await;
    generate.assert_async().await;
}

#[tokio::test]
async fn test_failed_processing_is_reported() {
    let mut server = mockito::Server::new_async().await;
    let session_url = format!("{}/upload-session/bad", server.url());

    let _start = server
        .mock("POST", "/upload/v1beta/files")
        .with_status(200)
        .with_header("x-goog-upload-url", &session_url)
        .create_async()
        .await;
    let _finalize = server
        .mock("POST", "/upload-session/bad")
        .with_status(200)
        .with_body(r#"{"file": {"name": "files/bad", "uri": "u", "state": "FAILED"}}"#)
        .create_async()
        .await;
    let generate = server
        .mock("POST", "/v1beta/models/gemini-test:generateContent")
        .expect(0)
        .create_async()
        .await;

    let mut video = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    video.write_all(b"x").unwrap();

    let client = GeminiClient::new(&server.url()).unwrap();
    let err = client
        .summarize(&settings(), "Describe", Some(video.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, ModelError::Upload(_)));
    generate.assert_async().await;
}

#[tokio::test]
async fn test_missing_media_file_is_reported() {
    let server = mockito::Server::new_async().await;
    let client = GeminiClient::new(&server.url()).unwrap();
    let err = client
        .summarize(&settings(), "p", Some(std::path::Path::new("/nonexistent/postscope.mp4")))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Media { .. }));
}
