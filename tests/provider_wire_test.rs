// Wire-format tests for the hosted providers, against a local mockito server.

use mockito::Matcher;
use serde_json::json;

use std::sync::Arc;

use ideaforge::config::Persona;
use ideaforge::providers::{
    GeminiProvider, GenerationSettings, LlmProvider, OpenAiProvider, ProviderRequest, Turn,
};
use ideaforge::refine::{RefineConfig, RefineLoop};

fn request() -> ProviderRequest {
    ProviderRequest::new("You are a critic.", "Rate these ideas.")
        .with_turns(vec![
            Turn::user("Round 1: critique these 2 ideas: A; B"),
            Turn::assistant("{\"ratings\": [70, 80]}"),
        ])
        .with_settings(GenerationSettings::new(0.2, 0.9, 2048))
}

#[tokio::test]
async fn test_gemini_request_shape_and_reply() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-1.5-flash:generateContent")
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "systemInstruction": {"parts": [{"text": "You are a critic."}]},
            "contents": [
                {"role": "user", "parts": [{"text": "Round 1: critique these 2 ideas: A; B"}]},
                {"role": "model", "parts": [{"text": "{\"ratings\": [70, 80]}"}]},
                {"role": "user", "parts": [{"text": "Rate these ideas."}]}
            ],
            "generationConfig": {"maxOutputTokens": 2048}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "{\"ratings\": "}, {"text": "[90]}"}]},
                    "finishReason": "STOP"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = GeminiProvider::new("test-key".into())
        .unwrap()
        .with_base_url(server.url());
    let text = provider.invoke(&request()).await.unwrap();

    assert_eq!(text, "{\"ratings\": [90]}");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_http_error_surfaces_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", Matcher::Regex(r"^/models/.*:generateContent$".into()))
        .with_status(429)
        .with_body("{\"error\": {\"message\": \"Resource exhausted\"}}")
        .create_async()
        .await;

    let provider = GeminiProvider::new("k".into()).unwrap().with_base_url(server.url());
    let err = provider.invoke(&request()).await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("429"));
    assert!(msg.contains("Resource exhausted"));
}

#[tokio::test]
async fn test_gemini_empty_candidates_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", Matcher::Regex(r"^/models/.*:generateContent$".into()))
        .with_status(200)
        .with_body("{\"candidates\": []}")
        .create_async()
        .await;

    let provider = GeminiProvider::new("k".into()).unwrap().with_base_url(server.url());
    let err = provider.invoke(&request()).await.unwrap_err();
    assert!(err.to_string().contains("no candidates"));
}

#[tokio::test]
async fn test_openai_request_shape_and_reply() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "You are a critic."},
                {"role": "user", "content": "Round 1: critique these 2 ideas: A; B"},
                {"role": "assistant", "content": "{\"ratings\": [70, 80]}"},
                {"role": "user", "content": "Rate these ideas."}
            ],
            "max_tokens": 2048
        })))
        .with_status(200)
        .with_body(
            json!({
                "choices": [{"message": {"role": "assistant", "content": "[{\"title\": \"x\"}]"}}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = OpenAiProvider::new("sk-test".into())
        .unwrap()
        .with_base_url(server.url());
    let text = provider.invoke(&request()).await.unwrap();

    assert_eq!(text, "[{\"title\": \"x\"}]");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_api_key_never_reaches_run_error() {
    // nothing listens on port 1, so the request fails in transport
    let provider = GeminiProvider::new("SECRET-KEY-123".into())
        .unwrap()
        .with_base_url("http://127.0.0.1:1");
    let refine = RefineLoop::new(Arc::new(provider), Persona::default(), RefineConfig::default())
        .unwrap();

    let err = refine.run("coffee").await.unwrap_err();
    assert_eq!(err.kind(), "enhancement_failure");
    assert!(!err.to_string().contains("SECRET-KEY-123"), "leaked: {err}");
}

#[tokio::test]
async fn test_gemini_api_key_not_in_parse_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", Matcher::Regex(r"^/models/.*:generateContent$".into()))
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let provider = GeminiProvider::new("SECRET-KEY-123".into())
        .unwrap()
        .with_base_url(server.url());
    let err = provider.invoke(&request()).await.unwrap_err();
    assert!(!format!("{err:#}").contains("SECRET-KEY-123"));
}
