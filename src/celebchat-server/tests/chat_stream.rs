mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::TestServer;

#[tokio::test]
async fn test_unknown_persona_is_404() {
    let server = TestServer::start().await;

    let response = server.stream("unknown-id", json!({ "message": "hi" })).await;

    assert_eq!(response.status(), 404);
    assert_eq!(response.text().await.unwrap(), "Persona not found");
    assert!(server.backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_persona_wins_over_blank_message() {
    let server = TestServer::start().await;

    let response = server.stream("unknown-id", json!({ "message": "" })).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_blank_message_is_400() {
    let server = TestServer::start().await;

    for body in [json!({ "message": "   " }), json!({ "message": "" }), json!({})] {
        let response = server.stream("einstein", body).await;
        assert_eq!(response.status(), 400);
        assert_eq!(
            response.text().await.unwrap(),
            "Invalid message: must be a non-empty string"
        );
    }
    assert!(server.backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_string_message_is_400() {
    let server = TestServer::start().await;

    let response = server.stream("einstein", json!({ "message": 42 })).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_fragments_are_concatenated() {
    let server = TestServer::start().await;
    server.mock_tags(&["llama3:8b"]).await;
    server
        .mock_generate("{\"response\":\"A\",\"done\":false}\n{\"response\":\"B\",\"done\":true}\n")
        .await;

    let response = server.stream("einstein", json!({ "message": "hi" })).await;

    assert_eq!(response.status(), 200);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "text/plain; charset=utf-8");
    assert_eq!(headers["cache-control"], "no-cache, no-transform");
    assert_eq!(headers["x-accel-buffering"], "no");
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "AB");
}

#[tokio::test]
async fn test_malformed_line_is_skipped() {
    let server = TestServer::start().await;
    server.mock_tags(&["llama3:8b"]).await;
    server
        .mock_generate("{\"response\":\"A\"}\nNOT JSON\n{\"response\":\"B\"}\n")
        .await;

    let response = server.stream("einstein", json!({ "message": "hi" })).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "AB");
}

#[tokio::test]
async fn test_empty_generation_gives_empty_body() {
    let server = TestServer::start().await;
    server.mock_tags(&[]).await;
    server.mock_generate("").await;

    let response = server.stream("frida", json!({ "message": "hola" })).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "");
}

#[tokio::test]
async fn test_preferred_model_is_used() {
    let server = TestServer::start().await;
    server.mock_tags(&["llama3:8b", "mistral:7b"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "model": "llama3" })))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"response\":\"Imagination \"}\n{\"response\":\"is everything.\"}\n{\"done\":true}\n",
        ))
        .expect(1)
        .mount(&server.backend)
        .await;

    let response = server
        .stream("einstein", json!({ "message": "What matters most?" }))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        "Imagination is everything."
    );
}

#[tokio::test]
async fn test_default_model_when_catalog_unavailable() {
    let server = TestServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server.backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "model": "gpt-oss:20b" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"response\":\"ok\"}\n"))
        .expect(1)
        .mount(&server.backend)
        .await;

    let response = server.stream("curie", json!({ "message": "hi" })).await;
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_prompt_carries_the_message() {
    let server = TestServer::start().await;
    server.mock_tags(&["gemma:2b"]).await;
    server.mock_generate("{\"response\":\"ok\"}\n").await;

    let response = server
        .stream("leonardo", json!({ "message": "Tell me about flight" }))
        .await;
    assert_eq!(response.text().await.unwrap(), "ok");

    let requests = server.backend.received_requests().await.unwrap();
    let generate = requests
        .iter()
        .find(|r| r.url.path() == "/api/generate")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&generate.body).unwrap();
    assert_eq!(body["model"], "gemma");
    assert!(body["prompt"].as_str().unwrap().contains("Tell me about flight"));
}

#[tokio::test]
async fn test_form_encoded_message() {
    let server = TestServer::start().await;
    server.mock_tags(&[]).await;
    server.mock_generate("{\"response\":\"ok\"}\n").await;

    let response = server
        .client
        .post(server.url("/chat/frida/stream"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("message=hola+Frida")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_generation_refused_ends_stream() {
    let server = TestServer::start().await;
    server.mock_tags(&["llama3:8b"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server.backend)
        .await;

    let response = server.stream("einstein", json!({ "message": "hi" })).await;

    // Headers are already committed when the backend refuses.
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "");
}

#[tokio::test]
async fn test_client_disconnect_does_not_break_server() {
    let server = TestServer::start().await;
    server.mock_tags(&["llama3:8b"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"response\":\"slow\"}\n")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server.backend)
        .await;

    let response = server.stream("einstein", json!({ "message": "hi" })).await;
    assert_eq!(response.status(), 200);
    drop(response);

    let health = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
}
