#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use celebchat_ollama::OllamaClient;
use celebchat_server::{AppState, ServerConfig, create_router_with_state};
use serde_json::json;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A running server wired to a mocked Ollama.
pub struct TestServer {
    pub addr: SocketAddr,
    pub backend: MockServer,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    pub async fn start_with(config: ServerConfig) -> Self {
        let backend = MockServer::start().await;
        let state = AppState::with_backend(config, Arc::new(OllamaClient::new(backend.uri())));
        let app = create_router_with_state(Arc::new(state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            backend,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn mock_tags(&self, names: &[&str]) {
        let models: Vec<_> = names.iter().map(|n| json!({ "name": n })).collect();
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": models })))
            .mount(&self.backend)
            .await;
    }

    pub async fn mock_generate(&self, body: &str) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/x-ndjson")
                    .set_body_string(body),
            )
            .mount(&self.backend)
            .await;
    }

    pub async fn stream(&self, persona: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/chat/{persona}/stream")))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}
