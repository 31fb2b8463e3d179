//! Credential service HTTP contract.

use realtime_chat_client::services::token_client::{CredentialProvider, TokenClient};
use realtime_chat_client::ChatError;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_with(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn success_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_json(json!({ "userId": "alice" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "jwt-abc" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TokenClient::new(format!("{}/token", server.uri()));
    let token = client.fetch_token("alice").await.unwrap();
    assert_eq!(token, "jwt-abc");
}

#[tokio::test]
async fn not_found_is_retryable_provisioning_lag() {
    let server = server_with(ResponseTemplate::new(404)).await;

    let client = TokenClient::new(format!("{}/token", server.uri()));
    let err = client.fetch_token("alice").await.unwrap_err();
    assert!(matches!(err, ChatError::NotProvisioned));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn success_without_token_is_provisioning_lag() {
    let server = server_with(ResponseTemplate::new(200).set_body_json(json!({}))).await;

    let client = TokenClient::new(format!("{}/token", server.uri()));
    let err = client.fetch_token("alice").await.unwrap_err();
    assert!(matches!(err, ChatError::NotProvisioned));
}

#[tokio::test]
async fn success_with_empty_token_is_provisioning_lag() {
    let server = server_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "" }))).await;

    let client = TokenClient::new(format!("{}/token", server.uri()));
    let err = client.fetch_token("alice").await.unwrap_err();
    assert!(matches!(err, ChatError::NotProvisioned));
}

#[tokio::test]
async fn server_error_is_not_retryable() {
    let server = server_with(ResponseTemplate::new(500)).await;

    let client = TokenClient::new(format!("{}/token", server.uri()));
    let err = client.fetch_token("alice").await.unwrap_err();
    assert!(matches!(err, ChatError::Credential(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unreachable_endpoint_is_not_retryable() {
    // Port 1 is reliably closed.
    let client = TokenClient::new("http://127.0.0.1:1/token");
    let err = client.fetch_token("alice").await.unwrap_err();
    assert!(matches!(err, ChatError::Credential(_)));
    assert!(!err.is_retryable());
}
