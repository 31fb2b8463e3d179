use crate::error::{ChatError, ChatResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Source of short-lived connect credentials.
///
/// The manager drives credential acquisition through this trait so tests can
/// substitute an in-memory provider.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetches a connect token for `user_id`.
    ///
    /// Returns [`ChatError::NotProvisioned`] when the backend does not know
    /// the user yet (retryable); any other failure is terminal.
    async fn fetch_token(&self, user_id: &str) -> ChatResult<String>;
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// HTTP client for the credential service.
#[derive(Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TokenClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for TokenClient {
    async fn fetch_token(&self, user_id: &str) -> ChatResult<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&TokenRequest { user_id })
            .send()
            .await
            .map_err(|e| ChatError::Credential(format!("token request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // User provisioning is still propagating to the backend.
            return Err(ChatError::NotProvisioned);
        }
        if !status.is_success() {
            warn!(user_id = %user_id, status = %status, "credential service returned error");
            return Err(ChatError::Credential(format!(
                "token endpoint returned {status}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Credential(format!("token response decode: {e}")))?;

        match body.token {
            Some(token) if !token.is_empty() => Ok(token),
            // A 2xx without a token means the backend accepted the request
            // but has not provisioned the user yet.
            _ => Err(ChatError::NotProvisioned),
        }
    }
}
