use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Credential service endpoint (`POST {"userId": ...} -> {"token": ...}`).
    pub token_endpoint: String,
    /// Retries after the initial credential fetch while the user is still
    /// being provisioned.
    pub max_token_retries: u32,
    /// Fixed delay between credential fetch attempts.
    pub token_retry_delay: Duration,
    /// Delay before reconnecting after a token-expiry signal.
    pub reconnect_delay: Duration,
    /// Page size for the bulk channel query.
    pub channel_query_limit: u32,
    /// Message window requested when re-fetching a single channel snapshot
    /// for a realtime delta.
    pub event_message_limit: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            token_endpoint: "http://localhost:3000/token".to_string(),
            max_token_retries: 3,
            token_retry_delay: Duration::from_millis(2000),
            reconnect_delay: Duration::from_millis(100),
            channel_query_limit: 30,
            event_message_limit: 1,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, crate::error::ChatError> {
        dotenv().ok();

        let token_endpoint = env::var("CHAT_TOKEN_ENDPOINT")
            .map_err(|_| crate::error::ChatError::Config("CHAT_TOKEN_ENDPOINT missing".into()))?;

        let max_token_retries = env::var("CHAT_MAX_TOKEN_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);
        let token_retry_delay_ms = env::var("CHAT_TOKEN_RETRY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2000);
        let reconnect_delay_ms = env::var("CHAT_RECONNECT_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);
        let channel_query_limit = env::var("CHAT_CHANNEL_QUERY_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        let event_message_limit = env::var("CHAT_EVENT_MESSAGE_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Ok(Self {
            token_endpoint,
            max_token_retries,
            token_retry_delay: Duration::from_millis(token_retry_delay_ms),
            reconnect_delay: Duration::from_millis(reconnect_delay_ms),
            channel_query_limit,
            event_message_limit,
        })
    }
}
