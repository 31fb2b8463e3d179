use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error, Clone)]
pub enum ChatError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The credential service does not know this user yet (404 or a 2xx
    /// response without a token). Provisioning propagates asynchronously,
    /// so this is the one retryable credential failure.
    #[error("user not yet provisioned on the messaging backend")]
    NotProvisioned,

    #[error("credential fetch failed: {0}")]
    Credential(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("not connected to the messaging backend")]
    NotConnected,

    #[error("channel query failed: {0}")]
    Query(String),

    #[error("realtime client error: {0}")]
    Client(String),
}

impl ChatError {
    /// Returns whether this error is retryable (bounded, fixed-delay retry).
    ///
    /// Only provisioning lag qualifies; every other credential or connect
    /// failure is surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::NotProvisioned)
    }
}
