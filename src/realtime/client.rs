use crate::error::ChatResult;
use crate::models::{ChannelSnapshot, UserProfile};
use crate::realtime::event::RealtimeEvent;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Parameters for the bulk channel query.
#[derive(Debug, Clone)]
pub struct ChannelQuery {
    /// Only channels where this identity is a member.
    pub member_user_id: String,
    /// Sort is always last-message time descending; this caps the page.
    pub limit: u32,
    /// Subscribe to live updates for the returned channels.
    pub watch: bool,
    /// Include the member/message/unread state snapshot.
    pub state: bool,
}

/// Parameters for a single-channel state query.
#[derive(Debug, Clone)]
pub struct ChannelStateQuery {
    /// Size of the latest-message window to fetch.
    pub message_limit: u32,
    pub state: bool,
}

/// The messaging SDK boundary.
///
/// One implementation instance exists per process and is reused across
/// reconnects and identity changes. The wire protocol and transport behind it
/// are out of scope; tests drive the core through an in-memory
/// implementation.
///
/// Ownership split: only the connection manager calls `connect`,
/// `disconnect`, and `subscribe`; the channel-list synchronizer and consumer
/// screens only issue queries.
#[async_trait]
pub trait RealtimeClient: Send + Sync {
    /// Binds the client to `user` using a backend-issued credential.
    async fn connect(&self, user: &UserProfile, token: &str) -> ChatResult<()>;

    /// Tears down the current session, if any.
    async fn disconnect(&self) -> ChatResult<()>;

    /// Identity currently bound to the client, if connected.
    fn connected_user_id(&self) -> Option<String>;

    /// Bulk query for the caller's channels, ordered by last-message time
    /// descending.
    async fn query_channels(&self, query: ChannelQuery) -> ChatResult<Vec<ChannelSnapshot>>;

    /// Fresh snapshot of a single channel.
    async fn query_channel(
        &self,
        channel_type: &str,
        id: &str,
        query: ChannelStateQuery,
    ) -> ChatResult<ChannelSnapshot>;

    /// Best-effort push of the latest profile fields to the backend.
    async fn upsert_user(&self, profile: &UserProfile) -> ChatResult<()>;

    /// New receiver on the client's event stream.
    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent>;
}
