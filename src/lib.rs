//! Headless chat core for the mobile client.
//!
//! Two components carry the design weight:
//!
//! - [`services::ConnectionManager`] — owns the realtime session lifecycle:
//!   credential acquisition with bounded retry, connect/reconnect, listener
//!   lifecycle, and teardown on logout or identity change.
//! - [`services::ChannelListService`] — owns the ordered channel list and
//!   keeps it consistent with realtime deltas without re-querying the world
//!   on every event.
//!
//! The messaging SDK itself sits behind the [`realtime::RealtimeClient`]
//! trait; the credential service behind
//! [`services::token_client::CredentialProvider`]. Both are injected, so the
//! core is fully testable in memory.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod realtime;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ChatConfig;
pub use error::{ChatError, ChatResult};
pub use models::{ChannelSnapshot, UserProfile};
pub use realtime::{RealtimeClient, RealtimeEvent};
pub use services::{
    ChannelListService, ChannelListState, ConnectionManager, ConnectionPhase, RefreshOptions,
    SessionSnapshot, TokenClient,
};
