use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One member of a channel, as reported by the messaging backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMember {
    pub user_id: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
}

/// Preview of a message in a channel's latest-message window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePreview {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A channel as the client sees it: identity, display metadata, and a state
/// snapshot (members, latest messages, unread count).
///
/// The snapshot is what the backend returns from a bulk or per-channel query;
/// realtime event payloads are never trusted to carry one (they may be
/// partial), so updates always go through a fresh query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    /// Stable channel identifier.
    pub id: String,
    /// Type-qualified identifier, `"<type>:<id>"`.
    pub cid: String,
    pub channel_type: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Member map keyed by user id.
    #[serde(default)]
    pub members: HashMap<String, ChannelMember>,
    /// Latest-first message window.
    #[serde(default)]
    pub messages: Vec<MessagePreview>,
    #[serde(default)]
    pub unread_count: u32,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Identity that created the channel; consumers use it for ownership
    /// checks, the sync core does not read it.
    pub created_by_id: Option<String>,
}

impl ChannelSnapshot {
    /// Whether this snapshot describes the channel identified by `cid`,
    /// matching either the qualified or the bare identifier.
    pub fn matches_cid(&self, cid: &str) -> bool {
        self.cid == cid || self.id == cid
    }
}
