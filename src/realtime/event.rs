use serde::{Deserialize, Serialize};

/// Default channel type for conversations.
pub const MESSAGING_CHANNEL_TYPE: &str = "messaging";

/// Backend error code signalling that the connect token has expired.
const TOKEN_EXPIRED_CODE: u32 = 40;

/// Typed realtime events delivered on the client's broadcast stream.
///
/// Channel events carry only the qualified channel id; payload fields beyond
/// that are deliberately dropped at this boundary, since partial payloads
/// must not be mistaken for authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RealtimeEvent {
    /// `connection.changed` — transport went online or offline.
    ConnectionChanged { online: bool },
    /// `connection.recovered` — transport resynced after an outage.
    ConnectionRecovered,
    /// `error` — client-level error report.
    ClientError { code: Option<u32>, message: String },
    /// `message.new`
    MessageNew { cid: String },
    /// `notification.mark_read`
    MarkRead { cid: String },
    /// `notification.added_to_channel`
    AddedToChannel { cid: String },
    /// `notification.channel_deleted`
    ChannelDeleted { cid: String },
}

impl RealtimeEvent {
    /// Whether this is an error event carrying the token-expiry signature.
    pub fn is_token_expired(&self) -> bool {
        match self {
            RealtimeEvent::ClientError { code, message } => {
                *code == Some(TOKEN_EXPIRED_CODE) || message.contains("token is expired")
            }
            _ => false,
        }
    }
}

/// Splits a qualified channel id `"<type>:<id>"` into its parts.
pub fn split_cid(cid: &str) -> Option<(&str, &str)> {
    cid.split_once(':')
        .filter(|(channel_type, id)| !channel_type.is_empty() && !id.is_empty())
}

/// Builds the qualified channel id for a type and a bare id.
pub fn qualify_cid(channel_type: &str, id: &str) -> String {
    format!("{channel_type}:{id}")
}
