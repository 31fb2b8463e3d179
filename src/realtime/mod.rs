pub mod client;
pub mod event;

pub use client::{ChannelQuery, ChannelStateQuery, RealtimeClient};
pub use event::{qualify_cid, split_cid, RealtimeEvent, MESSAGING_CHANNEL_TYPE};
