pub mod channel;
pub mod user;

pub use channel::{ChannelMember, ChannelSnapshot, MessagePreview};
pub use user::UserProfile;
