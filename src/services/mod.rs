pub mod channel_list;
pub mod connection_manager;
pub mod token_client;

pub use channel_list::{ChannelListService, ChannelListState, RefreshOptions};
pub use connection_manager::{ConnectionManager, ConnectionPhase, SessionSnapshot};
pub use token_client::{CredentialProvider, TokenClient};
