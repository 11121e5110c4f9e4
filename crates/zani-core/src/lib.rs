pub mod config;
pub mod error;
pub mod tokens;
pub mod types;

pub use config::ZaniConfig;
pub use error::{Result, ZaniError};
pub use types::{ChannelId, Message, MessageId, Reaction, UserId};
