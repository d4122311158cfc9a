pub mod audio;
pub mod config;
pub mod errors;
pub mod types;

pub use config::{LlmConfig, ServiceConfig};
pub use errors::{CleanChatError, ModerationError, ProtocolError, RoomError};
pub use types::*;
