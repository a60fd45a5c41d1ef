mod core;
pub mod db;
mod error;
mod models;

pub use self::core::{Assistant, AssistantBuilder, DEFAULT_MAX_STEPS};
pub use db::{find_chat_session_by_id, get_or_create_session, insert_chat_messages};
pub use error::AssistantError;
pub use models::{Transcript, TurnState};
