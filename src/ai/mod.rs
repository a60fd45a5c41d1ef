pub mod chat;
pub mod message;
pub mod permissions;
pub mod prompt;
pub mod tools;
