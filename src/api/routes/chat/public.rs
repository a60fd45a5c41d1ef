//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::ai::message::NormalizedMessage;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub user_name: Option<String>,
    // IANA name, e.g. "Africa/Lagos"
    #[serde(default)]
    pub user_timezone: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ChatTranscriptResponse {
    pub session_id: String,
    pub transcript: Vec<NormalizedMessage>,
}
