use thiserror::Error;

/// Ways a chat turn can fail apart from transport and model errors.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("the assistant needed more than {0} model calls to answer")]
    StepBudgetExceeded(usize),

    #[error("the client disconnected before the turn finished")]
    Cancelled,

    #[error("the model returned an empty reply")]
    NoReply,

    #[error("the model called a tool that isn't available: {0}")]
    UnknownTool(String),

    #[error("chat session {0} not found")]
    SessionNotFound(String),
}
