//! The conversation state kept for a single chat.
use crate::openai::Message;

#[derive(Clone, Debug, Default)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn new_with_messages(messages: Vec<Message>) -> Self {
        Self(messages)
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn push(&mut self, msg: Message) {
        self.0.push(msg)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where a turn is in its lifecycle. A turn moves through
/// `Received -> Prompting -> (ToolCall -> ToolResult)* -> StreamingReply`
/// and ends in `Done` or `Failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TurnState {
    #[default]
    Received,
    Prompting,
    ToolCall,
    ToolResult,
    StreamingReply,
    Done,
    Failed,
}
