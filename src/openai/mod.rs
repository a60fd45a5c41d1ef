//! Client for OpenAI compatible chat completion APIs.

mod core;
pub use self::core::{
    BoxedToolCall, Completion, Function, FunctionCall, FunctionCallFn, Message, ModelClient,
    Parameters, Role, ToolCall, ToolType,
};
