use anyhow::{Error, Result};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_rusqlite::Connection;

use super::db::{get_or_create_session, insert_chat_messages};
use super::error::AssistantError;
use super::models::{Transcript, TurnState};
use crate::calendar::CalendarError;
use crate::openai::{BoxedToolCall, Completion, FunctionCall, Message, ModelClient, Role};

pub const DEFAULT_MAX_STEPS: usize = 10;

/// A conversation between one owner and the calendar assistant.
///
/// Each call to `next_msg` runs one turn: the model is prompted with
/// the transcript, any tool calls it makes are run one after another
/// and their results are fed back, until the model replies with text.
/// A turn makes at most `max_steps` model calls.
///
/// Use `Assistant::builder()` to construct a valid `Assistant`.
pub struct Assistant {
    client: ModelClient,
    owner_id: String,
    db: Option<Connection>,
    pub session_id: Option<String>,
    tools: Vec<BoxedToolCall>,
    transcript: Transcript,
    streaming: bool,
    tx: Option<mpsc::UnboundedSender<String>>,
    max_steps: usize,
    state: TurnState,
}

impl Assistant {
    pub fn builder(client: ModelClient, owner_id: &str) -> AssistantBuilder {
        AssistantBuilder::new(client, owner_id)
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn set_state(&mut self, state: TurnState) {
        tracing::debug!("Turn {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn is_cancelled(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.is_closed())
    }

    /// Run a single tool call. Calendar errors are handed back to the
    /// model as the tool result so it can tell the user what failed.
    async fn handle_tool_call(&self, call: &FunctionCall) -> Result<Message, Error> {
        let name = &call.function.name;
        let args = &call.function.arguments;
        tracing::debug!("\nTool call: {}\nargs: {}", name, args);

        let tool = self
            .tools
            .iter()
            .find(|t| t.function_name() == *name)
            .ok_or_else(|| AssistantError::UnknownTool(name.clone()))?;

        let content = match tool.call(args).await {
            Ok(result) => result,
            Err(err) => match err.downcast_ref::<CalendarError>() {
                Some(calendar_err) => {
                    tracing::warn!("Tool {} failed: {}", name, calendar_err);
                    json!({"error": calendar_err.to_string()}).to_string()
                }
                None => return Err(err),
            },
        };

        Ok(Message::new_tool_call_response(&content, &call.id))
    }

    async fn complete(&self, history: &[Message]) -> Result<Completion, Error> {
        match (&self.tx, self.streaming) {
            (Some(tx), true) => {
                self.client
                    .completion_stream(tx, history, &self.tools)
                    .await
            }
            _ => self.client.completion(history, &self.tools).await,
        }
    }

    async fn run_turn(&mut self, msg: &Message) -> Result<Vec<Message>, Error> {
        let mut messages: Vec<Message> = Vec::new();

        for _ in 0..self.max_steps {
            if self.is_cancelled() {
                return Err(AssistantError::Cancelled.into());
            }

            self.set_state(TurnState::Prompting);
            let mut history = self.transcript.messages().to_vec();
            history.push(msg.clone());
            history.extend(messages.iter().cloned());

            match self.complete(&history).await? {
                Completion::ToolCalls(calls) => {
                    self.set_state(TurnState::ToolCall);
                    // Sequential so calls that depend on an earlier
                    // call's side effects see them
                    let mut results = Vec::with_capacity(calls.len());
                    for call in calls.iter() {
                        results.push(self.handle_tool_call(call).await?);
                    }
                    messages.push(Message::new_tool_call_request(calls));
                    messages.extend(results);
                    self.set_state(TurnState::ToolResult);
                }
                Completion::Reply(reply) => {
                    self.set_state(TurnState::StreamingReply);
                    if reply.trim().is_empty() {
                        return Err(AssistantError::NoReply.into());
                    }
                    messages.push(Message::new(Role::Assistant, &reply));
                    return Ok(messages);
                }
            }
        }

        Err(AssistantError::StepBudgetExceeded(self.max_steps).into())
    }

    /// Store the user message and everything the turn produced together.
    async fn save_turn(&self, msg: &Message, messages: &[Message]) -> Result<(), Error> {
        // Builder enforces that these are always set together
        let (Some(db), Some(session_id)) = (&self.db, &self.session_id) else {
            return Ok(());
        };
        get_or_create_session(db, session_id, &self.owner_id).await?;
        let mut turn = Vec::with_capacity(messages.len() + 1);
        turn.push(msg.clone());
        turn.extend_from_slice(messages);
        insert_chat_messages(db, session_id, &turn).await?;
        Ok(())
    }

    /// Run the next turn of the conversation for `msg`. Returns the
    /// messages the turn produced: tool call requests and results
    /// followed by the final reply. Nothing is added to the transcript
    /// or saved when the turn fails, but tool calls that already ran
    /// stay committed.
    pub async fn next_msg(&mut self, msg: Message) -> Result<Vec<Message>, Error> {
        self.set_state(TurnState::Received);

        let turn = match self.run_turn(&msg).await {
            Ok(messages) => self.save_turn(&msg, &messages).await.map(|_| messages),
            Err(err) => Err(err),
        };
        let messages = match turn {
            Ok(messages) => messages,
            Err(err) => {
                self.set_state(TurnState::Failed);
                tracing::error!("Chat turn failed: {}", err);
                return Err(err);
            }
        };

        self.transcript.push(msg);
        for m in messages.iter() {
            self.transcript.push(m.clone());
        }

        self.set_state(TurnState::Done);
        Ok(messages)
    }
}

pub struct AssistantBuilder {
    client: ModelClient,
    owner_id: String,
    db: Option<Connection>,
    session_id: Option<String>,
    tools: Vec<BoxedToolCall>,
    transcript: Transcript,
    streaming: bool,
    tx: Option<mpsc::UnboundedSender<String>>,
    max_steps: usize,
}

impl AssistantBuilder {
    pub fn new(client: ModelClient, owner_id: &str) -> Self {
        Self {
            client,
            owner_id: owner_id.to_string(),
            db: None,
            session_id: None,
            tools: Vec::new(),
            transcript: Transcript::new(),
            streaming: false,
            tx: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn build(self) -> Assistant {
        Assistant {
            client: self.client,
            owner_id: self.owner_id,
            db: self.db,
            session_id: self.session_id,
            tools: self.tools,
            transcript: self.transcript,
            streaming: self.streaming,
            tx: self.tx,
            max_steps: self.max_steps,
            state: TurnState::default(),
        }
    }

    /// Save every completed turn to `db` under `session_id`, or a new
    /// session when none is given.
    pub fn database(mut self, db: &Connection, session_id: Option<&str>) -> Self {
        self.session_id = Some(
            session_id
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        );
        self.db = Some(db.clone());
        self
    }

    pub fn transcript(mut self, messages: Vec<Message>) -> Self {
        self.transcript = Transcript::new_with_messages(messages);
        self
    }

    pub fn streaming(mut self, transmitter: mpsc::UnboundedSender<String>) -> Self {
        self.streaming = true;
        self.tx = Some(transmitter);
        self
    }

    pub fn tools(mut self, tools: Vec<BoxedToolCall>) -> Self {
        self.tools = tools;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }
}
