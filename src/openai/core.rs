use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "tool")]
    Tool,
}

// A tool call as it appears in an assistant message:
//
// {
//     "function": {
//         "arguments": "{\"userId\":\"u1\",\"onlyTasks\":true}",
//         "name": "read_calendar"
//     },
//     "id": "call_KCg5V0N5E7hHHrUwdefHBfgL",
//     "type": "function"
// }
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FunctionCallFn {
    pub arguments: String,
    pub name: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FunctionCall {
    pub function: FunctionCallFn,
    pub id: String,
    pub r#type: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<FunctionCall>>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: Some(content.to_string()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn new_tool_call_request(tool_calls: Vec<FunctionCall>) -> Self {
        Message {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }

    pub fn new_tool_call_response(content: &str, tool_call_id: &str) -> Self {
        Message {
            role: Role::Tool,
            content: Some(content.to_string()),
            tool_call_id: Some(tool_call_id.to_string()),
            tool_calls: None,
        }
    }
}

#[derive(Serialize)]
pub struct Parameters<Props: Serialize> {
    pub r#type: String,
    pub properties: Props,
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

#[derive(Serialize)]
pub struct Function<Props: Serialize> {
    pub name: String,
    pub description: String,
    pub parameters: Parameters<Props>,
    pub strict: bool,
}

#[derive(Serialize)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

// `serde::Serialize` isn't object safe so tools are serialized
// through `erased_serde` to allow a heterogeneous list of boxed tools
// to be sent as the `tools` field of a request.
#[async_trait]
pub trait ToolCall: erased_serde::Serialize {
    async fn call(&self, args: &str) -> Result<String, Error>;
    fn function_name(&self) -> String;
}
erased_serde::serialize_trait_object!(ToolCall);

pub type BoxedToolCall = Box<dyn ToolCall + Send + Sync + 'static>;

/// What the model asked for at the end of a completion.
#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    Reply(String),
    ToolCalls(Vec<FunctionCall>),
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<FunctionCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

// The first delta of a tool call carries the id and function name,
// later deltas only carry the next fragment of the arguments.
#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: usize,
    id: Option<String>,
    #[serde(default)]
    function: FunctionDelta,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Delta {
    Content { content: String },

    Reasoning { reasoning: String },

    ToolCall { tool_calls: Vec<ToolCallDelta> },

    Other {},
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    // Usage chunks arrive with no choices
    #[serde(default)]
    choices: Vec<CompletionChunkChoice>,
}

/// Accumulates streamed deltas into a final completion.
#[derive(Default)]
struct StreamAccumulator {
    content: String,
    reasoning: String,
    tool_calls: BTreeMap<usize, FunctionCall>,
}

impl StreamAccumulator {
    /// Apply one chunk. Returns `true` once the model signals it's done.
    fn push(&mut self, chunk: CompletionChunk) -> bool {
        let Some(choice) = chunk.choices.into_iter().next() else {
            return false;
        };

        match choice.delta {
            Delta::Content { content } => self.content.push_str(&content),
            Delta::Reasoning { reasoning } => self.reasoning.push_str(&reasoning),
            Delta::ToolCall { tool_calls } => {
                for delta in tool_calls {
                    let call = self.tool_calls.entry(delta.index).or_insert_with(|| FunctionCall {
                        function: FunctionCallFn {
                            arguments: String::new(),
                            name: String::new(),
                        },
                        id: String::new(),
                        r#type: String::from("function"),
                    });
                    if let Some(id) = delta.id {
                        call.id = id;
                    }
                    if let Some(name) = delta.function.name {
                        call.function.name.push_str(&name);
                    }
                    if let Some(args) = delta.function.arguments {
                        call.function.arguments.push_str(&args);
                    }
                }
            }
            Delta::Other {} => {}
        }

        choice.finish_reason.is_some()
    }

    fn finish(self) -> Completion {
        if !self.reasoning.is_empty() {
            tracing::debug!("Model reasoning: {}", self.reasoning);
        }
        if self.tool_calls.is_empty() {
            Completion::Reply(self.content)
        } else {
            Completion::ToolCalls(self.tool_calls.into_values().collect())
        }
    }
}

/// Connection details for a model behind an OpenAI compatible API.
#[derive(Clone, Debug)]
pub struct ModelClient {
    api_hostname: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl ModelClient {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn payload(&self, messages: &[Message], tools: &[BoxedToolCall], stream: bool) -> Value {
        let mut payload = json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            payload["tools"] = json!(tools);
        }
        if stream {
            payload["stream"] = json!(true);
            payload["stream_options"] = json!({"include_usage": true});
        }
        payload
    }

    async fn send(&self, payload: &Value, timeout: Duration) -> Result<reqwest::Response, Error> {
        let url = format!("{}/v1/chat/completions", self.api_hostname);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response)
    }

    pub async fn completion(
        &self,
        messages: &[Message],
        tools: &[BoxedToolCall],
    ) -> Result<Completion, Error> {
        let payload = self.payload(messages, tools, false);
        let resp: CompletionResponse = self
            .send(&payload, Duration::from_secs(60 * 10))
            .await?
            .json()
            .await?;

        let message = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Completion response has no choices"))?
            .message;

        match message.tool_calls {
            Some(calls) if !calls.is_empty() => Ok(Completion::ToolCalls(calls)),
            _ => Ok(Completion::Reply(message.content.unwrap_or_default())),
        }
    }

    /// Stream a completion. Every raw chunk is forwarded to `tx` as it
    /// arrives. The stream is read to the end even if nobody is
    /// listening so that tool call arguments are always complete.
    pub async fn completion_stream(
        &self,
        tx: &mpsc::UnboundedSender<String>,
        messages: &[Message],
        tools: &[BoxedToolCall],
    ) -> Result<Completion, Error> {
        let payload = self.payload(messages, tools, true);
        let response = self.send(&payload, Duration::from_secs(60 * 5)).await?;
        let mut stream = response.bytes_stream();

        let mut acc = StreamAccumulator::default();
        // Raw bytes so multi-byte characters split across frames are
        // only decoded once the whole event has arrived
        let mut buffer: Vec<u8> = Vec::new();

        'outer: while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(event_end) = buffer.windows(2).position(|w| w == b"\n\n") {
                let event: Vec<u8> = buffer.drain(..event_end + 2).collect();
                let event = std::str::from_utf8(&event)?.trim();

                let Some(data) = event.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    break 'outer;
                }

                let chunk = serde_json::from_str::<CompletionChunk>(data).inspect_err(|e| {
                    tracing::error!("Parsing completion chunk failed for {}\nError:{}", data, e)
                })?;

                // Ignore send errors, a closed receiver is handled by
                // the caller before the next model call
                let _ = tx.send(data.to_string());

                if acc.push(chunk) {
                    break 'outer;
                }
            }
        }

        Ok(acc.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct MockTool;

    #[async_trait]
    impl ToolCall for MockTool {
        async fn call(&self, _args: &str) -> Result<String, Error> {
            Ok("mock result".to_string())
        }
        fn function_name(&self) -> String {
            "read_calendar".to_string()
        }
    }

    fn sse(chunks: &[&str]) -> String {
        let mut body = String::new();
        for c in chunks {
            body.push_str("data: ");
            body.push_str(c);
            body.push_str("\n\n");
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    #[test]
    fn it_serializes_roles() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), r#""tool""#);
        assert_eq!(
            serde_json::from_str::<Role>(r#""assistant""#).unwrap(),
            Role::Assistant
        );
    }

    #[test]
    fn it_serializes_messages_in_api_shape() {
        let msg = Message::new(Role::User, "Plan my week");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"user","content":"Plan my week"}"#
        );

        let msg = Message::new_tool_call_response("[]", "call_1");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"tool","content":"[]","tool_call_id":"call_1"}"#
        );

        let msg = Message::new_tool_call_request(vec![FunctionCall {
            function: FunctionCallFn {
                arguments: r#"{"userId":"u1"}"#.to_string(),
                name: "read_calendar".to_string(),
            },
            id: "call_1".to_string(),
            r#type: "function".to_string(),
        }]);
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"assistant","tool_calls":[{"function":{"arguments":"{\"userId\":\"u1\"}","name":"read_calendar"},"id":"call_1","type":"function"}]}"#
        );
    }

    #[test]
    fn it_omits_tools_when_there_are_none() {
        let client = ModelClient::new("http://localhost/", "key", "gpt-4");
        let payload = client.payload(&[Message::new(Role::User, "Hi")], &[], false);
        assert!(payload.get("tools").is_none());
        assert!(payload.get("stream").is_none());

        let tools = vec![Box::new(MockTool) as BoxedToolCall];
        let payload = client.payload(&[], &tools, true);
        assert!(payload["tools"].is_array());
        assert_eq!(payload["stream"], true);
    }

    #[test]
    fn it_accumulates_tool_call_deltas() {
        let mut acc = StreamAccumulator::default();
        let chunks = [
            r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":null,"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"read_calendar","arguments":""}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"userId\":"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"u1\"}"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
        ];
        let mut done = false;
        for c in chunks {
            done = acc.push(serde_json::from_str(c).unwrap());
        }
        assert!(done);

        match acc.finish() {
            Completion::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].function.name, "read_calendar");
                assert_eq!(calls[0].function.arguments, r#"{"userId":"u1"}"#);
            }
            other => panic!("Expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn it_ignores_usage_chunks() {
        let mut acc = StreamAccumulator::default();
        let chunk = serde_json::from_str(r#"{"choices":[],"usage":{"total_tokens":12}}"#).unwrap();
        assert!(!acc.push(chunk));
        assert_eq!(acc.finish(), Completion::Reply(String::new()));
    }

    #[tokio::test]
    async fn it_returns_a_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Hello!"},"finish_reason":"stop"}]}"#)
            .create_async()
            .await;

        let client = ModelClient::new(&server.url(), "test-key", "gpt-4");
        let result = client
            .completion(&[Message::new(Role::User, "Hi")], &[])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result, Completion::Reply(String::from("Hello!")));
    }

    #[tokio::test]
    async fn it_returns_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"index":0,"message":{"role":"assistant","content":null,"tool_calls":[{"id":"call_1","type":"function","function":{"name":"read_calendar","arguments":"{}"}}]},"finish_reason":"tool_calls"}]}"#)
            .create_async()
            .await;

        let client = ModelClient::new(&server.url(), "test-key", "gpt-4");
        let tools = vec![Box::new(MockTool) as BoxedToolCall];
        let result = client
            .completion(&[Message::new(Role::User, "What's on?")], &tools)
            .await
            .unwrap();

        match result {
            Completion::ToolCalls(calls) => assert_eq!(calls[0].function.name, "read_calendar"),
            other => panic!("Expected tool calls, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn it_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = ModelClient::new(&server.url(), "test-key", "gpt-4");
        let result = client.completion(&[Message::new(Role::User, "Hi")], &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn it_streams_content_and_forwards_chunks() {
        let mut server = mockito::Server::new_async().await;
        let body = sse(&[
            r#"{"choices":[{"index":0,"delta":{"role":"assistant"},"finish_reason":null}]}"#,
            r#"{"choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#,
            r#"{"choices":[{"index":0,"delta":{"content":" World"},"finish_reason":null}]}"#,
            r#"{"choices":[{"index":0,"delta":{"content":"!"},"finish_reason":"stop"}]}"#,
        ]);
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let client = ModelClient::new(&server.url(), "test-key", "gpt-4");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = client
            .completion_stream(&tx, &[Message::new(Role::User, "Say hello")], &[])
            .await
            .unwrap();

        assert_eq!(result, Completion::Reply(String::from("Hello World!")));

        let mut chunk_count = 0;
        while rx.try_recv().is_ok() {
            chunk_count += 1;
        }
        assert_eq!(chunk_count, 4);
    }

    #[tokio::test]
    async fn it_streams_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let body = sse(&[
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"id":"call_1","index":0,"type":"function","function":{"name":"read_calendar","arguments":"{\"onlyTasks\":"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"true}"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
        ]);
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let client = ModelClient::new(&server.url(), "test-key", "gpt-4");
        // A closed receiver doesn't stop the stream from being read
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let result = client
            .completion_stream(&tx, &[Message::new(Role::User, "Tasks?")], &[])
            .await
            .unwrap();

        match result {
            Completion::ToolCalls(calls) => {
                assert_eq!(calls[0].function.arguments, r#"{"onlyTasks":true}"#)
            }
            other => panic!("Expected tool calls, got {:?}", other),
        }
    }
}
