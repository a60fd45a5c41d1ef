//! Router for the chat API

use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public;
use crate::ai::chat::{Assistant, find_chat_session_by_id, get_or_create_session};
use crate::ai::message::normalize_transcript;
use crate::ai::prompt::{PromptContext, system_prompt};
use crate::ai::tools::calendar_tools;
use crate::api::public::{ApiError, Owner};
use crate::api::state::AppState;
use crate::calendar::time::resolve_timezone;
use crate::openai::{Message, Role};

type SharedState = Arc<RwLock<AppState>>;

/// Get a single chat session by ID
async fn chat_session(
    State(state): State<SharedState>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let transcript = find_chat_session_by_id(&db, &owner_id, &id).await?;

    if transcript.is_empty() {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Chat session {} not found", id),
        )
            .into_response());
    }

    Ok(Json(public::ChatTranscriptResponse {
        session_id: id,
        transcript: normalize_transcript(&transcript),
    })
    .into_response())
}

/// The chunk sent as the last event of a stream when the turn fails
fn error_chunk(err: &anyhow::Error) -> String {
    json!({
        "id": "error",
        "choices": [
            {
                "finish_reason": "error",
                "delta": { "content": format!("Something went wrong: {}", err) }
            }
        ]
    })
    .to_string()
}

/// Initiate or add to a chat session and stream the response
async fn chat_handler(
    State(state): State<SharedState>,
    Owner(owner_id): Owner,
    Json(payload): Json<public::ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (db, config) = {
        let shared_state = state.read().expect("Unable to read share state");
        (shared_state.db.clone(), shared_state.config.clone())
    };
    let session_id = payload.session_id;

    // Fails when the session id is taken by another user
    get_or_create_session(&db, &session_id, &owner_id).await?;
    let history = find_chat_session_by_id(&db, &owner_id, &session_id).await?;

    // The system prompt is rendered fresh for every turn so the date and
    // offset it states are current. It is never stored.
    let tz = resolve_timezone(
        payload
            .user_timezone
            .as_deref()
            .unwrap_or(&config.default_timezone),
    );
    let context = PromptContext::new(
        &owner_id,
        payload.user_name.as_deref(),
        tz,
        config.prompt_variant,
        Utc::now(),
    );
    let mut transcript = vec![Message::new(Role::System, &system_prompt(&context)?)];
    transcript.extend(history);

    let tools = calendar_tools(&db, &owner_id, tz, config.prompt_variant);
    let user_msg = Message::new(Role::User, &payload.message);

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let sse_stream = UnboundedReceiverStream::new(rx)
        .map(|chunk| Ok::<Event, Infallible>(Event::default().data(chunk)));

    // Get the next response
    tokio::spawn(async move {
        let mut assistant = Assistant::builder(config.model_client(), &owner_id)
            .database(&db, Some(&session_id))
            .transcript(transcript)
            .tools(tools)
            .max_steps(config.max_steps)
            .streaming(tx.clone())
            .build();

        if let Err(e) = assistant.next_msg(user_msg).await {
            tracing::error!("Chat handler error: {}. Root cause: {}", e, e.root_cause());
            // The client may already be gone
            let _ = tx.send(error_chunk(&e));
        }
    });

    let resp = Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::default()
                .text("keep-alive")
                .interval(Duration::from_secs(15)),
        )
        .into_response();

    Ok(resp)
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/{id}", get(chat_session))
}
