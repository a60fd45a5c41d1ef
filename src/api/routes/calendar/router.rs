//! Router for the calendar API

use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get},
};
use axum_extra::extract::Query;
use chrono::Utc;

use super::public;
use crate::api::public::{ApiError, Owner};
use crate::api::state::AppState;
use crate::calendar::db::{delete_item, list_owned_items, upsert_item};
use crate::calendar::{ETIQUETTES, ViewPreferences, from_display, to_display};

type SharedState = Arc<RwLock<AppState>>;

fn db(state: &SharedState) -> tokio_rusqlite::Connection {
    state.read().expect("Unable to read share state").db.clone()
}

/// List the caller's items as they are stored
async fn list_items_handler(
    State(state): State<SharedState>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<public::CalendarItem>>, ApiError> {
    let items = list_owned_items(&db(&state), &owner_id).await?;
    Ok(Json(items))
}

/// Create or replace one of the caller's items
async fn upsert_item_handler(
    State(state): State<SharedState>,
    Owner(owner_id): Owner,
    Json(payload): Json<public::UpsertItem>,
) -> Result<Json<public::CalendarItem>, ApiError> {
    let item = upsert_item(&db(&state), &owner_id, payload).await?;
    Ok(Json(item))
}

async fn delete_item_handler(
    State(state): State<SharedState>,
    Owner(owner_id): Owner,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if delete_item(&db(&state), &owner_id, &id).await? {
        tracing::info!("Deleted calendar item {} for {}", id, owner_id);
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok((StatusCode::NOT_FOUND, format!("Calendar item {} not found", id)).into_response())
    }
}

/// The caller's items in the shape the calendar renders, without the
/// colors the caller chose to hide
async fn events_handler(
    State(state): State<SharedState>,
    Owner(owner_id): Owner,
    Query(params): Query<public::EventsQuery>,
) -> Result<Json<Vec<public::DisplayItem>>, ApiError> {
    let now = Utc::now();
    let items = list_owned_items(&db(&state), &owner_id).await?;
    let display = items.iter().map(|row| to_display(row, now)).collect();
    let prefs = ViewPreferences::hiding(params.hide);
    Ok(Json(prefs.filter(display)))
}

/// Save an item edited in the calendar
async fn save_event_handler(
    State(state): State<SharedState>,
    Owner(owner_id): Owner,
    Json(payload): Json<public::DisplayItem>,
) -> Result<Json<public::DisplayItem>, ApiError> {
    let saved = upsert_item(&db(&state), &owner_id, from_display(&payload)).await?;
    Ok(Json(to_display(&saved, Utc::now())))
}

async fn etiquettes_handler() -> Json<Vec<public::Etiquette>> {
    Json(ETIQUETTES.to_vec())
}

/// Create the calendar router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/items", get(list_items_handler).post(upsert_item_handler))
        .route("/items/{id}", delete(delete_item_handler))
        .route("/events", get(events_handler).put(save_event_handler))
        .route("/etiquettes", get(etiquettes_handler))
}
