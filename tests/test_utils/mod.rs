//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::{Arc, RwLock};

use axum::{Router, body::Body};

use stuplan::ai::permissions::PromptVariant;
use stuplan::api::AppState;
use stuplan::api::app;
use stuplan::core::AppConfig;
use stuplan::core::db::{async_db, migrate_db};

/// Creates a test application router backed by a fresh database in a
/// temporary directory. Model calls go to `model_host`.
///
/// Tests using this fixture should be marked `#[serial]` since they
/// share the process environment and log subscriber.
pub async fn test_app_with_model(model_host: &str) -> Router {
    let dir = tempfile::tempdir()
        .expect("Failed to create base directory")
        .keep();
    let db_path = dir.join("db");
    std::fs::create_dir_all(&db_path).expect("Failed to create db directory");
    let db_path = db_path.to_str().unwrap().to_string();

    let db = async_db(&db_path)
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        migrate_db(conn).expect("Failed to migrate db");
        Ok(())
    })
    .await
    .unwrap();

    let app_config = AppConfig {
        storage_path: dir.display().to_string(),
        db_path,
        openai_model: String::from("gpt-4o"),
        openai_api_hostname: model_host.to_string(),
        openai_api_key: String::from("test-api-key"),
        prompt_variant: PromptVariant::ReadCreateUpdate,
        max_steps: 10,
        default_timezone: String::from("Africa/Lagos"),
    };
    let app_state = AppState::new(db, app_config);
    app(Arc::new(RwLock::new(app_state)))
}

pub async fn test_app() -> Router {
    // Nothing listens here so any model call fails fast
    test_app_with_model("http://127.0.0.1:9").await
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf-8")
}
