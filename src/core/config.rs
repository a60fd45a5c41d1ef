use std::env;

use crate::ai::permissions::PromptVariant;
use crate::openai::ModelClient;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub openai_model: String,
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    pub prompt_variant: PromptVariant,
    pub max_steps: usize,
    pub default_timezone: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("STUPLAN_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/db", storage_path.trim_end_matches('/'));
        let openai_api_hostname = env::var("STUPLAN_LLM_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key =
            env::var("OPENAI_API_KEY").unwrap_or_else(|_| "thiswontworkforopenai".to_string());
        let openai_model =
            env::var("STUPLAN_LLM_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string());

        // An unrecognized variant falls back to the default rather than
        // refusing to start
        let prompt_variant = match env::var("STUPLAN_PROMPT_VARIANT") {
            Ok(value) => value.parse().unwrap_or_else(|err| {
                tracing::warn!("{}. Using {}", err, PromptVariant::default());
                PromptVariant::default()
            }),
            Err(_) => PromptVariant::default(),
        };
        let max_steps = env::var("STUPLAN_MAX_STEPS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(10);
        let default_timezone =
            env::var("STUPLAN_DEFAULT_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());

        Self {
            storage_path,
            db_path,
            openai_api_hostname,
            openai_api_key,
            openai_model,
            prompt_variant,
            max_steps,
            default_timezone,
        }
    }
}

impl AppConfig {
    pub fn model_client(&self) -> ModelClient {
        ModelClient::new(
            &self.openai_api_hostname,
            &self.openai_api_key,
            &self.openai_model,
        )
    }
}
