use std::io::Write;

use anyhow::Result;
use chrono::Utc;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::ai::chat::Assistant;
use crate::ai::prompt::{PromptContext, system_prompt};
use crate::ai::tools::calendar_tools;
use crate::calendar::time::resolve_timezone;
use crate::core::db::{async_db, migrate_db};
use crate::core::{AppConfig, logging};
use crate::openai::{Message, Role};

/// Print streamed content deltas as they arrive.
fn spawn_printer(mut rx: mpsc::UnboundedReceiver<String>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            let Ok(chunk) = serde_json::from_str::<Value>(&chunk) else {
                continue;
            };
            if let Some(content) = chunk["choices"][0]["delta"]["content"].as_str() {
                print!("{}", content);
                let _ = std::io::stdout().flush();
            }
        }
        println!();
    })
}

pub async fn run(
    config: AppConfig,
    user_id: &str,
    timezone: Option<&str>,
    user_name: Option<&str>,
    stream: bool,
) -> Result<()> {
    logging::init();
    let mut rl = DefaultEditor::new()?;

    let db = async_db(&config.db_path).await?;
    db.call(|conn| Ok(migrate_db(conn)?)).await?;

    let tz = resolve_timezone(timezone.unwrap_or(&config.default_timezone));
    let context = PromptContext::new(user_id, user_name, tz, config.prompt_variant, Utc::now());
    let transcript = vec![Message::new(Role::System, &system_prompt(&context)?)];
    let tools = calendar_tools(&db, user_id, tz, config.prompt_variant);

    let mut builder = Assistant::builder(config.model_client(), user_id)
        .transcript(transcript)
        .tools(tools)
        .max_steps(config.max_steps);
    let mut printer = None;
    if stream {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        builder = builder.streaming(tx);
        printer = Some(spawn_printer(rx));
    }
    let mut assistant = builder.build();

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                match assistant.next_msg(Message::new(Role::User, &line)).await {
                    Ok(messages) => {
                        if !stream {
                            if let Some(content) =
                                messages.last().and_then(|m| m.content.as_deref())
                            {
                                println!("{}", content);
                            }
                        }
                    }
                    // A failed turn leaves the transcript as it was so
                    // the conversation can go on
                    Err(err) => eprintln!("Error: {}", err),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    // Closes the stream so the printer finishes
    drop(assistant);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    Ok(())
}
