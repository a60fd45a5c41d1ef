use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod init;
pub mod migrate;
pub mod serve;

use crate::core::AppConfig;

#[derive(Subcommand)]
enum Command {
    /// Create the storage directory and database
    Init {
        #[arg(long, action, default_value = "false")]
        db: bool,
    },
    /// Migrate the db schema
    Migrate {},
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Chat with the calendar assistant on behalf of a user
    Chat {
        /// ID of the user whose calendar the assistant works on
        #[arg(long)]
        user: String,

        /// IANA timezone of the user, e.g. Africa/Lagos
        #[arg(long)]
        timezone: Option<String>,

        /// Name the assistant addresses the user by
        #[arg(long)]
        name: Option<String>,

        /// Print the reply as it is generated
        #[arg(long, action, default_value = "false")]
        stream: bool,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Init { db }) => {
            init::run(db, &config.db_path).await?;
        }
        Some(Command::Migrate {}) => {
            migrate::run(&config.db_path).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Chat {
            user,
            timezone,
            name,
            stream,
        }) => {
            chat::run(config, &user, timezone.as_deref(), name.as_deref(), stream).await?;
        }
        None => {}
    }

    Ok(())
}
