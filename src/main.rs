use anyhow::Result;
use stuplan::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
