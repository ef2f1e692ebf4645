use std::time::Duration;

use anyhow::Context;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bookshelf-cli", version, about = "Run and inspect the bookshelf service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP service (default)
    Serve,
    /// Print the resolved configuration as JSON
    Config,
    /// Check that the configured MongoDB deployment answers a ping
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "bookshelf-cli serving");
            bookshelf_app::run(settings).await
        }
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&settings)
                .with_context(|| "failed to render settings")?;
            println!("{}", rendered);
            Ok(())
        }
        Command::Ping => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            let client = bookshelf_db::connect(&settings.database).await?;
            let database = client.database(&settings.database.name);
            let timeout = Duration::from_millis(settings.database.operation_timeout_ms);

            tokio::time::timeout(timeout, bookshelf_db::ping(&database))
                .await
                .with_context(|| format!("ping timed out after {:?}", timeout))??;

            println!("MongoDB at {} is reachable", settings.database.uri);
            Ok(())
        }
    }
}
