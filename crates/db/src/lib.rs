//! MongoDB client factory and the `db` core module.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::{InitCtx, Module};
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};

/// Build a client from settings. The driver connects lazily, so this does not
/// touch the network; call [`ping`] to verify reachability.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Client> {
    let mut options = ClientOptions::parse(&settings.uri)
        .await
        .with_context(|| "failed to parse MongoDB connection string")?;

    let timeout = Duration::from_millis(settings.operation_timeout_ms);
    options.app_name.get_or_insert_with(|| "bookshelf".to_string());
    options.server_selection_timeout.get_or_insert(timeout);
    options.connect_timeout.get_or_insert(timeout);

    let client = Client::with_options(options).with_context(|| "failed to create MongoDB client")?;

    tracing::info!(target: "bookshelf-db", database = %settings.name, "MongoDB client created");
    Ok(client)
}

/// Round-trip a `ping` command against the configured database.
pub async fn ping(database: &Database) -> anyhow::Result<()> {
    database
        .run_command(doc! { "ping": 1 })
        .await
        .with_context(|| format!("ping against database '{}' failed", database.name()))?;
    Ok(())
}

/// Core module owning the shared MongoDB client.
pub struct DbModule {
    client: Client,
    database: String,
}

impl DbModule {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    /// Handle to the configured database.
    pub fn database(&self) -> Database {
        self.client.database(&self.database)
    }
}

#[async_trait]
impl Module for DbModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let timeout = Duration::from_millis(ctx.settings.database.operation_timeout_ms);
        tokio::time::timeout(timeout, ping(&self.database()))
            .await
            .with_context(|| format!("MongoDB ping timed out after {:?}", timeout))??;

        tracing::info!(
            module = self.name(),
            database = %self.database,
            "database reachable"
        );
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.client.clone().shutdown().await;
        tracing::info!(module = self.name(), "database client shut down");
        Ok(())
    }
}
