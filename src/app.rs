//! Process bootstrap: storage selection, module registration, serving.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bookshelf_db::DbModule;
use bookshelf_kernel::settings::{Settings, StorageBackend};
use bookshelf_kernel::{InitCtx, ModuleRegistry};

use crate::modules;
use crate::modules::books::store::{BookStore, InMemoryBookStore, MongoBookStore};

/// Build the registry for the configured storage backend.
pub async fn build_registry(settings: &Settings) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();

    let store: Arc<dyn BookStore> = match settings.database.backend {
        StorageBackend::Mongo => {
            let client = bookshelf_db::connect(&settings.database)
                .await
                .context("failed to set up MongoDB client")?;
            let db = DbModule::new(client, settings.database.name.clone());
            let store = MongoBookStore::new(
                &db.database(),
                &settings.books.collection,
                Duration::from_millis(settings.database.operation_timeout_ms),
            );
            registry.register_core(Arc::new(db));
            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory book storage; data does not survive a restart");
            Arc::new(InMemoryBookStore::new())
        }
    };

    modules::register_all(&mut registry, store, &settings.books);
    Ok(registry)
}

/// Initialize modules, serve until a shutdown signal, then stop modules.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let registry = build_registry(&settings).await?;
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served = bookshelf_http::start_server(&registry, &settings).await;
    let stopped = registry.stop_all().await;

    served?;
    stopped?;
    tracing::info!("bookshelf shut down cleanly");
    Ok(())
}
