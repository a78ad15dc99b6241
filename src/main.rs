//! `crawl-queue` - open a queue from configuration and report its progress

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crawl_queue_store::domain::DocumentCollection;
use crawl_queue_store::infrastructure::{DatabaseConnection, QueueConfig, SqliteCollection, init_logging_with_config};
use crawl_queue_store::QueueStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = QueueConfig::load(config_path.as_deref())?;
    init_logging_with_config(&config.logging)?;

    info!("Opening queue database at {}", config.database.url);
    if let Some(parent) = sqlite_file_parent(&config.database.url) {
        std::fs::create_dir_all(&parent)
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }
    let db = DatabaseConnection::with_max_connections(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open queue database")?;
    db.migrate().await.context("Failed to migrate queue database")?;

    let collection: Arc<dyn DocumentCollection> = Arc::new(SqliteCollection::new(&db, &config.database.collection));
    let name = config.queue.name.as_deref();
    let store = if config.queue.ensure_indexes_on_start {
        QueueStore::create(collection, name).await?
    } else {
        QueueStore::new(collection, name)?
    };
    info!("Using queue {}", store.name());

    let summary = store.summary().await?;
    info!(
        "Queue {}: {} item(s), {} queued, {} fetched",
        summary.queue_name, summary.length, summary.queued, summary.fetched
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Parent directory of a file-backed `sqlite:` URL.
fn sqlite_file_parent(url: &str) -> Option<PathBuf> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next()?;
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    PathBuf::from(path).parent().filter(|p| !p.as_os_str().is_empty()).map(PathBuf::from)
}
