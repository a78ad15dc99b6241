// Database connection and pool management
// This module handles SQLite database connections using sqlx

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use crate::domain::StoreResult;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: SqlitePool,
    id: u64,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        Self::with_max_connections(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Open a pool. In-memory databases are per connection, so they get exactly one.
    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let in_memory = is_memory_url(database_url);
        let max_connections = if in_memory { 1 } else { max_connections.max(1) };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            // Recycling the only connection would drop the database.
            pool_options = pool_options.min_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        debug!("Opened database {} as connection #{} ({} max)", database_url, id, max_connections);
        Ok(Self { pool, id })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Process-unique id of this pool.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        let create_documents_sql = r"
            CREATE TABLE IF NOT EXISTS queue_documents (
                _id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                document TEXT NOT NULL
            )
        ";

        let create_collection_index_sql = r"
            CREATE INDEX IF NOT EXISTS idx_queue_documents_collection ON queue_documents (collection)
        ";

        sqlx::query(create_documents_sql).execute(&self.pool).await?;
        sqlx::query(create_collection_index_sql).execute(&self.pool).await?;

        Ok(())
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}
