//! Database initialization
//!
//! Creates the registry schema on first run. Every statement is idempotent,
//! so opening an existing database is safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Pool size; workers beyond this wait for a connection
const MAX_CONNECTIONS: u32 = 16;

/// Open (or create) the registry database and ensure the schema exists
///
/// Foreign keys, WAL journaling and the busy timeout are connection-level
/// settings, so they are applied through the connect options and hold for
/// every pooled connection.
pub async fn init_database(db_path: &Path, busy_timeout_ms: u64) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_issuers_table(&pool).await?;
    create_invoices_table(&pool).await?;
    create_indexes(&pool).await?;

    info!(busy_timeout_ms, "Database schema ready (issuers, invoices)");

    Ok(pool)
}

/// Issuers: one row per tax id
pub async fn create_issuers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issuers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tax_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Invoices: one row per unique (access key, content hash)
pub async fn create_invoices_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            access_key TEXT NOT NULL UNIQUE,
            content_hash TEXT NOT NULL UNIQUE,
            issuer_id INTEGER NOT NULL REFERENCES issuers(id),
            received_date TEXT NOT NULL,
            issue_date TEXT NOT NULL,
            document_type TEXT NOT NULL,
            destination_path TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PROCESSED',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Secondary indexes for the lookup paths
pub async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_invoices_content_hash ON invoices(content_hash)",
        "CREATE INDEX IF NOT EXISTS idx_invoices_issuer_id ON invoices(issuer_id)",
        "CREATE INDEX IF NOT EXISTS idx_invoices_issue_date ON invoices(issue_date)",
        "CREATE INDEX IF NOT EXISTS idx_invoices_document_type ON invoices(document_type)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
