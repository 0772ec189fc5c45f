//! Database initialization tests
//!
//! Schema creation, idempotent re-open and constraint enforcement.

use nfo_common::db::init_database;
use tempfile::TempDir;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_creates_schema_on_first_open() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("nfo.db");

    let pool = init_database(&db_path, 250).await.unwrap();

    assert!(db_path.exists());
    assert_eq!(table_names(&pool).await, vec!["invoices", "issuers"]);
}

#[tokio::test]
async fn test_reopen_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nfo.db");

    let pool = init_database(&db_path, 250).await.unwrap();
    sqlx::query("INSERT INTO issuers (tax_id, name) VALUES ('111', 'ACME')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path, 250).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issuers")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_unique_constraints_enforced() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("nfo.db"), 250)
        .await
        .unwrap();

    sqlx::query("INSERT INTO issuers (tax_id, name) VALUES ('111', 'ACME')")
        .execute(&pool)
        .await
        .unwrap();
    let dup_issuer = sqlx::query("INSERT INTO issuers (tax_id, name) VALUES ('111', 'OTHER')")
        .execute(&pool)
        .await;
    assert!(dup_issuer.is_err());

    let insert_invoice = |key: &'static str, hash: &'static str| {
        sqlx::query(
            "INSERT INTO invoices (access_key, content_hash, issuer_id, received_date, issue_date, document_type, destination_path)
             VALUES (?, ?, 1, '2024-01-02', '2024-01-01', 'NFE', '/out/a.xml')",
        )
        .bind(key)
        .bind(hash)
        .execute(&pool)
    };

    insert_invoice("KEY1", "HASH1").await.unwrap();
    assert!(insert_invoice("KEY1", "HASH2").await.is_err());
    assert!(insert_invoice("KEY2", "HASH1").await.is_err());
    insert_invoice("KEY2", "HASH2").await.unwrap();
}

#[tokio::test]
async fn test_foreign_key_enforced_on_every_connection() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("nfo.db"), 250)
        .await
        .unwrap();

    // Hold one connection so the insert below runs on another
    let _held = pool.acquire().await.unwrap();

    let orphan = sqlx::query(
        "INSERT INTO invoices (access_key, content_hash, issuer_id, received_date, issue_date, document_type, destination_path)
         VALUES ('K', 'H', 999, '2024-01-02', '2024-01-01', 'NFE', '/out/a.xml')",
    )
    .execute(&pool)
    .await;

    assert!(orphan.is_err(), "invoice must not reference a missing issuer");
}
