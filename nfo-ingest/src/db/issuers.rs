//! Issuer database operations

use nfo_common::db::Issuer;
use nfo_common::Result;
use sqlx::SqlitePool;

/// Load every issuer (cache seeding)
pub async fn load_all_issuers(pool: &SqlitePool) -> Result<Vec<Issuer>> {
    let issuers = sqlx::query_as::<_, Issuer>(
        "SELECT id, tax_id, name, created_at, updated_at FROM issuers ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(issuers)
}

/// Look up an issuer by tax id
pub async fn find_by_tax_id(pool: &SqlitePool, tax_id: &str) -> Result<Option<Issuer>> {
    let issuer = sqlx::query_as::<_, Issuer>(
        "SELECT id, tax_id, name, created_at, updated_at FROM issuers WHERE tax_id = ?",
    )
    .bind(tax_id)
    .fetch_optional(pool)
    .await?;
    Ok(issuer)
}

/// Insert an issuer unless the tax id already exists
///
/// Returns the stored row and whether this call created it. A concurrent
/// insert of the same tax id (another worker, another process) resolves to
/// the row that won.
pub async fn insert_if_absent(pool: &SqlitePool, tax_id: &str, name: &str) -> Result<(Issuer, bool)> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO issuers (tax_id, name, created_at, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(tax_id) DO NOTHING
        "#,
    )
    .bind(tax_id)
    .bind(name)
    .execute(pool)
    .await?
    .rows_affected()
        > 0;

    let issuer = sqlx::query_as::<_, Issuer>(
        "SELECT id, tax_id, name, created_at, updated_at FROM issuers WHERE tax_id = ?",
    )
    .bind(tax_id)
    .fetch_one(pool)
    .await?;

    Ok((issuer, inserted))
}

/// Overwrite the stored name (last write wins, no history)
pub async fn update_name(pool: &SqlitePool, id: i64, name: &str) -> Result<()> {
    sqlx::query("UPDATE issuers SET name = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Count issuers
pub async fn count_issuers(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issuers")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
