//! Issuer registry
//!
//! Resolves a tax id to a stable issuer row, keeping the stored name equal to
//! the standardized form of the most recent observation.
//!
//! **Locking:**
//! - Cache hits with an unchanged name take only the shared read lock.
//! - Everything else (miss, rename) runs under one async mutex, so a
//!   check-then-insert sequence is never interleaved within this process.
//! - Across processes the UNIQUE(tax_id) constraint decides: an insert that
//!   loses the race re-reads the winning row.

use crate::db::issuers;
use crate::utils::retry_on_lock;
use nfo_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

/// Characters removed from issuer names before comparison
const STRIPPED_CHARS: [char; 4] = ['.', '-', '/', '\\'];

/// Standardize an issuer name
///
/// Strips `. - / \`, collapses whitespace runs, trims, uppercases.
pub fn standardize_name(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Cached issuer identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerIdentity {
    pub id: i64,
    pub tax_id: String,
    /// Current standardized name
    pub name: String,
}

/// Result of [`IssuerRegistry::resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerResolution {
    pub issuer: IssuerIdentity,
    /// This call inserted the issuer row
    pub created: bool,
    /// Name replaced by this call, if the observed name differed
    pub previous_name: Option<String>,
}

/// Issuer registry with a write-through cache
pub struct IssuerRegistry {
    db: SqlitePool,
    max_lock_wait_ms: u64,
    cache: RwLock<HashMap<String, IssuerIdentity>>,
    write_lock: Mutex<()>,
}

impl IssuerRegistry {
    /// Empty cache; rows are loaded lazily on first sighting
    pub fn new(db: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            db,
            max_lock_wait_ms,
            cache: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Registry with the cache seeded from every stored issuer
    pub async fn load(db: SqlitePool, max_lock_wait_ms: u64) -> Result<Self> {
        let registry = Self::new(db, max_lock_wait_ms);
        let rows = issuers::load_all_issuers(&registry.db).await?;
        {
            let mut cache = registry.cache.write().await;
            for row in rows {
                cache.insert(
                    row.tax_id.clone(),
                    IssuerIdentity {
                        id: row.id,
                        tax_id: row.tax_id,
                        name: row.name,
                    },
                );
            }
        }
        Ok(registry)
    }

    /// Number of cached issuers
    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Resolve `tax_id` to its issuer, creating or renaming as needed
    pub async fn resolve(&self, tax_id: &str, observed_name: &str) -> Result<IssuerResolution> {
        let standardized = standardize_name(observed_name);

        // Fast path: shared read
        if let Some(hit) = self.cache.read().await.get(tax_id) {
            if hit.name == standardized {
                return Ok(IssuerResolution {
                    issuer: hit.clone(),
                    created: false,
                    previous_name: None,
                });
            }
        }

        let _guard = self.write_lock.lock().await;

        // Re-check: another worker may have resolved this tax id meanwhile
        let cached = self.cache.read().await.get(tax_id).cloned();

        let (mut issuer, created) = match cached {
            Some(identity) => (identity, false),
            None => {
                let (row, inserted) = retry_on_lock("issuer insert", self.max_lock_wait_ms, || {
                    issuers::insert_if_absent(&self.db, tax_id, &standardized)
                })
                .await?;

                if inserted {
                    tracing::info!(tax_id = %tax_id, name = %row.name, "New issuer registered");
                }

                (
                    IssuerIdentity {
                        id: row.id,
                        tax_id: row.tax_id,
                        name: row.name,
                    },
                    inserted,
                )
            }
        };

        let mut previous_name = None;
        if issuer.name != standardized {
            retry_on_lock("issuer rename", self.max_lock_wait_ms, || {
                issuers::update_name(&self.db, issuer.id, &standardized)
            })
            .await?;

            tracing::info!(
                tax_id = %tax_id,
                old_name = %issuer.name,
                new_name = %standardized,
                "Issuer name updated"
            );

            previous_name = Some(std::mem::replace(&mut issuer.name, standardized));
        }

        self.cache
            .write()
            .await
            .insert(tax_id.to_string(), issuer.clone());

        Ok(IssuerResolution {
            issuer,
            created,
            previous_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_pool() -> (TempDir, SqlitePool) {
        let temp_dir = TempDir::new().unwrap();
        let pool = nfo_common::db::init_database(&temp_dir.path().join("test.db"), 250)
            .await
            .unwrap();
        (temp_dir, pool)
    }

    #[test]
    fn test_standardize_name() {
        assert_eq!(standardize_name("Acme Ltda."), "ACME LTDA");
        assert_eq!(standardize_name("  a.b-c/d\\e   f  "), "ABCDE F");
        assert_eq!(standardize_name("Comércio\t de  Peças"), "COMÉRCIO DE PEÇAS");
    }

    #[tokio::test]
    async fn test_first_sighting_creates_issuer() {
        let (_dir, pool) = setup_pool().await;
        let registry = IssuerRegistry::new(pool.clone(), 2000);

        let resolution = registry.resolve("111", "acme ltda.").await.unwrap();

        assert!(resolution.created);
        assert_eq!(resolution.issuer.name, "ACME LTDA");
        assert_eq!(resolution.previous_name, None);
        assert_eq!(issuers::count_issuers(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_name_hits_cache() {
        let (_dir, pool) = setup_pool().await;
        let registry = IssuerRegistry::new(pool, 2000);

        let first = registry.resolve("111", "ACME").await.unwrap();
        let second = registry.resolve("111", "acme").await.unwrap();

        assert_eq!(first.issuer, second.issuer);
        assert!(!second.created);
        assert_eq!(second.previous_name, None);
    }

    #[tokio::test]
    async fn test_rename_overwrites_store_and_cache() {
        let (_dir, pool) = setup_pool().await;
        let registry = IssuerRegistry::new(pool.clone(), 2000);

        let first = registry.resolve("111", "ACME LTDA.").await.unwrap();
        let renamed = registry.resolve("111", "Acme Comercio Ltda").await.unwrap();

        assert_eq!(renamed.issuer.id, first.issuer.id);
        assert_eq!(renamed.issuer.name, "ACME COMERCIO LTDA");
        assert_eq!(renamed.previous_name.as_deref(), Some("ACME LTDA"));

        let stored = issuers::find_by_tax_id(&pool, "111").await.unwrap().unwrap();
        assert_eq!(stored.name, "ACME COMERCIO LTDA");
        assert_eq!(issuers::count_issuers(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_seeds_cache_and_detects_rename() {
        let (_dir, pool) = setup_pool().await;
        issuers::insert_if_absent(&pool, "222", "OLD NAME").await.unwrap();

        let registry = IssuerRegistry::load(pool.clone(), 2000).await.unwrap();
        assert_eq!(registry.cached_count().await, 1);

        let resolution = registry.resolve("222", "New Name").await.unwrap();
        assert!(!resolution.created);
        assert_eq!(resolution.previous_name.as_deref(), Some("OLD NAME"));
    }

    #[tokio::test]
    async fn test_uncached_existing_row_is_reused() {
        let (_dir, pool) = setup_pool().await;
        let (row, _) = issuers::insert_if_absent(&pool, "333", "OTHER PROCESS").await.unwrap();

        // Cache is empty: the row was written by someone else
        let registry = IssuerRegistry::new(pool.clone(), 2000);
        let resolution = registry.resolve("333", "Other Process").await.unwrap();

        assert_eq!(resolution.issuer.id, row.id);
        assert!(!resolution.created);
        assert_eq!(issuers::count_issuers(&pool).await.unwrap(), 1);
    }
}
