//! Cache Store Adapter
//!
//! Read/upsert access to the per-jurisdiction status cache, keyed by
//! normalized substance name. The store is an external collaborator behind
//! the [`StatusStore`] trait: the Postgres implementation is feature-gated,
//! the in-memory implementation backs tests and database-less builds.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{StatusRecord, SubstanceKey};

/// Narrow interface to the status cache.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Exact-match lookup by normalized key. Empty when absent; no fuzzy
    /// or prefix matching.
    async fn lookup(&self, key: &SubstanceKey) -> Result<Vec<StatusRecord>>;

    /// Idempotent write keyed on (substance, country_code): re-inserting an
    /// existing pair overwrites it. An empty slice is a trivially
    /// successful no-op.
    async fn upsert(&self, records: &[StatusRecord]) -> Result<()>;
}

#[cfg(feature = "database")]
pub use pg::PgStatusStore;

#[cfg(feature = "database")]
mod pg {
    use anyhow::Context;
    use chrono::{DateTime, Utc};
    use sqlx::{FromRow, PgPool};
    use tracing::debug;

    use super::*;
    use crate::model::AccessStatus;

    /// Persisted row shape.
    #[derive(Debug, Clone, FromRow)]
    struct StatusRow {
        substance: String,
        country_code: String,
        access_status: String,
        reference_link: Option<String>,
        updated_at: DateTime<Utc>,
    }

    impl From<StatusRow> for StatusRecord {
        fn from(row: StatusRow) -> Self {
            StatusRecord {
                substance: SubstanceKey::new(&row.substance),
                country_code: row.country_code.trim().to_string(),
                access_status: AccessStatus::parse(&row.access_status),
                reference_link: row.reference_link,
                updated_at: row.updated_at,
            }
        }
    }

    /// Postgres-backed status cache.
    #[derive(Clone, Debug)]
    pub struct PgStatusStore {
        pool: PgPool,
    }

    impl PgStatusStore {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }

        /// Get a reference to the connection pool.
        pub fn pool(&self) -> &PgPool {
            &self.pool
        }

        /// Create the cache table and its unique constraint if absent.
        pub async fn ensure_schema(&self) -> Result<()> {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS substance_status (
                    substance       TEXT NOT NULL,
                    country_code    CHAR(2) NOT NULL,
                    access_status   TEXT NOT NULL,
                    reference_link  TEXT,
                    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    PRIMARY KEY (substance, country_code)
                )
                "#,
            )
            .execute(&self.pool)
            .await
            .context("Failed to create substance_status table")?;
            Ok(())
        }
    }

    #[async_trait]
    impl StatusStore for PgStatusStore {
        async fn lookup(&self, key: &SubstanceKey) -> Result<Vec<StatusRecord>> {
            let rows: Vec<StatusRow> = sqlx::query_as(
                r#"
                SELECT substance, country_code, access_status, reference_link, updated_at
                FROM substance_status
                WHERE substance = $1
                ORDER BY country_code
                "#,
            )
            .bind(key.as_str())
            .fetch_all(&self.pool)
            .await
            .context("Failed to query substance_status")?;

            Ok(rows.into_iter().map(StatusRecord::from).collect())
        }

        async fn upsert(&self, records: &[StatusRecord]) -> Result<()> {
            if records.is_empty() {
                return Ok(());
            }

            let mut tx = self
                .pool
                .begin()
                .await
                .context("Failed to begin upsert transaction")?;
            for record in records {
                sqlx::query(
                    r#"
                    INSERT INTO substance_status
                        (substance, country_code, access_status, reference_link, updated_at)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (substance, country_code) DO UPDATE SET
                        access_status = EXCLUDED.access_status,
                        reference_link = EXCLUDED.reference_link,
                        updated_at = EXCLUDED.updated_at
                    "#,
                )
                .bind(record.substance.as_str())
                .bind(&record.country_code)
                .bind(record.access_status.as_str())
                .bind(&record.reference_link)
                .bind(record.updated_at)
                .execute(&mut *tx)
                .await
                .context("Failed to upsert status record")?;
            }
            tx.commit().await.context("Failed to commit upsert")?;

            debug!(count = records.len(), "persisted status records");
            Ok(())
        }
    }
}

/// In-memory status cache with the same contract as the Postgres store.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    rows: tokio::sync::Mutex<std::collections::HashMap<(String, String), StatusRecord>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn lookup(&self, key: &SubstanceKey) -> Result<Vec<StatusRecord>> {
        let rows = self.rows.lock().await;
        let mut matches: Vec<StatusRecord> = rows
            .values()
            .filter(|r| r.substance == *key)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.country_code.cmp(&b.country_code));
        Ok(matches)
    }

    async fn upsert(&self, records: &[StatusRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut rows = self.rows.lock().await;
        for record in records {
            rows.insert(
                (
                    record.substance.as_str().to_string(),
                    record.country_code.clone(),
                ),
                record.clone(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccessStatus;
    use chrono::Utc;

    fn record(substance: &str, code: &str, status: AccessStatus) -> StatusRecord {
        StatusRecord {
            substance: SubstanceKey::new(substance),
            country_code: code.to_string(),
            access_status: status,
            reference_link: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn double_upsert_is_idempotent() {
        let store = MemoryStatusStore::new();
        let records = vec![
            record("mdma", "US", AccessStatus::Banned),
            record("mdma", "AU", AccessStatus::ApprovedMedicalUse),
        ];

        store.upsert(&records).await.unwrap();
        store.upsert(&records).await.unwrap();

        let found = store.lookup(&SubstanceKey::new("MDMA")).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn reinsertion_overwrites_the_pair() {
        let store = MemoryStatusStore::new();
        store
            .upsert(&[record("mdma", "US", AccessStatus::Banned)])
            .await
            .unwrap();
        store
            .upsert(&[record("mdma", "US", AccessStatus::LimitedAccessTrials)])
            .await
            .unwrap();

        let found = store.lookup(&SubstanceKey::new("mdma")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].access_status, AccessStatus::LimitedAccessTrials);
    }

    #[tokio::test]
    async fn empty_upsert_is_a_noop() {
        let store = MemoryStatusStore::new();
        store.upsert(&[]).await.unwrap();
        assert!(store
            .lookup(&SubstanceKey::new("anything"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn lookup_is_exact_match_only() {
        let store = MemoryStatusStore::new();
        store
            .upsert(&[record("mdma", "US", AccessStatus::Banned)])
            .await
            .unwrap();

        assert_eq!(
            store.lookup(&SubstanceKey::new("mdma")).await.unwrap().len(),
            1
        );
        assert!(store.lookup(&SubstanceKey::new("mdm")).await.unwrap().is_empty());
        assert!(store
            .lookup(&SubstanceKey::new("mdma assay"))
            .await
            .unwrap()
            .is_empty());
    }
}
