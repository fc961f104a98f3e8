//! Persistence for accepted submissions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::models::StoredSubmission;

/// Append-only store for accepted submissions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Persist a new record. The record's id is its key.
    async fn insert(&self, record: &StoredSubmission) -> Result<()>;
}

/// Table holding submissions.
pub const SUBMISSIONS_TABLE: &str = "contact_submissions";

const CREATE_TABLE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS contact_submissions (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    company TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT '',
    message TEXT NOT NULL,
    submitted_at TIMESTAMPTZ NOT NULL,
    status TEXT NOT NULL
)";

/// PostgreSQL-backed submission store.
///
/// The table is created on first use.
pub struct PgSubmissionStore {
    pool: PgPool,
    table_ready: OnceCell<()>,
}

impl PgSubmissionStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table_ready: OnceCell::new(),
        }
    }

    /// Create the submissions table if it does not exist.
    pub async fn ensure_table(&self) -> Result<()> {
        self.table_ready
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE_SQL)
                    .execute(&self.pool)
                    .await
                    .context("failed to create submissions table")?;
                debug!(table = SUBMISSIONS_TABLE, "submissions table ready");
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn insert(&self, record: &StoredSubmission) -> Result<()> {
        self.ensure_table().await?;

        sqlx::query(
            r"INSERT INTO contact_submissions
                (id, name, email, company, phone, message, submitted_at, status)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.company)
        .bind(&record.phone)
        .bind(&record.message)
        .bind(record.submitted_at)
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await
        .context("failed to insert submission")?;

        info!(submission_id = %record.id, "stored submission");
        Ok(())
    }
}

impl std::fmt::Debug for PgSubmissionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSubmissionStore")
            .field("table_ready", &self.table_ready.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_statement_is_idempotent() {
        assert!(CREATE_TABLE_SQL.contains("IF NOT EXISTS"));
        assert!(CREATE_TABLE_SQL.contains(SUBMISSIONS_TABLE));
    }
}
