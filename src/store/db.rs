//! PostgreSQL-backed token store.
//!
//! Table `hubspot_tokens`: one row per portal, keyed by `portal_id`. The
//! onboarding flow owns inserts and the uninstall flow owns deletes; this
//! service only reads and updates rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::error;

use super::{TokenRecord, TokenStore, TokenUpdate, MAX_REFRESH_FAILURES};
use crate::error::AuthError;

/// Token store backed by PostgreSQL.
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub async fn new(db_url: &str, max_connections: u32) -> Result<Self, AuthError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await
            .map_err(|e| AuthError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool })
    }

    /// Bootstrap the schema on a fresh database (local dev).
    ///
    /// An existing table keeps its data; the bookkeeping columns this store
    /// writes (`failure_count`, `updated_at`) are added when missing.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hubspot_tokens (
                portal_id       TEXT PRIMARY KEY,
                access_token    TEXT NOT NULL,
                refresh_token   TEXT NOT NULL,
                expires_at      TIMESTAMPTZ NOT NULL,
                failure_count   INT NOT NULL DEFAULT 0,
                created_at      TIMESTAMPTZ DEFAULT NOW(),
                updated_at      TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "ALTER TABLE hubspot_tokens ADD COLUMN IF NOT EXISTS failure_count INT NOT NULL DEFAULT 0",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "ALTER TABLE hubspot_tokens ADD COLUMN IF NOT EXISTS created_at TIMESTAMPTZ DEFAULT NOW()",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "ALTER TABLE hubspot_tokens ADD COLUMN IF NOT EXISTS updated_at TIMESTAMPTZ DEFAULT NOW()",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_hubspot_tokens_expiry ON hubspot_tokens(expires_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> TokenRecord {
    TokenRecord {
        portal_id: row.get(0),
        access_token: row.get(1),
        refresh_token: row.get(2),
        expires_at: row.get(3),
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn fetch(&self, portal_id: &str) -> Result<TokenRecord, AuthError> {
        let row = sqlx::query(
            r#"
            SELECT portal_id, access_token, refresh_token, expires_at
            FROM hubspot_tokens
            WHERE portal_id = $1
            "#,
        )
        .bind(portal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(portal_id, "Token lookup failed: {e}");
            AuthError::TokenFetch(format!("token store unavailable: {e}"))
        })?;

        match row {
            Some(row) => Ok(record_from_row(&row)),
            None => Err(AuthError::TokenFetch(format!(
                "no token record for portal {portal_id}"
            ))),
        }
    }

    async fn persist(&self, portal_id: &str, update: &TokenUpdate) -> Result<(), AuthError> {
        let affected = sqlx::query(
            r#"
            UPDATE hubspot_tokens
            SET access_token = $1,
                refresh_token = $2,
                expires_at = $3,
                failure_count = 0,
                updated_at = NOW()
            WHERE portal_id = $4
            "#,
        )
        .bind(&update.access_token)
        .bind(&update.refresh_token)
        .bind(update.expires_at)
        .bind(portal_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(AuthError::TokenFetch(format!(
                "no token record for portal {portal_id}"
            )));
        }

        Ok(())
    }

    async fn expiring(&self, before: DateTime<Utc>) -> Result<Vec<TokenRecord>, AuthError> {
        let rows = sqlx::query(
            r#"
            SELECT portal_id, access_token, refresh_token, expires_at
            FROM hubspot_tokens
            WHERE expires_at < $1
              AND failure_count < $2
            ORDER BY expires_at
            "#,
        )
        .bind(before)
        .bind(MAX_REFRESH_FAILURES)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn record_failure(&self, portal_id: &str) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE hubspot_tokens SET failure_count = failure_count + 1, updated_at = NOW() WHERE portal_id = $1",
        )
        .bind(portal_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
