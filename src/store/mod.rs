//! Token store — persisted HubSpot OAuth tokens, one record per portal.
//!
//! The coordinator only sees the [`TokenStore`] trait; [`PgTokenStore`] is the
//! PostgreSQL backend shared with the deck dashboard.

pub mod db;
pub mod refresh;

pub use db::PgTokenStore;
pub use refresh::refresh_daemon;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AuthError;

/// Consecutive background-refresh failures after which a record is left alone.
pub const MAX_REFRESH_FAILURES: i32 = 3;

/// The persisted token record for one HubSpot portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub portal_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Fields written back after a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUpdate {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Look up the record for `portal_id`.
    ///
    /// A missing record and an unreachable store both fail with
    /// [`AuthError::TokenFetch`].
    async fn fetch(&self, portal_id: &str) -> Result<TokenRecord, AuthError>;

    /// Update the existing record for `portal_id`. Never inserts.
    async fn persist(&self, portal_id: &str, update: &TokenUpdate) -> Result<(), AuthError>;

    /// Records expiring before `before` that have not exhausted their failure budget.
    async fn expiring(&self, before: DateTime<Utc>) -> Result<Vec<TokenRecord>, AuthError>;

    /// Count one more failed background refresh for `portal_id`.
    async fn record_failure(&self, portal_id: &str) -> Result<(), AuthError>;
}
