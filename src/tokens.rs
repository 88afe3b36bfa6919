//! Token lifecycle coordinator.
//!
//! [`TokenManager::ensure_access_token`] returns a HubSpot access token that is
//! valid for at least the staleness margin, refreshing it through the
//! provider when needed. Refreshes are single-flight per portal: concurrent
//! callers for the same portal queue on one async mutex and re-read the record
//! once they hold it, so only the first of them talks to HubSpot.
//!
//! The locked refresh runs on its own task. A caller that gives up (client
//! disconnect, timeout) only stops waiting; the exchange with HubSpot and the
//! write back to the store still complete.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::AuthError;
use crate::providers::TokenRefresher;
use crate::store::{TokenRecord, TokenStore, TokenUpdate};

pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

// Caps provider-supplied lifetimes so the expiry arithmetic cannot overflow.
const MAX_TOKEN_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

type PortalLock = Arc<tokio::sync::Mutex<()>>;
type LockTable = Arc<Mutex<HashMap<String, PortalLock>>>;

pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    margin: chrono::Duration,
    locks: LockTable,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        margin: Duration,
    ) -> Self {
        Self {
            store,
            refresher,
            margin: to_chrono(margin),
            locks: LockTable::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Return a currently valid access token for `portal_id`.
    pub async fn ensure_access_token(&self, portal_id: &str) -> Result<String, AuthError> {
        self.ensure_access_token_at(portal_id, Utc::now()).await
    }

    /// [`ensure_access_token`](Self::ensure_access_token) against an explicit clock.
    pub async fn ensure_access_token_at(
        &self,
        portal_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        self.ensure_within(portal_id, self.margin, now).await
    }

    /// Like [`ensure_access_token_at`](Self::ensure_access_token_at), but treats
    /// anything expiring within `window` as stale. Used by the background sweep.
    pub async fn refresh_if_expiring(
        &self,
        portal_id: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        self.ensure_within(portal_id, to_chrono(window), now).await
    }

    async fn ensure_within(
        &self,
        portal_id: &str,
        margin: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let record = self.store.fetch(portal_id).await?;
        if is_fresh(&record, margin, now) {
            return Ok(record.access_token);
        }

        let task = RefreshTask {
            store: self.store.clone(),
            refresher: self.refresher.clone(),
            locks: self.locks.clone(),
            portal_id: portal_id.to_string(),
            margin,
            now,
        };

        tokio::spawn(task.run())
            .await
            .map_err(|e| AuthError::Internal(format!("token refresh task failed: {e}")))?
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

/// Everything a detached refresh needs, owned so it can outlive the caller.
struct RefreshTask {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    locks: LockTable,
    portal_id: String,
    margin: chrono::Duration,
    now: DateTime<Utc>,
}

impl RefreshTask {
    async fn run(self) -> Result<String, AuthError> {
        let lease = PortalLease::acquire(&self.locks, &self.portal_id);
        let _guard = lease.lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<String, AuthError> {
        let portal_id = self.portal_id.as_str();

        // Another caller may have refreshed while we waited for the lock.
        let record = self.store.fetch(portal_id).await?;
        if is_fresh(&record, self.margin, self.now) {
            debug!(portal_id, "Token refreshed by a concurrent caller");
            return Ok(record.access_token);
        }

        let tokens = self.refresher.refresh(&record.refresh_token).await?;
        let lifetime = tokens.expires_in.min(MAX_TOKEN_LIFETIME_SECS) as i64;
        let update = TokenUpdate {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token.unwrap_or(record.refresh_token),
            expires_at: self.now + chrono::Duration::seconds(lifetime),
        };

        // The new token is usable even if the write fails; the next call will
        // just refresh again.
        match self.store.persist(portal_id, &update).await {
            Ok(()) => info!(portal_id, expires_at = %update.expires_at, "Refreshed HubSpot token"),
            Err(e) => error!(
                portal_id,
                expires_at = %update.expires_at,
                "Refreshed HubSpot token but failed to persist it: {e}"
            ),
        }

        Ok(update.access_token)
    }
}

/// A handle on one portal's lock; the table entry is dropped with the last lease.
struct PortalLease {
    locks: LockTable,
    portal_id: String,
    lock: PortalLock,
}

impl PortalLease {
    fn acquire(locks: &LockTable, portal_id: &str) -> Self {
        let lock = {
            let mut table = locks.lock().unwrap_or_else(|e| e.into_inner());
            table.entry(portal_id.to_string()).or_default().clone()
        };
        Self {
            locks: locks.clone(),
            portal_id: portal_id.to_string(),
            lock,
        }
    }
}

impl Drop for PortalLease {
    fn drop(&mut self) {
        let mut table = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // The table's handle plus ours: nobody else is waiting on this portal.
        if table
            .get(&self.portal_id)
            .is_some_and(|l| Arc::strong_count(l) == 2)
        {
            table.remove(&self.portal_id);
        }
    }
}

fn is_fresh(record: &TokenRecord, margin: chrono::Duration, now: DateTime<Utc>) -> bool {
    record.expires_at - now > margin
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d)
        .unwrap_or_else(|_| chrono::Duration::seconds(MAX_TOKEN_LIFETIME_SECS as i64))
}
