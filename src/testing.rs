//! In-memory fakes shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::Config;
use crate::error::AuthError;
use crate::providers::{TokenRefresher, TokenSet};
use crate::store::{TokenRecord, TokenStore, TokenUpdate, MAX_REFRESH_FAILURES};

#[derive(Default)]
pub struct MemoryTokenStore {
    records: Mutex<HashMap<String, (TokenRecord, i32)>>,
    pub fetches: AtomicUsize,
    pub persists: AtomicUsize,
    pub fail_persist: AtomicBool,
    pub fail_record_failure: AtomicBool,
}

impl MemoryTokenStore {
    pub fn with(records: impl IntoIterator<Item = TokenRecord>) -> Self {
        let store = Self::default();
        {
            let mut map = store.records.lock().unwrap();
            for r in records {
                map.insert(r.portal_id.clone(), (r, 0));
            }
        }
        store
    }

    pub fn get(&self, portal_id: &str) -> Option<TokenRecord> {
        self.records
            .lock()
            .unwrap()
            .get(portal_id)
            .map(|(r, _)| r.clone())
    }

    pub fn failures(&self, portal_id: &str) -> i32 {
        self.records
            .lock()
            .unwrap()
            .get(portal_id)
            .map(|(_, f)| *f)
            .unwrap_or_default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn fetch(&self, portal_id: &str) -> Result<TokenRecord, AuthError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.get(portal_id)
            .ok_or_else(|| AuthError::TokenFetch(format!("no token record for portal {portal_id}")))
    }

    async fn persist(&self, portal_id: &str, update: &TokenUpdate) -> Result<(), AuthError> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(AuthError::Database("connection reset".into()));
        }
        let mut map = self.records.lock().unwrap();
        let (record, failures) = map
            .get_mut(portal_id)
            .ok_or_else(|| AuthError::TokenFetch(format!("no token record for portal {portal_id}")))?;
        record.access_token = update.access_token.clone();
        record.refresh_token = update.refresh_token.clone();
        record.expires_at = update.expires_at;
        *failures = 0;
        Ok(())
    }

    async fn expiring(&self, before: DateTime<Utc>) -> Result<Vec<TokenRecord>, AuthError> {
        let map = self.records.lock().unwrap();
        let mut out: Vec<_> = map
            .values()
            .filter(|(r, f)| r.expires_at < before && *f < MAX_REFRESH_FAILURES)
            .map(|(r, _)| r.clone())
            .collect();
        out.sort_by_key(|r| r.expires_at);
        Ok(out)
    }

    async fn record_failure(&self, portal_id: &str) -> Result<(), AuthError> {
        if self.fail_record_failure.load(Ordering::SeqCst) {
            return Err(AuthError::Database("connection reset".into()));
        }
        if let Some((_, f)) = self.records.lock().unwrap().get_mut(portal_id) {
            *f += 1;
        }
        Ok(())
    }
}

/// Replays scripted responses and counts calls.
#[derive(Default)]
pub struct ScriptedRefresher {
    responses: Mutex<VecDeque<Result<TokenSet, AuthError>>>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<String>>,
    pub delay: Option<Duration>,
}

impl ScriptedRefresher {
    pub fn new(responses: impl IntoIterator<Item = Result<TokenSet, AuthError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(refresh_token.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::TokenRefresh("no scripted response".into())))
    }
}

pub fn record(portal_id: &str, access: &str, refresh: &str, expires_at: DateTime<Utc>) -> TokenRecord {
    TokenRecord {
        portal_id: portal_id.into(),
        access_token: access.into(),
        refresh_token: refresh.into(),
        expires_at,
    }
}

pub fn token_set(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenSet {
    TokenSet {
        access_token: access.into(),
        refresh_token: refresh.map(Into::into),
        expires_in,
    }
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "postgres://localhost/deck_test".into(),
        database_max_connections: 1,
        auth_service_secret: "internal-secret".into(),
        hubspot_client_id: "client-abc".into(),
        hubspot_client_secret: "secret-xyz".into(),
        hubspot_token_url: "http://127.0.0.1:9/oauth/v1/token".into(),
        http_timeout: Duration::from_secs(5),
        refresh_margin: Duration::from_secs(60),
        sweep_interval: Duration::ZERO,
        sweep_window: Duration::from_secs(600),
    }
}
