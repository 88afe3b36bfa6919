use anyhow::{Context, Result};
use std::time::Duration;

/// HubSpot's OAuth token endpoint.
pub const DEFAULT_HUBSPOT_TOKEN_URL: &str = "https://api.hubapi.com/oauth/v1/token";

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── Database (PostgreSQL, shared with the deck dashboard) ───────────
    pub database_url: String,
    pub database_max_connections: u32,

    // ── Service-to-service auth ─────────────────────────────────────────
    /// Shared secret the dashboard's request handlers send as `x-internal-secret`.
    pub auth_service_secret: String,

    // ── HubSpot OAuth app ───────────────────────────────────────────────
    pub hubspot_client_id: String,
    pub hubspot_client_secret: String,
    pub hubspot_token_url: String,
    pub http_timeout: Duration,

    // ── Token lifecycle ─────────────────────────────────────────────────
    /// Tokens expiring within this margin are treated as stale.
    pub refresh_margin: Duration,
    /// Zero disables the background sweep.
    pub sweep_interval: Duration,
    pub sweep_window: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8430".into())
                .parse()
                .context("Invalid PORT")?,

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,

            auth_service_secret: std::env::var("AUTH_SERVICE_SECRET")
                .context("AUTH_SERVICE_SECRET is required for service-to-service auth")?,

            hubspot_client_id: std::env::var("HUBSPOT_CLIENT_ID")
                .context("HUBSPOT_CLIENT_ID is required")?,
            hubspot_client_secret: std::env::var("HUBSPOT_CLIENT_SECRET")
                .context("HUBSPOT_CLIENT_SECRET is required")?,
            hubspot_token_url: std::env::var("HUBSPOT_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_HUBSPOT_TOKEN_URL.into()),
            http_timeout: Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", 15)?),

            refresh_margin: Duration::from_secs(env_parse("TOKEN_REFRESH_MARGIN_SECS", 60)?),
            sweep_interval: Duration::from_secs(env_parse("REFRESH_SWEEP_INTERVAL_SECS", 300)?),
            sweep_window: Duration::from_secs(env_parse("REFRESH_SWEEP_WINDOW_SECS", 600)?),
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("Invalid {key}")),
        Err(_) => Ok(default),
    }
}
