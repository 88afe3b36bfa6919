use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use deck_auth::providers::HubSpotRefresher;
use deck_auth::store::{self, PgTokenStore};
use deck_auth::{api, AppState, Config, SharedState, TokenManager};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deck_auth=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("deck-auth v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    let token_store = PgTokenStore::new(&config.database_url, config.database_max_connections).await?;
    token_store.migrate().await?;
    info!("Database connected and migrated ✓");

    let refresher = HubSpotRefresher::from_config(&config)?;
    let tokens = Arc::new(TokenManager::new(
        Arc::new(token_store),
        Arc::new(refresher),
        config.refresh_margin,
    ));

    if config.sweep_interval.is_zero() {
        info!("Token refresh daemon disabled");
    } else {
        let daemon_tokens = tokens.clone();
        let (interval, window) = (config.sweep_interval, config.sweep_window);
        tokio::spawn(async move {
            store::refresh_daemon(daemon_tokens, interval, window).await;
        });
    }

    let state: SharedState = Arc::new(AppState {
        config: config.clone(),
        tokens,
    });

    let app = api::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready ✓");
    axum::serve(listener, app).await?;

    Ok(())
}
