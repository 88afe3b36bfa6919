pub mod api;
pub mod config;
pub mod error;
pub mod providers;
pub mod store;
pub mod tokens;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::AuthError;
pub use tokens::TokenManager;

use std::sync::Arc;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub tokens: Arc<TokenManager>,
}

pub type SharedState = Arc<AppState>;
