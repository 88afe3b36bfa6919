use async_trait::async_trait;

use crate::error::AuthError;

/// Tokens returned by an OAuth provider after a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    /// `None` when the provider did not rotate the refresh token.
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Fails with [`AuthError::TokenRefresh`] on any transport or provider error.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError>;
}
