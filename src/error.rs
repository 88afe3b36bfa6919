use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the deck-auth service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // ── Token lifecycle ─────────────────────────────────────────────────
    /// No usable record for the portal; the portal has to be reconnected.
    #[error("Token fetch failed: {0}")]
    TokenFetch(String),

    /// The OAuth provider rejected or failed the refresh; retry later.
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    // ── Auth ────────────────────────────────────────────────────────────
    #[error("Authentication required")]
    Unauthorized,

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code surfaced to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::TokenFetch(_) => "reconnect_required",
            AuthError::TokenRefresh(_) => "refresh_failed",
            AuthError::Unauthorized => "unauthorized",
            AuthError::Database(_) => "database_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::TokenFetch(_) => StatusCode::CONFLICT,
            AuthError::TokenRefresh(_) => StatusCode::BAD_GATEWAY,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        AuthError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
