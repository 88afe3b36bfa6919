//! Route handlers. All handlers receive `SharedState` via Axum state extraction.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::error::AuthError;
use crate::SharedState;

pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/hubspot/token/{portal_id}", get(hubspot_token))
        .with_state(state)
}

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "deck-auth",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn require_internal(state: &SharedState, headers: &HeaderMap) -> Result<(), AuthError> {
    let internal = headers
        .get("x-internal-secret")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    if internal != state.config.auth_service_secret {
        return Err(AuthError::Unauthorized);
    }

    Ok(())
}

async fn hubspot_token(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(portal_id): Path<String>,
) -> Result<Json<serde_json::Value>, AuthError> {
    require_internal(&state, &headers)?;

    let access_token = state.tokens.ensure_access_token(&portal_id).await?;

    Ok(Json(json!({
        "data": {
            "portal_id": portal_id,
            "access_token": access_token,
        }
    })))
}
