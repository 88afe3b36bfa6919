use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{TokenRefresher, TokenSet};
use crate::config::Config;
use crate::error::AuthError;

/// HubSpot OAuth 2.0 refresher.
///
/// Access tokens live 30 minutes. HubSpot usually hands back the same refresh
/// token on refresh, but callers must not rely on it being present.
pub struct HubSpotRefresher {
    client_id: String,
    client_secret: String,
    token_url: String,
    http: reqwest::Client,
}

// Raw token response from HubSpot's token endpoint
#[derive(Debug, Deserialize)]
struct HubSpotTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: u64,
}

impl HubSpotRefresher {
    pub fn new(
        client_id: String,
        client_secret: String,
        token_url: String,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client_id,
            client_secret,
            token_url,
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        Self::new(
            config.hubspot_client_id.clone(),
            config.hubspot_client_secret.clone(),
            config.hubspot_token_url.clone(),
            config.http_timeout,
        )
    }
}

#[async_trait]
impl TokenRefresher for HubSpotRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])
            .send()
            .await
            .map_err(|e| AuthError::TokenRefresh(format!("Refresh request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::TokenRefresh(format!(
                "HubSpot refresh failed ({status}): {body}"
            )));
        }

        let token_resp: HubSpotTokenResponse = resp.json().await.map_err(|e| {
            AuthError::TokenRefresh(format!("Failed to parse refresh response: {e}"))
        })?;

        Ok(TokenSet {
            access_token: token_resp.access_token,
            refresh_token: token_resp.refresh_token,
            expires_in: token_resp.expires_in,
        })
    }
}
