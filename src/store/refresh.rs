//! Background token refresh daemon.
//!
//! Every sweep interval, finds tokens expiring within the sweep window and
//! refreshes them ahead of time through the same single-flight path request
//! handlers use, tracking consecutive failures per portal.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::AuthError;
use crate::tokens::TokenManager;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub refreshed: usize,
    pub failed: usize,
}

/// Start the refresh daemon loop.
pub async fn refresh_daemon(tokens: Arc<TokenManager>, interval: Duration, window: Duration) {
    info!(
        "Token refresh daemon started (interval: {}s, window: {}s)",
        interval.as_secs(),
        window.as_secs()
    );

    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = refresh_cycle(&tokens, window).await {
            error!("Refresh cycle error: {e}");
        }
    }
}

pub async fn refresh_cycle(tokens: &TokenManager, window: Duration) -> Result<SweepReport, AuthError> {
    let now = Utc::now();
    let before = now + chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
    let expiring = tokens.store().expiring(before).await?;

    let mut report = SweepReport::default();
    if expiring.is_empty() {
        return Ok(report);
    }

    info!("Found {} HubSpot tokens to refresh", expiring.len());

    for record in expiring {
        match tokens.refresh_if_expiring(&record.portal_id, window, now).await {
            Ok(_) => report.refreshed += 1,
            Err(AuthError::TokenRefresh(e)) => {
                error!(portal_id = %record.portal_id, "Failed to refresh token: {e}");
                if let Err(e) = tokens.store().record_failure(&record.portal_id).await {
                    error!(portal_id = %record.portal_id, "Failed to record refresh failure: {e}");
                }
                report.failed += 1;
            }
            Err(e) => {
                warn!(portal_id = %record.portal_id, "Skipping token: {e}");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
