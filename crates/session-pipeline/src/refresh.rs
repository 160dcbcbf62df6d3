//! Proactive background token refresh
//!
//! Spawns a periodic task that renews the session shortly before the access
//! credential expires, so most requests never see a 401. It goes through the
//! coordinator, so a proactive refresh and a request-driven one never run at
//! the same time.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::coordinator::RefreshCoordinator;
use crate::error::Error;

/// Spawn a background task that proactively refreshes an expiring session.
///
/// Runs every `interval` and refreshes when the stored token expires within
/// `threshold`. A rejected refresh credential signs the session out the same
/// way a request-driven refresh would; transient failures are retried on the
/// next cycle.
///
/// Returns a `JoinHandle` for the spawned task.
pub fn spawn_refresh_task(
    coordinator: Arc<RefreshCoordinator>,
    interval: Duration,
    threshold: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            refresh_cycle(&coordinator, threshold).await;
        }
    })
}

/// Run one refresh cycle. Returns whether a refresh was attempted.
async fn refresh_cycle(coordinator: &RefreshCoordinator, threshold: Duration) -> bool {
    let Some(token) = coordinator.store().get() else {
        return false;
    };
    if !token.expires_within(threshold) {
        return false;
    }

    debug!(
        expires_in_secs = token.secs_until_expiry(),
        "session expiring within threshold, refreshing"
    );
    match coordinator.refresh_now().await {
        Ok(_) => info!("background session refresh succeeded"),
        Err(Error::NoSession) => debug!("session ended before background refresh"),
        Err(e) => warn!(error = %e, "background session refresh failed"),
    }
    true
}
