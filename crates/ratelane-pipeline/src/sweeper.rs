// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic purge of expired counter-store entries.

use std::sync::Arc;
use std::time::Duration;

use ratelane_core::CounterStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Purge expired entries every `interval` until cancelled.
pub async fn run_sweeper(
    store: Arc<dyn CounterStore>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match store.purge_expired().await {
                    Ok(0) => debug!("sweep found nothing to purge"),
                    Ok(purged) => info!(purged, "expired cache entries purged"),
                    Err(e) => error!(error = %e, "cache sweep failed"),
                }
            }
            _ = cancel.cancelled() => {
                info!("sweeper shutting down");
                break;
            }
        }
    }
}
