//! Per-page retry controller.

use crate::download::PageFetcher;
use crate::types::{GrabConfig, PageOutcome, PageRequest};
use std::path::Path;
use std::time::Duration;
use tokio_retry2::strategy::ExponentialBackoff;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, error, warn};

/// Attempt budget and backoff schedule for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_retries: u32,
    /// The delay before attempt `k + 1` is `2^k` of these.
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            backoff_unit,
        }
    }

    pub fn from_config(config: &GrabConfig) -> Self {
        Self::new(config.max_retries, config.backoff_unit)
    }

    /// Delays inserted between consecutive attempts: 2, 4, 8, ... units,
    /// one fewer than the number of attempts.
    pub fn backoff(&self) -> std::iter::Take<ExponentialBackoff> {
        let unit_ms = u64::try_from(self.backoff_unit.as_millis()).unwrap_or(u64::MAX);
        ExponentialBackoff::from_millis(2)
            .factor(unit_ms)
            .take(self.max_retries.saturating_sub(1) as usize)
    }
}

/// Drives `fetcher` for one page until it succeeds or the budget runs out.
///
/// The staging slot is cleared before the first attempt, and again after
/// every failed attempt so that no partial file survives. This never fails:
/// exhausting every attempt yields an outcome without an artifact, and
/// sibling pages are unaffected.
///
/// # Arguments
///
/// * `fetcher` - Shared fetcher
/// * `request` - The page to fetch
/// * `policy` - Attempt budget and backoff schedule
///
/// # Returns
///
/// The terminal outcome for this page, including the number of attempts made.
pub async fn fetch_with_retry(
    fetcher: &PageFetcher,
    request: &PageRequest,
    policy: RetryPolicy,
) -> PageOutcome {
    discard_artifact(&request.path).await;

    let page = request.page;
    let max_retries = policy.max_retries;
    let mut attempts = 0u32;

    let result = Retry::spawn(policy.backoff(), || {
        attempts += 1;
        let attempt = attempts;

        async move {
            match fetcher.fetch_page(request).await {
                Ok(artifact) => Ok(artifact),
                Err(e) => {
                    discard_artifact(&request.path).await;
                    if attempt < max_retries {
                        warn!(
                            "Attempt {} for page {} failed: {}. Retrying...",
                            attempt, page, e
                        );
                    }
                    RetryError::to_transient(e)
                }
            }
        }
    })
    .await;

    match result {
        Ok(artifact) => {
            debug!("✅ Downloaded: {}", artifact.path.display());
            PageOutcome {
                page,
                artifact: Some(artifact),
                attempts,
            }
        }
        Err(e) => {
            error!(
                "❌ Failed to download page {} after {} attempts: {}",
                page, attempts, e
            );
            PageOutcome {
                page,
                artifact: None,
                attempts,
            }
        }
    }
}

/// Removes whatever is in a page's staging slot.
async fn discard_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
