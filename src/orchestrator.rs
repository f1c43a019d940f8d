//! Main orchestration logic for downloading every page of a document.

use crate::download::PageFetcher;
use crate::endpoint::page_requests;
use crate::error::GrabError;
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::types::{GrabConfig, PageOutcome, ValidatedArtifact};
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

/// Runs the fetch-validate-retry pipeline for pages `1..=max_page`.
///
/// All page pipelines are multiplexed in the calling task over one shared
/// HTTP client, at most `max_concurrent_downloads` at a time. Every pipeline
/// runs to its own terminal state; a dropped page never aborts its siblings.
///
/// # Example
///
/// ```no_run
/// use pagegrab::{GrabConfig, Orchestrator};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GrabConfig {
///     document_id: "doc_id".to_string(),
///     subfolder: "sub_folder_id".to_string(),
///     max_page: 12,
///     ..GrabConfig::default()
/// };
/// let artifacts = Orchestrator::new(config)?.fetch_all().await?;
/// println!("recovered {} pages", artifacts.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: GrabConfig,
    fetcher: PageFetcher,
    policy: RetryPolicy,
}

impl Orchestrator {
    /// Builds the shared client and retry policy from `config`.
    pub fn new(config: GrabConfig) -> Result<Self, GrabError> {
        let fetcher = PageFetcher::new(&config)?;
        let policy = RetryPolicy::from_config(&config);
        Ok(Self {
            config,
            fetcher,
            policy,
        })
    }

    /// Fetches every page and returns one outcome per page, ordered by page
    /// number regardless of completion order.
    pub async fn run(&self) -> Result<Vec<PageOutcome>, GrabError> {
        tokio::fs::create_dir_all(&self.config.staging_dir).await?;
        let requests = page_requests(&self.config)?;
        let total = requests.len();

        let limit = self
            .config
            .max_concurrent_downloads
            .unwrap_or(total)
            .max(1);
        info!(
            "📦 Downloading {} pages of document {} ({} at a time)",
            total, self.config.document_id, limit
        );

        let pb = progress_bar(total as u64, self.config.show_progress);
        let policy = self.policy;
        let fetcher = &self.fetcher;

        let mut outcomes: Vec<PageOutcome> = stream::iter(requests.iter())
            .map(|request| {
                let pb = pb.clone();
                async move {
                    let outcome = fetch_with_retry(fetcher, request, policy).await;
                    let mark = if outcome.artifact.is_some() { "✅" } else { "❌" };
                    pb.set_message(format!("| {} Page {}", mark, outcome.page));
                    pb.inc(1);
                    outcome
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;
        outcomes.sort_by_key(|outcome| outcome.page);

        let recovered = outcomes.iter().filter(|o| o.artifact.is_some()).count();
        pb.finish_with_message(format!("✅ Recovered {}/{} pages", recovered, total));
        if recovered == 0 {
            warn!("⚠️  No pages were recovered out of {}", total);
        } else {
            info!("✅ Recovered {}/{} pages", recovered, total);
        }

        Ok(outcomes)
    }

    /// Fetches every page and returns the validated artifacts in page order.
    /// Pages that exhausted their retries are left out.
    pub async fn fetch_all(&self) -> Result<Vec<ValidatedArtifact>, GrabError> {
        Ok(successful_artifacts(self.run().await?))
    }
}

/// Drops absent outcomes and orders the rest by page number.
pub fn successful_artifacts(outcomes: Vec<PageOutcome>) -> Vec<ValidatedArtifact> {
    let mut artifacts: Vec<ValidatedArtifact> = outcomes
        .into_iter()
        .filter_map(|outcome| outcome.artifact)
        .collect();
    artifacts.sort_by_key(|artifact| artifact.page);
    artifacts
}

fn progress_bar(len: u64, visible: bool) -> indicatif::ProgressBar {
    if !visible {
        return indicatif::ProgressBar::hidden();
    }

    let pb = indicatif::ProgressBar::new(len);
    if let Ok(style) = indicatif::ProgressStyle::default_bar().template(
        "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed, ETA {eta_precise}",
    ) {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb.set_message("📄 Downloading pages");
    pb
}
