//! PageGrab - Download page images from a document viewer and merge them into a PDF
//!
//! This library fetches every page of a document served as numbered images by a
//! FlowPaper-style viewer, validates each image, and assembles the survivors into
//! a single PDF.
//!
//! # Features
//!
//! - **Concurrent Downloads**: All pages share one HTTP client, with a configurable cap
//! - **Automatic Retry**: Exponential backoff (2, 4, 8, ... units) per page
//! - **Validation**: Rejects HTML error pages, empty bodies and corrupt images
//! - **Gap Tolerance**: Pages that keep failing are dropped, not fatal
//! - **Clean Staging**: Partial files never survive a failed attempt
//!
//! # Example
//!
//! ```no_run
//! use pagegrab::{grab_document, GrabConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GrabConfig {
//!     document_id: "doc_id".to_string(),
//!     subfolder: "sub_folder_id".to_string(),
//!     max_page: 123,
//!     session_cookie: "PHPSESSID=abc; JSESSIONID=def".to_string(),
//!     ..GrabConfig::default()
//! };
//!
//! let report = grab_document(&config).await?;
//! println!("recovered {}/{} pages", report.recovered.len(), report.requested);
//! # Ok(())
//! # }
//! ```

mod cleanup;
mod download;
mod endpoint;
mod error;
mod merge;
mod orchestrator;
mod retry;
mod types;
mod verify;

pub use cleanup::cleanup_staging;
pub use download::PageFetcher;
pub use endpoint::page_number_from_path;
pub use error::{FetchError, GrabError};
pub use merge::assemble_pdf;
pub use orchestrator::{successful_artifacts, Orchestrator};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use types::{GrabConfig, GrabReport, PageOutcome, PageRequest, ValidatedArtifact};

use tracing::{info, warn};

/// Downloads every page, merges the recovered ones into a PDF, and removes
/// the staging directory.
///
/// This is the main entry point. It performs the following steps:
///
/// 1. Fetches pages `1..=max_page` concurrently, with retry and validation
/// 2. Merges the recovered pages, in page order, into `output_path`
/// 3. Removes the staging directory unless `keep_staging` is set
///
/// When no page could be recovered, assembly is skipped and the report has no
/// output path. Cleanup still runs.
///
/// # Arguments
///
/// * `config` - Grab configuration
///
/// # Returns
///
/// A report listing recovered and dropped pages, or an error if the client,
/// the staging directory or the PDF could not be set up or written.
pub async fn grab_document(config: &GrabConfig) -> Result<GrabReport, GrabError> {
    let orchestrator = Orchestrator::new(config.clone())?;
    let outcomes = orchestrator.run().await?;
    let mut report = GrabReport::from_outcomes(config.max_page, &outcomes);

    let artifacts = successful_artifacts(outcomes);
    let assembled = if artifacts.is_empty() {
        warn!("⚠️  No pages to assemble, skipping PDF output");
        Ok(())
    } else {
        assemble_pdf(&artifacts, &config.output_path)
            .await
            .map(|pages| {
                info!("📑 Wrote {} pages to {}", pages, config.output_path.display());
                report.output = Some(config.output_path.clone());
            })
    };

    if config.keep_staging {
        info!("Keeping staging folder {}", config.staging_dir.display());
    } else {
        cleanup_staging(&config.staging_dir).await;
    }

    assembled.map(|()| report)
}
