//! Data structures for page retrieval.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Configuration for one grab run.
///
/// Every field is static for the lifetime of the run. The orchestrator
/// receives this value explicitly; nothing is read from ambient state.
///
/// # Example
///
/// ```
/// use pagegrab::GrabConfig;
///
/// let config = GrabConfig {
///     document_id: "doc_id".to_string(),
///     subfolder: "sub_folder_id".to_string(),
///     max_page: 123,
///     session_cookie: "PHPSESSID=abc; JSESSIONID=def".to_string(),
///     ..GrabConfig::default()
/// };
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct GrabConfig {
    /// Page image endpoint (e.g., `<https://host/flowpaper/services/view.php>`)
    pub base_url: String,
    /// Viewer page sent as the Referer (e.g., `<https://host/flowpaper/simple_document.php>`)
    pub viewer_url: String,
    /// Document identifier on the viewer service.
    pub document_id: String,
    /// Subfolder identifier on the viewer service.
    pub subfolder: String,
    /// Number of pages to fetch; pages `1..=max_page` are requested.
    pub max_page: u32,
    /// Opaque session cookie, passed through unmodified.
    pub session_cookie: String,
    /// Image format requested from the service and used as file extension.
    pub image_format: String,
    /// Staging directory for per-page files (e.g., `"downloaded_pages"`)
    pub staging_dir: PathBuf,
    /// Path of the assembled PDF.
    pub output_path: PathBuf,
    /// Maximum attempts per page (default: 3).
    pub max_retries: u32,
    /// Timeout applied to every individual request (default: 20s).
    pub request_timeout: Duration,
    /// Backoff time unit. The delay before attempt `k + 1` is `2^k` units.
    pub backoff_unit: Duration,
    /// Maximum number of pages in flight at once (default: 8).
    ///
    /// `None` launches every page at once against the shared client.
    pub max_concurrent_downloads: Option<usize>,
    /// Leave the staging directory in place after assembly (default: false).
    pub keep_staging: bool,
    /// Draw a progress bar on stderr (default: false).
    pub show_progress: bool,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ir.vnulib.edu.vn/flowpaper/services/view.php".to_string(),
            viewer_url: "https://ir.vnulib.edu.vn/flowpaper/simple_document.php".to_string(),
            document_id: String::new(),
            subfolder: String::new(),
            max_page: 0,
            session_cookie: String::new(),
            image_format: "png".to_string(),
            staging_dir: PathBuf::from("downloaded_pages"),
            output_path: PathBuf::from("output.pdf"),
            max_retries: 3,
            request_timeout: Duration::from_secs(20),
            backoff_unit: Duration::from_secs(1),
            max_concurrent_downloads: Some(8),
            keep_staging: false,
            show_progress: false,
        }
    }
}

/// One page to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Fully templated page URL.
    pub url: Url,
    /// Staging file this page is written to.
    pub path: PathBuf,
}

/// A page image that was fully written and passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedArtifact {
    pub page: u32,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Terminal result of one page pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutcome {
    pub page: u32,
    /// `None` when every attempt failed.
    pub artifact: Option<ValidatedArtifact>,
    /// Number of attempts made before reaching the terminal state.
    pub attempts: u32,
}

/// Summary of a grab run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct GrabReport {
    pub requested: u32,
    pub recovered: Vec<u32>,
    pub dropped: Vec<u32>,
    pub output: Option<PathBuf>,
}

impl GrabReport {
    /// Builds a report from the full (unfiltered) outcome list.
    pub fn from_outcomes(requested: u32, outcomes: &[PageOutcome]) -> Self {
        let mut recovered = Vec::new();
        let mut dropped = Vec::new();
        for outcome in outcomes {
            if outcome.artifact.is_some() {
                recovered.push(outcome.page);
            } else {
                dropped.push(outcome.page);
            }
        }
        recovered.sort_unstable();
        dropped.sort_unstable();
        Self {
            requested,
            recovered,
            dropped,
            output: None,
        }
    }
}
