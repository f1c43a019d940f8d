//! URL and staging path construction for page resources.

use crate::error::GrabError;
use crate::types::{GrabConfig, PageRequest};
use std::path::{Path, PathBuf};
use url::Url;

/// Constructs the image URL for a given page.
///
/// # Arguments
///
/// * `config` - Grab configuration (base URL, document and subfolder ids, format)
/// * `page` - The 1-based page number
///
/// # Returns
///
/// `<base_url>?doc=<id>&format=<fmt>&page=<n>&subfolder=<sub>`, or an error
/// if the base URL is malformed.
pub(crate) fn page_url(config: &GrabConfig, page: u32) -> Result<Url, GrabError> {
    let page = page.to_string();
    Url::parse_with_params(
        &config.base_url,
        [
            ("doc", config.document_id.as_str()),
            ("format", config.image_format.as_str()),
            ("page", page.as_str()),
            ("subfolder", config.subfolder.as_str()),
        ],
    )
    .map_err(|source| GrabError::InvalidUrl {
        url: config.base_url.clone(),
        source,
    })
}

/// Constructs the viewer URL sent as the Referer for every page request.
pub(crate) fn referer_url(config: &GrabConfig) -> Result<Url, GrabError> {
    Url::parse_with_params(
        &config.viewer_url,
        [
            ("subfolder", config.subfolder.as_str()),
            ("doc", config.document_id.as_str()),
            ("format", "pdf"),
        ],
    )
    .map_err(|source| GrabError::InvalidUrl {
        url: config.viewer_url.clone(),
        source,
    })
}

/// Staging file for a page: `<staging_dir>/page_<n>.<fmt>`.
pub(crate) fn staging_path(config: &GrabConfig, page: u32) -> PathBuf {
    config
        .staging_dir
        .join(format!("page_{}.{}", page, config.image_format))
}

/// Recovers the page number from a staging file name.
pub fn page_number_from_path(path: &Path) -> Option<u32> {
    path.file_stem()?
        .to_str()?
        .strip_prefix("page_")?
        .parse()
        .ok()
}

/// Builds the request for every page in `1..=config.max_page`.
pub(crate) fn page_requests(config: &GrabConfig) -> Result<Vec<PageRequest>, GrabError> {
    (1..=config.max_page)
        .map(|page| {
            Ok(PageRequest {
                page,
                url: page_url(config, page)?,
                path: staging_path(config, page),
            })
        })
        .collect()
}
