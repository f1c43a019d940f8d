//! Error types for page retrieval and assembly.

use std::io;
use thiserror::Error;

/// Errors that abort a whole grab run.
///
/// Per-page download failures never show up here: they are absorbed by the
/// retry controller and reported as dropped pages.
#[derive(Error, Debug)]
pub enum GrabError {
    /// I/O error during file operations.
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// HTTP client construction error.
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization error.
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    /// The configured base or viewer URL could not be parsed.
    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A configured header value (cookie, referer) is not a valid header.
    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    /// A page image could not be decoded during assembly.
    #[error("Failed to decode {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// The PDF writer failed.
    #[error(transparent)]
    PdfError(#[from] lopdf::Error),

    /// A blocking task panicked or was cancelled.
    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    /// Assembly was asked to combine zero pages.
    #[error("No pages to assemble")]
    NoPages,
}

/// Why a single fetch attempt for one page failed.
///
/// Every variant is treated as transient by the retry controller.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, timeout or body stream failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("bad status code: {0}")]
    Status(reqwest::StatusCode),

    /// The service answered with something other than an image, usually an
    /// HTML error page.
    #[error("unexpected content-type: {content_type}. Preview: {preview}")]
    ContentType {
        content_type: String,
        preview: String,
    },

    /// The body was empty.
    #[error("empty file after download")]
    EmptyBody,

    /// The persisted file is not a decodable image.
    #[error("invalid image file: {0}")]
    Validation(String),

    /// Writing the staging file failed.
    #[error("staging write failed: {0}")]
    Io(#[from] io::Error),
}
