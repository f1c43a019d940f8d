//! Staging directory removal.

use std::path::Path;
use tracing::{info, warn};

/// Removes the staging directory and everything in it.
///
/// Failure is logged, not returned. A directory that does not exist is left
/// alone.
pub async fn cleanup_staging(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => info!("🧹 Removed folder: {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Error removing folder {}: {}", dir.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_removes_directory_and_contents() {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("downloaded_pages");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("page_1.png"), b"x").unwrap();
        std::fs::write(staging.join("page_2.png"), b"y").unwrap();

        cleanup_staging(&staging).await;

        assert!(!staging.exists());
        assert!(root.path().exists());
    }

    #[tokio::test]
    async fn test_cleanup_of_missing_directory_is_noop() {
        let root = tempfile::tempdir().unwrap();
        cleanup_staging(&root.path().join("never_created")).await;
        assert!(root.path().exists());
    }
}
