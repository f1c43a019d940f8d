//! Image validity checks for downloaded pages.

use crate::error::FetchError;
use std::path::Path;
use tracing::debug;

/// Structurally verifies a persisted page image.
///
/// The format is guessed from the file's magic bytes and the whole image is
/// decoded, so a body truncated or corrupted after a valid header is
/// rejected. The check runs in a blocking task to avoid blocking the async
/// runtime.
///
/// # Arguments
///
/// * `path` - Path to the staging file
///
/// # Returns
///
/// The image dimensions, or `FetchError::Validation` carrying the decoder's
/// error text.
pub(crate) async fn verify_image(path: &Path) -> Result<(u32, u32), FetchError> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let reader = image::ImageReader::open(&path)?.with_guessed_format()?;
        let format = reader
            .format()
            .ok_or_else(|| FetchError::Validation("unrecognized image format".to_string()))?;

        let decoded = reader
            .decode()
            .map_err(|e| FetchError::Validation(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());
        debug!(
            "Verified {:?}: {:?} {}x{}",
            path.file_name().unwrap_or_default(),
            format,
            width,
            height
        );
        Ok((width, height))
    })
    .await
    .map_err(|e| FetchError::Validation(format!("Task join error: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        image::RgbImage::new(width, height)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn noisy_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 + y * 13) as u8, (x * y) as u8, (x ^ y) as u8])
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_valid_png_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1.png");
        std::fs::write(&path, png_bytes(4, 3)).unwrap();

        assert_eq!(verify_image(&path).await.unwrap(), (4, 3));
    }

    #[tokio::test]
    async fn test_html_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1.png");
        std::fs::write(&path, b"<html><body>Session expired</body></html>").unwrap();

        let err = verify_image(&path).await.unwrap_err();
        assert!(matches!(err, FetchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_truncated_png_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1.png");
        let bytes = png_bytes(4, 3);
        std::fs::write(&path, &bytes[..12]).unwrap();

        let err = verify_image(&path).await.unwrap_err();
        assert!(matches!(err, FetchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_png_cut_after_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1.png");
        let bytes = noisy_png_bytes(64, 64);
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let err = verify_image(&path).await.unwrap_err();
        assert!(matches!(err, FetchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_image(&dir.path().join("absent.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
    }
}
