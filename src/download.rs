//! Single-attempt page download.

use crate::endpoint::referer_url;
use crate::error::{FetchError, GrabError};
use crate::types::{GrabConfig, PageRequest, ValidatedArtifact};
use crate::verify::verify_image;
use futures_util::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE, COOKIE, REFERER,
};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

/// Maximum number of body bytes kept when the service returns a non-image.
const PREVIEW_LEN: usize = 200;

/// Performs one download attempt per call against a shared HTTP client.
///
/// Cloning is cheap; all clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    /// Builds a fetcher whose client carries the viewer headers, the session
    /// cookie and the per-request timeout from `config`.
    pub fn new(config: &GrabConfig) -> Result<Self, GrabError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    /// Downloads one page into its staging file and validates it.
    ///
    /// The body is streamed to disk chunk by chunk. Any existing content of
    /// the staging file is truncated. On failure the staging file may be left
    /// partially written; removing it is the caller's job.
    ///
    /// # Arguments
    ///
    /// * `request` - The page to fetch
    ///
    /// # Returns
    ///
    /// The validated artifact, or the reason this attempt failed.
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<ValidatedArtifact, FetchError> {
        let response = self.client.get(request.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("image/") {
            // Likely an error page or HTML response
            let preview = body_preview(response).await;
            return Err(FetchError::ContentType {
                content_type,
                preview,
            });
        }

        if let Some(parent) = request.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = BufWriter::new(tokio::fs::File::create(&request.path).await?);
        let mut byte_stream = response.bytes_stream();
        while let Some(piece) = byte_stream.next().await {
            let chunk = piece?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        let bytes = tokio::fs::metadata(&request.path).await?.len();
        if bytes == 0 {
            return Err(FetchError::EmptyBody);
        }

        verify_image(&request.path).await?;
        debug!("Fetched page {} ({} bytes)", request.page, bytes);

        Ok(ValidatedArtifact {
            page: request.page,
            path: request.path.clone(),
            bytes,
        })
    }
}

/// Reads at most `PREVIEW_LEN` bytes of the body for diagnostics.
async fn body_preview(response: reqwest::Response) -> String {
    let mut byte_stream = response.bytes_stream();
    let mut buf = Vec::with_capacity(PREVIEW_LEN);

    while buf.len() < PREVIEW_LEN {
        match byte_stream.next().await {
            Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
            _ => break,
        }
    }
    buf.truncate(PREVIEW_LEN);

    String::from_utf8_lossy(&buf).into_owned()
}

/// Builds the shared client used by every page pipeline.
fn build_client(config: &GrabConfig) -> Result<reqwest::Client, GrabError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9,vi-VN;q=0.8,vi;q=0.7"),
    );
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("image"));

    let referer = referer_url(config)?;
    headers.insert(
        REFERER,
        HeaderValue::from_str(referer.as_str()).map_err(|_| GrabError::InvalidHeader("Referer"))?,
    );

    if !config.session_cookie.is_empty() {
        let mut cookie = HeaderValue::from_str(&config.session_cookie)
            .map_err(|_| GrabError::InvalidHeader("Cookie"))?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);
    }

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.request_timeout)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::page_requests;
    use std::io::Cursor;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        image::RgbImage::new(2, 2)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn config(server: &MockServer, staging: &std::path::Path) -> GrabConfig {
        GrabConfig {
            base_url: format!("{}/view.php", server.uri()),
            viewer_url: format!("{}/simple_document.php", server.uri()),
            document_id: "doc".to_string(),
            subfolder: "sub".to_string(),
            max_page: 1,
            session_cookie: "PHPSESSID=abc; JSESSIONID=def".to_string(),
            staging_dir: staging.to_path_buf(),
            request_timeout: Duration::from_secs(5),
            ..GrabConfig::default()
        }
    }

    async fn fetch_first(
        server: &MockServer,
    ) -> (
        tempfile::TempDir,
        PageRequest,
        Result<ValidatedArtifact, FetchError>,
    ) {
        let staging = tempfile::tempdir().unwrap();
        let config = config(server, staging.path());
        let fetcher = PageFetcher::new(&config).unwrap();
        let request = page_requests(&config).unwrap().remove(0);
        let result = fetcher.fetch_page(&request).await;
        (staging, request, result)
    }

    #[tokio::test]
    async fn test_fetch_page_streams_image_to_staging() {
        let server = MockServer::start().await;
        let body = png_bytes();
        Mock::given(method("GET"))
            .and(path("/view.php"))
            .and(query_param("doc", "doc"))
            .and(query_param("page", "1"))
            .and(query_param("format", "png"))
            .and(header("cookie", "PHPSESSID=abc; JSESSIONID=def"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/png")
                    .set_body_bytes(body.clone()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (_staging, request, result) = fetch_first(&server).await;
        let artifact = result.unwrap();

        assert_eq!(artifact.page, 1);
        assert_eq!(artifact.bytes, body.len() as u64);
        assert_eq!(std::fs::read(&request.path).unwrap(), body);
    }

    #[tokio::test]
    async fn test_fetch_page_sends_viewer_referer() {
        let server = MockServer::start().await;
        let referer = format!(
            "{}/simple_document.php?subfolder=sub&doc=doc&format=pdf",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(header("referer", referer.as_str()))
            .and(header("sec-fetch-dest", "image"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/png")
                    .set_body_bytes(png_bytes()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (_staging, _request, result) = fetch_first(&server).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (_staging, _request, result) = fetch_first(&server).await;
        match result {
            Err(FetchError::Status(status)) => assert_eq!(status.as_u16(), 500),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_page_captures_bounded_preview_of_error_page() {
        let server = MockServer::start().await;
        let html = format!("<html>{}</html>", "x".repeat(1000));
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let (_staging, request, result) = fetch_first(&server).await;
        match result {
            Err(FetchError::ContentType {
                content_type,
                preview,
            }) => {
                assert_eq!(content_type, "text/html; charset=utf-8");
                assert_eq!(preview.len(), PREVIEW_LEN);
                assert!(preview.starts_with("<html>"));
            }
            other => panic!("expected content-type error, got {:?}", other),
        }
        assert!(!request.path.exists());
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "image/png"))
            .mount(&server)
            .await;

        let (_staging, _request, result) = fetch_first(&server).await;
        assert!(matches!(result, Err(FetchError::EmptyBody)));
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_corrupt_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/png")
                    .set_body_bytes(b"definitely not a png".to_vec()),
            )
            .mount(&server)
            .await;

        let (_staging, _request, result) = fetch_first(&server).await;
        assert!(matches!(result, Err(FetchError::Validation(_))));
    }

    #[tokio::test]
    async fn test_fetch_page_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/png")
                    .set_body_bytes(png_bytes())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let staging = tempfile::tempdir().unwrap();
        let config = GrabConfig {
            request_timeout: Duration::from_millis(50),
            ..config(&server, staging.path())
        };
        let fetcher = PageFetcher::new(&config).unwrap();
        let request = page_requests(&config).unwrap().remove(0);

        match fetcher.fetch_page(&request).await {
            Err(FetchError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_cookie_is_rejected() {
        let config = GrabConfig {
            session_cookie: "bad\ncookie".to_string(),
            ..GrabConfig::default()
        };
        assert!(matches!(
            PageFetcher::new(&config),
            Err(GrabError::InvalidHeader("Cookie"))
        ));
    }
}
