use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::path::Path;
use tracing::{debug, warn};

use crate::settings::Settings;

/// Resolves source image references. Every failure degrades to "no image".
pub struct ImageFetcher {
    client: Option<Client>,
}

impl ImageFetcher {
    pub fn new(settings: &Settings) -> Self {
        let client = match build_client(settings) {
            Ok(client) => Some(client),
            Err(err) => {
                warn!("http client unavailable, remote images disabled: {:#}", err);
                None
            }
        };
        Self { client }
    }

    pub async fn fetch(&self, reference: &str) -> Option<RgbImage> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        let result = if is_remote(reference) {
            self.fetch_remote(reference).await
        } else {
            read_local(reference).await
        };
        match result.and_then(|bytes| decode_image(&bytes)) {
            Ok(image) => {
                debug!(
                    "fetched image {} ({}x{})",
                    reference,
                    image.width(),
                    image.height()
                );
                Some(image)
            }
            Err(err) => {
                warn!("failed to fetch image {}: {:#}", reference, err);
                None
            }
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| anyhow!("no http client"))?;
        let response = client
            .get(url)
            .send()
            .await
            .with_context(|| "request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("unexpected status {}", status));
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| "failed to read response body")?;
        Ok(bytes.to_vec())
    }
}

fn build_client(settings: &Settings) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&settings.user_agent).with_context(|| "invalid user agent")?,
    );
    Client::builder()
        .timeout(settings.fetch_timeout())
        .default_headers(headers)
        .build()
        .with_context(|| "failed to build http client")
}

fn is_remote(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

async fn read_local(reference: &str) -> Result<Vec<u8>> {
    let path = reference.strip_prefix("file://").unwrap_or(reference);
    tokio::fs::read(Path::new(path))
        .await
        .with_context(|| format!("failed to read {}", path))
}

/// Decodes any supported format and normalizes it to 8-bit RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes).with_context(|| "failed to decode image")?;
    Ok(image.into_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn offline_fetcher() -> ImageFetcher {
        ImageFetcher::new(&Settings::default())
    }

    #[tokio::test]
    async fn local_png_is_decoded_to_rgb() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("source.png");
        RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 128]))
            .save(&path)
            .expect("save");

        let image = offline_fetcher()
            .fetch(&path.to_string_lossy())
            .await
            .expect("image");
        assert_eq!(image.dimensions(), (8, 4));

        let uri = format!("file://{}", path.display());
        assert!(offline_fetcher().fetch(&uri).await.is_some());
    }

    #[tokio::test]
    async fn failures_become_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let garbage = dir.path().join("garbage.jpg");
        std::fs::write(&garbage, b"definitely not an image").expect("write");

        let fetcher = offline_fetcher();
        assert!(fetcher.fetch(&garbage.to_string_lossy()).await.is_none());
        assert!(fetcher.fetch("/nonexistent/image.png").await.is_none());
        assert!(fetcher.fetch("   ").await.is_none());
    }

    #[tokio::test]
    async fn unreachable_host_becomes_none() {
        // Port 9 on localhost refuses connections.
        let fetcher = offline_fetcher();
        assert!(fetcher.fetch("http://127.0.0.1:9/image.jpg").await.is_none());
    }

    #[test]
    fn remote_detection_is_case_insensitive() {
        assert!(is_remote("HTTPS://example.com/a.png"));
        assert!(!is_remote("file:///tmp/a.png"));
        assert!(!is_remote("images/a.png"));
    }
}
