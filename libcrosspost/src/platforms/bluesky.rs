//! Bluesky poster

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Poster, POSTED};
use crate::clients::{BlueskyApi, EmbeddedImage};
use crate::compress::{compress_file_blocking, CompressedImage};
use crate::error::PlatformError;
use crate::types::Platform;

/// Alt text attached to every uploaded image
pub const IMAGE_ALT_TEXT: &str = "image";

/// Language tag attached to every post
pub const POST_LANGUAGE: &str = "ja";

/// Compresses images to the blob size limit, uploads them and creates the post
pub struct BlueskyPoster {
    client: Arc<dyn BlueskyApi>,
}

impl BlueskyPoster {
    pub fn new(client: Arc<dyn BlueskyApi>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<dyn BlueskyApi> {
        &self.client
    }

    async fn compress_all(&self, image_paths: &[PathBuf]) -> Result<Vec<CompressedImage>, PlatformError> {
        let Some(budget) = Platform::Bluesky.limits().image_budget else {
            return Err(PlatformError::Compression(
                "no image budget defined for bluesky".to_string(),
            ));
        };

        let mut compressed = Vec::with_capacity(image_paths.len());
        for path in image_paths {
            let image = compress_file_blocking(path.clone(), budget).await?;
            tracing::debug!(
                "Compressed {} to {} bytes in {} attempt(s)",
                path.display(),
                image.bytes.len(),
                image.attempts
            );
            compressed.push(image);
        }

        Ok(compressed)
    }
}

#[async_trait]
impl Poster for BlueskyPoster {
    fn platform(&self) -> Platform {
        Platform::Bluesky
    }

    async fn post(&self, content: &str, image_paths: &[PathBuf]) -> Result<String, PlatformError> {
        // Every image must fit before anything is uploaded
        let compressed = self.compress_all(image_paths).await?;

        let mut images = Vec::with_capacity(compressed.len());
        for image in compressed {
            let blob = self
                .client
                .upload_blob(image.bytes, image.format.mime_type())
                .await
                .map_err(PlatformError::Upload)?;
            images.push(EmbeddedImage {
                alt: IMAGE_ALT_TEXT.to_string(),
                image: blob,
            });
        }

        let uri = self
            .client
            .send_post(content, &images, &[POST_LANGUAGE])
            .await
            .map_err(PlatformError::Publish)?;

        tracing::debug!("Bluesky post created: {}", uri);
        Ok(POSTED.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::FakeClient;
    use crate::error::ClientError;
    use image::{DynamicImage, ImageFormat, RgbImage};

    fn write_png(dir: &std::path::Path, name: &str, size: u32) -> PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageRgb8(RgbImage::new(size, size))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn test_text_only_post() {
        let client = FakeClient::new();
        let poster = BlueskyPoster::new(Arc::new(client.clone()));

        let response = poster.post("こんにちは", &[]).await.unwrap();

        assert_eq!(response, POSTED);
        assert_eq!(client.ops(), vec!["bluesky.send_post"]);
        assert_eq!(client.calls()[0].args, vec!["こんにちは", "0", "ja"]);
    }

    #[tokio::test]
    async fn test_images_are_compressed_uploaded_and_embedded() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = write_png(dir.path(), "a.png", 64);
        let second = write_png(dir.path(), "b.png", 32);

        let client = FakeClient::new();
        let poster = BlueskyPoster::new(Arc::new(client.clone()));

        poster.post("with images", &[first, second]).await.unwrap();

        assert_eq!(
            client.ops(),
            vec!["bluesky.upload_blob", "bluesky.upload_blob", "bluesky.send_post"]
        );
        let upload = &client.calls()[0];
        assert_eq!(upload.args[1], "image/png");
        let post = &client.calls()[2];
        assert_eq!(post.args, vec!["with images", "2", "ja", "image", "image"]);
    }

    #[tokio::test]
    async fn test_compression_failure_aborts_before_any_upload() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = write_png(dir.path(), "good.png", 16);
        let missing = dir.path().join("missing.png");

        let client = FakeClient::new();
        let poster = BlueskyPoster::new(Arc::new(client.clone()));

        let error = poster.post("text", &[good, missing]).await.unwrap_err();

        assert!(matches!(error, PlatformError::Compression(_)));
        assert!(error.to_string().contains("missing.png"));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_png(dir.path(), "a.png", 16);

        let client = FakeClient::new();
        client.fail_next(
            "bluesky.upload_blob",
            ClientError::from_response(413, r#"{"error":"BlobTooLarge","message":"too big"}"#),
        );
        let poster = BlueskyPoster::new(Arc::new(client.clone()));

        let error = poster.post("text", &[path]).await.unwrap_err();

        assert_eq!(error.to_string(), "upload failed: HTTP 413: BlobTooLarge: too big");
        assert_eq!(client.call_count("bluesky.send_post"), 0);
    }
}
