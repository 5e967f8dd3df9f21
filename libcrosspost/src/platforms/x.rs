//! X poster

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Poster, POSTED};
use crate::clients::XApi;
use crate::error::PlatformError;
use crate::types::Platform;

pub struct XPoster {
    client: Arc<dyn XApi>,
}

impl XPoster {
    pub fn new(client: Arc<dyn XApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Poster for XPoster {
    fn platform(&self) -> Platform {
        Platform::X
    }

    async fn post(&self, content: &str, image_paths: &[PathBuf]) -> Result<String, PlatformError> {
        let max_images = Platform::X.limits().max_image_count;
        if image_paths.len() > max_images {
            return Err(PlatformError::Validation(format!(
                "x accepts at most {} images per post ({} given)",
                max_images,
                image_paths.len()
            )));
        }

        let mut media_ids = Vec::with_capacity(image_paths.len());
        for path in image_paths {
            let media_id = self
                .client
                .upload_media(path)
                .await
                .map_err(PlatformError::Upload)?;
            media_ids.push(media_id);
        }

        let tweet_id = self
            .client
            .create_tweet(content, &media_ids)
            .await
            .map_err(PlatformError::Publish)?;

        tracing::debug!("Tweet created: {}", tweet_id);
        Ok(POSTED.to_string())
    }
}
