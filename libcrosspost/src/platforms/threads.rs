//! Threads poster
//!
//! Text only. Posting is the two-step container flow: create a TEXT container,
//! then publish it. Only the first step is checked; the publish step's outcome
//! is logged and otherwise ignored.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Poster, POSTED};
use crate::clients::ThreadsApi;
use crate::error::PlatformError;
use crate::types::Platform;

pub const IMAGES_UNSUPPORTED: &str = "threads does not support image posts";

pub struct ThreadsPoster {
    client: Arc<dyn ThreadsApi>,
}

impl ThreadsPoster {
    pub fn new(client: Arc<dyn ThreadsApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Poster for ThreadsPoster {
    fn platform(&self) -> Platform {
        Platform::Threads
    }

    async fn post(&self, content: &str, image_paths: &[PathBuf]) -> Result<String, PlatformError> {
        if !image_paths.is_empty() {
            return Err(PlatformError::Validation(IMAGES_UNSUPPORTED.to_string()));
        }

        let user_id = self.client.user_id().await.map_err(PlatformError::Publish)?;

        let creation_id = self
            .client
            .create_container(&user_id, content)
            .await
            .map_err(PlatformError::Publish)?;

        match self.client.publish(&user_id, &creation_id).await {
            Ok(id) => tracing::debug!("Threads container {} published as {}", creation_id, id),
            Err(e) => tracing::warn!(
                "Threads publish step for container {} failed (ignored): {}",
                creation_id,
                e
            ),
        }

        Ok(POSTED.to_string())
    }
}
