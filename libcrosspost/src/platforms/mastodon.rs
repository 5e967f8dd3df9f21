//! Mastodon poster

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Poster, POSTED};
use crate::clients::MastodonApi;
use crate::error::PlatformError;
use crate::types::Platform;

pub struct MastodonPoster {
    client: Arc<dyn MastodonApi>,
}

impl MastodonPoster {
    pub fn new(client: Arc<dyn MastodonApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Poster for MastodonPoster {
    fn platform(&self) -> Platform {
        Platform::Mastodon
    }

    async fn post(&self, content: &str, image_paths: &[PathBuf]) -> Result<String, PlatformError> {
        let mut media_ids = Vec::with_capacity(image_paths.len());
        for path in image_paths {
            let media_id = self
                .client
                .upload_media(path)
                .await
                .map_err(PlatformError::Upload)?;
            media_ids.push(media_id);
        }

        let status_id = self
            .client
            .post_status(content, &media_ids)
            .await
            .map_err(PlatformError::Publish)?;

        tracing::debug!("Mastodon status created: {}", status_id);
        Ok(POSTED.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::FakeClient;
    use crate::error::ClientError;

    #[tokio::test]
    async fn test_status_with_two_images() {
        let client = FakeClient::new();
        let poster = MastodonPoster::new(Arc::new(client.clone()));

        let response = poster
            .post("hello", &[PathBuf::from("a.png"), PathBuf::from("b.png")])
            .await
            .unwrap();

        assert_eq!(response, POSTED);
        assert_eq!(
            client.ops(),
            vec![
                "mastodon.upload_media",
                "mastodon.upload_media",
                "mastodon.post_status"
            ]
        );
        assert_eq!(client.calls()[2].args, vec!["hello", "2"]);
    }

    #[tokio::test]
    async fn test_status_failure_reports_message() {
        let client = FakeClient::new();
        client.fail_next(
            "mastodon.post_status",
            ClientError::from_response(422, r#"{"error":"Validation failed: Text can't be blank"}"#),
        );
        let poster = MastodonPoster::new(Arc::new(client.clone()));

        let error = poster.post("", &[]).await.unwrap_err();

        assert_eq!(
            error.to_string(),
            "publish failed: HTTP 422: Validation failed: Text can't be blank"
        );
    }
}
