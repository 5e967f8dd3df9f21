//! Misskey poster

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Poster, POSTED};
use crate::clients::MisskeyApi;
use crate::error::PlatformError;
use crate::types::Platform;

pub struct MisskeyPoster {
    client: Arc<dyn MisskeyApi>,
}

impl MisskeyPoster {
    pub fn new(client: Arc<dyn MisskeyApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Poster for MisskeyPoster {
    fn platform(&self) -> Platform {
        Platform::Misskey
    }

    async fn post(&self, content: &str, image_paths: &[PathBuf]) -> Result<String, PlatformError> {
        let mut file_ids = Vec::with_capacity(image_paths.len());
        for path in image_paths {
            let file_id = self
                .client
                .upload_drive_file(path)
                .await
                .map_err(PlatformError::Upload)?;
            file_ids.push(file_id);
        }

        let note_id = self
            .client
            .create_note(content, &file_ids)
            .await
            .map_err(PlatformError::Publish)?;

        tracing::debug!("Misskey note created: {}", note_id);
        Ok(POSTED.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::FakeClient;
    use crate::error::ClientError;

    #[tokio::test]
    async fn test_note_uses_all_files() {
        let client = FakeClient::new();
        let poster = MisskeyPoster::new(Arc::new(client.clone()));
        let images = vec![
            PathBuf::from("1.png"),
            PathBuf::from("2.png"),
            PathBuf::from("3.png"),
        ];

        poster.post("note text", &images).await.unwrap();

        assert_eq!(client.call_count("misskey.upload_drive_file"), 3);
        let note = client.calls().pop().unwrap();
        assert_eq!(note.op, "misskey.create_note");
        assert_eq!(note.args, vec!["note text", "3"]);
    }

    #[tokio::test]
    async fn test_drive_failure_stops_before_note() {
        let client = FakeClient::new();
        client.fail_next(
            "misskey.upload_drive_file",
            ClientError::from_response(
                400,
                r#"{"error":{"message":"Cannot upload the file because you have no free space of drive.","code":"NO_FREE_SPACE"}}"#,
            ),
        );
        let poster = MisskeyPoster::new(Arc::new(client.clone()));

        let error = poster
            .post("note", &[PathBuf::from("a.png"), PathBuf::from("b.png")])
            .await
            .unwrap_err();

        assert!(error.to_string().contains("NO_FREE_SPACE"));
        assert_eq!(client.ops(), vec!["misskey.upload_drive_file"]);
    }
}
