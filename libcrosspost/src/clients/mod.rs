//! Platform API clients
//!
//! Each service is reached through a narrow async trait that covers exactly the
//! calls a poster needs. The concrete implementations talk HTTP (or megalodon
//! for Mastodon); [`mock::FakeClient`] implements every trait for tests.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::ClientError;

pub mod bluesky;
pub mod mastodon;
pub mod misskey;
pub mod oauth1;
pub mod threads;
pub mod x;

// Available for all builds so integration tests can use it
pub mod mock;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Reference to a blob stored on the Bluesky PDS
///
/// Kept opaque; the PDS returns it from `uploadBlob` and expects the same
/// object back inside the post embed.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobRef(pub serde_json::Value);

/// An uploaded image attached to a Bluesky post
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub alt: String,
    pub image: BlobRef,
}

#[async_trait]
pub trait BlueskyApi: Send + Sync {
    /// Establish (or replace) the session
    async fn login(&self, identifier: &str, password: &str) -> ClientResult<()>;

    async fn upload_blob(&self, bytes: Vec<u8>, mime_type: &str) -> ClientResult<BlobRef>;

    /// Create a feed post, returning its AT URI
    async fn send_post(
        &self,
        text: &str,
        images: &[EmbeddedImage],
        langs: &[&str],
    ) -> ClientResult<String>;
}

#[async_trait]
pub trait XApi: Send + Sync {
    /// Upload a media file, returning its media id string
    async fn upload_media(&self, path: &Path) -> ClientResult<String>;

    async fn create_tweet(&self, text: &str, media_ids: &[String]) -> ClientResult<String>;
}

#[async_trait]
pub trait ThreadsApi: Send + Sync {
    async fn user_id(&self) -> ClientResult<String>;

    /// Create an unpublished text container, returning its creation id
    async fn create_container(&self, user_id: &str, text: &str) -> ClientResult<String>;

    async fn publish(&self, user_id: &str, creation_id: &str) -> ClientResult<String>;
}

#[async_trait]
pub trait MisskeyApi: Send + Sync {
    /// Upload a file to the drive, returning its file id
    async fn upload_drive_file(&self, path: &Path) -> ClientResult<String>;

    /// Create a note with `home` visibility
    async fn create_note(&self, text: &str, file_ids: &[String]) -> ClientResult<String>;
}

#[async_trait]
pub trait MastodonApi: Send + Sync {
    /// Upload a media attachment, returning its id
    async fn upload_media(&self, path: &Path) -> ClientResult<String>;

    async fn post_status(&self, text: &str, media_ids: &[String]) -> ClientResult<String>;
}

/// Ensure an instance URL has a scheme and no trailing slash
pub fn normalize_instance_url(instance: &str) -> String {
    let trimmed = instance.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

pub(crate) fn http_client(timeout: Duration) -> ClientResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("crosspost/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ClientError::from)
}

/// Bound a call whose underlying library has no request deadline of its own
pub(crate) async fn with_deadline<T, F>(timeout: Duration, call: F) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>>,
{
    tokio::time::timeout(timeout, call).await.map_err(|_| {
        ClientError::Transport(format!(
            "request timed out after {}",
            humantime::format_duration(timeout)
        ))
    })?
}

/// Decode a JSON response, turning non-success statuses into `ClientError::Api`
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> ClientResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ClientError::from_response(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Build a multipart file part from a path on disk
pub(crate) async fn file_part(path: &Path) -> ClientResult<reqwest::multipart::Part> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(guess_mime_type(path))
        .map_err(ClientError::from)
}

/// MIME type from the file extension, defaulting to binary
pub fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
