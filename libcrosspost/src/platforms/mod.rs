//! Per-platform posters
//!
//! A poster turns `(content, image_paths)` into one post on one network. Each
//! implementation owns the upload-then-publish sequence for its service and
//! reports failures as [`PlatformError`]; [`PlatformPoster::publish`] is the
//! boundary where those become a [`PlatformPostResult`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use libcrosspost::clients::mastodon::MastodonClient;
//! use libcrosspost::platforms::{mastodon::MastodonPoster, PlatformPoster};
//! use secrecy::SecretString;
//!
//! # async fn example() -> Result<(), libcrosspost::error::ClientError> {
//! let client = MastodonClient::new(
//!     "mastodon.social",
//!     SecretString::from("token".to_string()),
//!     Duration::from_secs(30),
//! )?;
//! let poster = PlatformPoster::Mastodon(MastodonPoster::new(Arc::new(client)));
//!
//! let result = poster.publish("Hello, fediverse!", &[]).await;
//! println!("{}", result.message());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::types::{Platform, PlatformPostResult};

pub mod auth_retry;
pub mod bluesky;
pub mod mastodon;
pub mod misskey;
pub mod threads;
pub mod x;

use auth_retry::AuthRetry;
use mastodon::MastodonPoster;
use misskey::MisskeyPoster;
use threads::ThreadsPoster;
use x::XPoster;

/// Response message reported for every successful post
pub const POSTED: &str = "posted";

/// Posts content plus images to a single platform
#[async_trait]
pub trait Poster: Send + Sync {
    fn platform(&self) -> Platform;

    /// Upload `image_paths` and publish `content`
    ///
    /// Returns the response message on success. Images are expected to be
    /// within the platform's count limit already.
    async fn post(&self, content: &str, image_paths: &[PathBuf]) -> Result<String, PlatformError>;
}

/// Reject content longer than the platform allows
///
/// Length is counted in Unicode scalar values.
pub fn check_character_limit(platform: Platform, content: &str) -> Result<(), PlatformError> {
    let limit = platform.limits().character_limit;
    let length = content.chars().count();

    if length > limit {
        return Err(PlatformError::Validation(format!(
            "content exceeds the {} character limit of {} ({} characters)",
            limit, platform, length
        )));
    }

    Ok(())
}

/// The closed set of platform posters
///
/// Bluesky always comes wrapped in the credential-refresh decorator.
pub enum PlatformPoster {
    Bluesky(AuthRetry),
    X(XPoster),
    Threads(ThreadsPoster),
    Misskey(MisskeyPoster),
    Mastodon(MastodonPoster),
}

impl PlatformPoster {
    pub fn platform(&self) -> Platform {
        match self {
            PlatformPoster::Bluesky(_) => Platform::Bluesky,
            PlatformPoster::X(_) => Platform::X,
            PlatformPoster::Threads(_) => Platform::Threads,
            PlatformPoster::Misskey(_) => Platform::Misskey,
            PlatformPoster::Mastodon(_) => Platform::Mastodon,
        }
    }

    pub async fn post(&self, content: &str, image_paths: &[PathBuf]) -> Result<String, PlatformError> {
        match self {
            PlatformPoster::Bluesky(poster) => poster.post(content, image_paths).await,
            PlatformPoster::X(poster) => poster.post(content, image_paths).await,
            PlatformPoster::Threads(poster) => poster.post(content, image_paths).await,
            PlatformPoster::Misskey(poster) => poster.post(content, image_paths).await,
            PlatformPoster::Mastodon(poster) => poster.post(content, image_paths).await,
        }
    }

    /// Post and fold the outcome into a result record
    pub async fn publish(&self, content: &str, image_paths: &[PathBuf]) -> PlatformPostResult {
        let platform = self.platform();

        match self.post(content, image_paths).await {
            Ok(response) => {
                tracing::info!("Posted to {}", platform);
                PlatformPostResult::posted(response)
            }
            Err(e) => {
                tracing::warn!("Posting to {} failed: {}", platform, e);
                PlatformPostResult::failed(e.to_string())
            }
        }
    }
}
