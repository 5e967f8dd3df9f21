//! Multi-platform publishing orchestration
//!
//! [`MultiPlatformPoster`] validates a [`PublishRequest`], hands each eligible
//! platform its content and images, and folds the per-platform outcomes into a
//! [`PublishResponse`]. Platforms are independent: one failing, timing out or
//! missing a client never affects the others.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::{FanOut, PublishConfig};
use crate::context::PlatformContext;
use crate::error::{CrosspostError, PlatformError, PublishError};
use crate::platforms::check_character_limit;
use crate::types::{Platform, PlatformEntry, PlatformPostResult, PublishRequest, PublishResponse};

const DEFAULT_PLATFORM_TIMEOUT: Duration = Duration::from_secs(120);

/// Orchestrator knobs, usually taken from the `[publish]` config section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishSettings {
    pub fan_out: FanOut,
    /// Upper bound on one platform's whole posting path
    pub platform_timeout: Duration,
    pub enforce_character_limits: bool,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            fan_out: FanOut::default(),
            platform_timeout: DEFAULT_PLATFORM_TIMEOUT,
            enforce_character_limits: true,
        }
    }
}

impl TryFrom<&PublishConfig> for PublishSettings {
    type Error = CrosspostError;

    fn try_from(config: &PublishConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            fan_out: config.fan_out,
            platform_timeout: config.platform_timeout()?,
            enforce_character_limits: config.enforce_character_limits,
        })
    }
}

/// Publishes one request across all selected platforms
pub struct MultiPlatformPoster {
    context: Arc<PlatformContext>,
    settings: PublishSettings,
}

impl MultiPlatformPoster {
    /// Create a new multi-platform poster
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use libcrosspost::{Config, MultiPlatformPoster, PlatformContext, PublishRequest, PublishSettings};
    /// use libcrosspost::types::Platform;
    ///
    /// # async fn example() -> libcrosspost::error::Result<()> {
    /// let config = Config::load()?;
    /// let context = Arc::new(PlatformContext::from_config(&config).await?);
    /// let poster = MultiPlatformPoster::new(context, PublishSettings::try_from(&config.publish)?);
    ///
    /// let request = PublishRequest::new()
    ///     .select(Platform::Mastodon, "Hello from crosspost")
    ///     .select(Platform::Misskey, "Hello from crosspost");
    /// let response = poster.publish(&request).await?;
    /// println!("{}", serde_json::to_string(&response).unwrap());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(context: Arc<PlatformContext>, settings: PublishSettings) -> Self {
        Self { context, settings }
    }

    pub fn context(&self) -> &PlatformContext {
        &self.context
    }

    pub fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    /// Publish to every eligible platform in `request`
    ///
    /// # Errors
    ///
    /// Fails only on request validation, before any platform is contacted:
    /// [`PublishError::NoPayload`] for an empty request and
    /// [`PublishError::NoPlatformSelected`] when no entry is selected with
    /// non-empty content. Platform failures are reported inside the response.
    pub async fn publish(&self, request: &PublishRequest) -> Result<PublishResponse, PublishError> {
        if request.is_empty() {
            return Err(PublishError::NoPayload);
        }

        let eligible = request.eligible();
        if eligible.is_empty() {
            return Err(PublishError::NoPlatformSelected);
        }

        info!(
            "Publishing to {} platform(s) ({:?})",
            eligible.len(),
            self.settings.fan_out
        );

        let results = match self.settings.fan_out {
            FanOut::Sequential => {
                let mut results = Vec::with_capacity(eligible.len());
                for (platform, entry) in eligible {
                    results.push((platform, self.post_one(platform, entry).await));
                }
                results
            }
            FanOut::Concurrent => {
                let futures = eligible.into_iter().map(|(platform, entry)| async move {
                    (platform, self.post_one(platform, entry).await)
                });
                join_all(futures).await
            }
        };

        Ok(PublishResponse::from_results(results))
    }

    async fn post_one(&self, platform: Platform, entry: &PlatformEntry) -> PlatformPostResult {
        match self.try_post_one(platform, entry).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Skipping {}: {}", platform, e);
                PlatformPostResult::failed(e.to_string())
            }
        }
    }

    async fn try_post_one(
        &self,
        platform: Platform,
        entry: &PlatformEntry,
    ) -> Result<PlatformPostResult, PlatformError> {
        if self.settings.enforce_character_limits {
            check_character_limit(platform, &entry.content)?;
        }

        let poster = self
            .context
            .poster(platform)
            .ok_or(PlatformError::NotConfigured(platform))?;

        let images = truncate_images(platform, &entry.image_paths);
        if images.len() < entry.image_paths.len() {
            info!(
                "Keeping the first {} of {} images for {}",
                images.len(),
                entry.image_paths.len(),
                platform
            );
        }

        info!("Posting to {}", platform);
        tokio::time::timeout(
            self.settings.platform_timeout,
            poster.publish(&entry.content, images),
        )
        .await
        .map_err(|_| PlatformError::Timeout(self.settings.platform_timeout))
    }
}

/// The images a platform accepts, in submission order
pub fn truncate_images(platform: Platform, image_paths: &[PathBuf]) -> &[PathBuf] {
    let max = platform.limits().max_image_count;
    &image_paths[..image_paths.len().min(max)]
}
