//! Platform context: the set of ready-to-use posters
//!
//! Built once at start-up, either from [`Config`] (real clients) or through
//! [`PlatformContextBuilder`] (any client implementation, including the fakes
//! in [`crate::clients::mock`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::clients::bluesky::BlueskyClient;
use crate::clients::mastodon::MastodonClient;
use crate::clients::misskey::MisskeyClient;
use crate::clients::threads::ThreadsClient;
use crate::clients::x::XClient;
use crate::clients::{BlueskyApi, MastodonApi, MisskeyApi, ThreadsApi, XApi};
use crate::config::Config;
use crate::error::Result;
use crate::platforms::auth_retry::{AuthRetry, RefreshCredentials};
use crate::platforms::mastodon::MastodonPoster;
use crate::platforms::misskey::MisskeyPoster;
use crate::platforms::threads::ThreadsPoster;
use crate::platforms::x::XPoster;
use crate::platforms::PlatformPoster;
use crate::types::{Platform, PlatformStatus};

#[derive(Default)]
pub struct PlatformContext {
    posters: BTreeMap<Platform, PlatformPoster>,
}

impl PlatformContext {
    pub fn builder() -> PlatformContextBuilder {
        PlatformContextBuilder::default()
    }

    /// Create clients for every platform that has credentials
    ///
    /// Bluesky logs in here. A platform whose client cannot be created, or
    /// whose login fails, is logged and left out.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.publish.request_timeout()?;
        let mut builder = Self::builder();

        if let Some(bluesky) = &config.bluesky {
            match BlueskyClient::new(&bluesky.service, timeout).await {
                Ok(client) => match client.login(&bluesky.identifier, &bluesky.password).await {
                    Ok(()) => {
                        tracing::info!("Logged in to Bluesky as {}", bluesky.identifier);
                        let credentials =
                            RefreshCredentials::new(bluesky.identifier.clone(), bluesky.password());
                        builder = builder.with_bluesky(Arc::new(client), Some(credentials));
                    }
                    Err(e) => tracing::warn!("Bluesky login failed, disabling bluesky: {}", e),
                },
                Err(e) => tracing::warn!("Failed to create Bluesky client: {}", e),
            }
        }

        if let Some(x) = &config.x {
            match XClient::new(x.oauth1_credentials(), timeout) {
                Ok(client) => builder = builder.with_x(Arc::new(client)),
                Err(e) => tracing::warn!("Failed to create X client: {}", e),
            }
        }

        if let Some(threads) = &config.threads {
            match ThreadsClient::new(threads.access_token(), timeout) {
                Ok(client) => builder = builder.with_threads(Arc::new(client)),
                Err(e) => tracing::warn!("Failed to create Threads client: {}", e),
            }
        }

        if let Some(misskey) = &config.misskey {
            match MisskeyClient::new(&misskey.instance, misskey.token(), timeout) {
                Ok(client) => builder = builder.with_misskey(Arc::new(client)),
                Err(e) => tracing::warn!("Failed to create Misskey client: {}", e),
            }
        }

        if let Some(mastodon) = &config.mastodon {
            match MastodonClient::new(&mastodon.instance, mastodon.access_token(), timeout) {
                Ok(client) => builder = builder.with_mastodon(Arc::new(client)),
                Err(e) => tracing::warn!("Failed to create Mastodon client: {}", e),
            }
        }

        let context = builder.build();
        tracing::debug!("Enabled platforms: {:?}", context.enabled_platforms());
        Ok(context)
    }

    pub fn poster(&self, platform: Platform) -> Option<&PlatformPoster> {
        self.posters.get(&platform)
    }

    pub fn is_enabled(&self, platform: Platform) -> bool {
        self.posters.contains_key(&platform)
    }

    pub fn enabled_platforms(&self) -> Vec<Platform> {
        self.posters.keys().copied().collect()
    }

    /// Enabled flag and character limit for every supported platform
    pub fn platforms(&self) -> BTreeMap<Platform, PlatformStatus> {
        Platform::ALL
            .iter()
            .map(|platform| {
                let status = PlatformStatus {
                    enabled: self.is_enabled(*platform),
                    limit: platform.limits().character_limit,
                };
                (*platform, status)
            })
            .collect()
    }

    /// Character limit of every supported platform
    pub fn character_limits() -> BTreeMap<Platform, usize> {
        Platform::ALL
            .iter()
            .map(|platform| (*platform, platform.limits().character_limit))
            .collect()
    }
}

#[derive(Default)]
pub struct PlatformContextBuilder {
    posters: BTreeMap<Platform, PlatformPoster>,
}

impl PlatformContextBuilder {
    /// Add a Bluesky client; `credentials` enable session refresh
    pub fn with_bluesky(
        self,
        client: Arc<dyn BlueskyApi>,
        credentials: Option<RefreshCredentials>,
    ) -> Self {
        self.with_poster(PlatformPoster::Bluesky(AuthRetry::new(client, credentials)))
    }

    pub fn with_x(self, client: Arc<dyn XApi>) -> Self {
        self.with_poster(PlatformPoster::X(XPoster::new(client)))
    }

    pub fn with_threads(self, client: Arc<dyn ThreadsApi>) -> Self {
        self.with_poster(PlatformPoster::Threads(ThreadsPoster::new(client)))
    }

    pub fn with_misskey(self, client: Arc<dyn MisskeyApi>) -> Self {
        self.with_poster(PlatformPoster::Misskey(MisskeyPoster::new(client)))
    }

    pub fn with_mastodon(self, client: Arc<dyn MastodonApi>) -> Self {
        self.with_poster(PlatformPoster::Mastodon(MastodonPoster::new(client)))
    }

    /// Register a poster, replacing any previous one for the same platform
    pub fn with_poster(mut self, poster: PlatformPoster) -> Self {
        self.posters.insert(poster.platform(), poster);
        self
    }

    pub fn build(self) -> PlatformContext {
        PlatformContext {
            posters: self.posters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::FakeClient;
    use crate::config::{MisskeyConfig, ThreadsConfig};

    #[test]
    fn test_character_limits_table() {
        let limits = PlatformContext::character_limits();

        assert_eq!(limits.len(), 5);
        assert_eq!(limits[&Platform::Bluesky], 300);
        assert_eq!(limits[&Platform::X], 280);
        assert_eq!(limits[&Platform::Threads], 500);
        assert_eq!(limits[&Platform::Misskey], 3000);
        assert_eq!(limits[&Platform::Mastodon], 500);
    }

    #[test]
    fn test_platforms_reports_enabled_flags() {
        let fake = Arc::new(FakeClient::new());
        let context = PlatformContext::builder()
            .with_mastodon(fake.clone())
            .with_threads(fake)
            .build();

        let platforms = context.platforms();

        assert_eq!(platforms.len(), 5);
        assert!(platforms[&Platform::Mastodon].enabled);
        assert!(platforms[&Platform::Threads].enabled);
        assert!(!platforms[&Platform::Bluesky].enabled);
        assert_eq!(platforms[&Platform::Misskey].limit, 3000);
        assert_eq!(
            context.enabled_platforms(),
            vec![Platform::Threads, Platform::Mastodon]
        );
    }

    #[test]
    fn test_empty_context() {
        let context = PlatformContext::default();
        assert!(context.enabled_platforms().is_empty());
        assert!(context.poster(Platform::X).is_none());
        assert!(context.platforms().values().all(|status| !status.enabled));
    }

    #[tokio::test]
    async fn test_from_config_without_network_platforms() {
        let config = Config {
            threads: Some(ThreadsConfig {
                access_token: "token".to_string(),
            }),
            misskey: Some(MisskeyConfig {
                instance: "misskey.example".to_string(),
                token: "token".to_string(),
            }),
            ..Default::default()
        };

        let context = PlatformContext::from_config(&config).await.unwrap();

        assert_eq!(
            context.enabled_platforms(),
            vec![Platform::Threads, Platform::Misskey]
        );
    }
}
