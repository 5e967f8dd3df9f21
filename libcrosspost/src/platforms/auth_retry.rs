//! Credential refresh for Bluesky
//!
//! Bluesky sessions expire. When a post fails because the access token is no
//! longer valid, [`AuthRetry`] logs in again with the stored identifier and
//! password and retries the whole post exactly once.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use super::bluesky::BlueskyPoster;
use super::Poster;
use crate::clients::BlueskyApi;
use crate::error::{ClientError, PlatformError};
use crate::types::Platform;

/// Error code the PDS uses for an expired access token
pub const EXPIRED_TOKEN_MARKER: &str = "ExpiredToken";

/// Identifier and password used to re-create a session
#[derive(Debug, Clone)]
pub struct RefreshCredentials {
    pub identifier: String,
    pub password: SecretString,
}

impl RefreshCredentials {
    pub fn new(identifier: impl Into<String>, password: SecretString) -> Self {
        Self {
            identifier: identifier.into(),
            password,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidCredential,
    Other,
}

/// Decide whether a failed post is worth a re-login
///
/// Only errors that carry the expired-token marker count: in the message, in
/// the structured API error code, or as a session error raised by the client.
pub fn classify(error: &PlatformError) -> FailureKind {
    let Some(client_error) = error.client_error() else {
        return FailureKind::Other;
    };

    let structured = match client_error {
        ClientError::Api { body: Some(body), .. } => {
            body.error.as_deref() == Some(EXPIRED_TOKEN_MARKER)
        }
        ClientError::Session { error, .. } => error == EXPIRED_TOKEN_MARKER,
        _ => false,
    };

    if structured || client_error.primary_message().contains(EXPIRED_TOKEN_MARKER) {
        FailureKind::InvalidCredential
    } else {
        FailureKind::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryState {
    Fresh,
    Retried,
}

/// Bluesky poster that refreshes its session once on token expiry
pub struct AuthRetry {
    poster: BlueskyPoster,
    client: Arc<dyn BlueskyApi>,
    credentials: Option<RefreshCredentials>,
    // Held across an attempt and any re-login
    session_lock: Mutex<()>,
}

impl AuthRetry {
    pub fn new(client: Arc<dyn BlueskyApi>, credentials: Option<RefreshCredentials>) -> Self {
        Self {
            poster: BlueskyPoster::new(Arc::clone(&client)),
            client,
            credentials,
            session_lock: Mutex::new(()),
        }
    }

    async fn relogin(&self, credentials: &RefreshCredentials) -> Result<(), PlatformError> {
        tracing::info!("Bluesky token expired, logging in again as {}", credentials.identifier);

        self.client
            .login(&credentials.identifier, credentials.password.expose_secret())
            .await
            .map_err(|e| PlatformError::RefreshFailed(e.to_string()))
    }
}

#[async_trait]
impl Poster for AuthRetry {
    fn platform(&self) -> Platform {
        Platform::Bluesky
    }

    async fn post(&self, content: &str, image_paths: &[PathBuf]) -> Result<String, PlatformError> {
        let _guard = self.session_lock.lock().await;
        let mut state = RetryState::Fresh;

        loop {
            let error = match self.poster.post(content, image_paths).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if state == RetryState::Retried {
                return Err(PlatformError::RefreshFailed(error.to_string()));
            }

            if classify(&error) == FailureKind::Other {
                return Err(error);
            }

            let Some(credentials) = &self.credentials else {
                tracing::warn!("Bluesky token expired and no credentials are stored");
                return Err(PlatformError::MissingRefreshCredentials);
            };

            self.relogin(credentials).await?;
            state = RetryState::Retried;
        }
    }
}
