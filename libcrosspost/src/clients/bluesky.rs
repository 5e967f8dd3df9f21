//! Bluesky client
//!
//! Built on bsky-sdk's `BskyAgent`, which owns the session. XRPC failures are
//! mapped onto [`ClientError`] so the refresh logic can see the error code.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bsky_sdk::agent::config::Config;
use bsky_sdk::api::app::bsky::feed::post::{RecordData, RecordEmbedRefs};
use bsky_sdk::api::types::string::{Datetime, Language};
use bsky_sdk::api::types::Union;
use bsky_sdk::api::xrpc::error::{Error as XrpcCallError, XrpcErrorKind};
use bsky_sdk::BskyAgent;
use serde_json::json;

use super::{with_deadline, BlobRef, BlueskyApi, ClientResult, EmbeddedImage};
use crate::error::{ApiErrorBody, ClientError};

pub const DEFAULT_SERVICE: &str = "https://bsky.social";

// XRPC codes that must stay visible after the SDK flattens an error to text
const SESSION_ERROR_CODES: [&str; 3] = ["ExpiredToken", "InvalidToken", "AuthMissing"];

pub struct BlueskyClient {
    agent: BskyAgent,
    timeout: Duration,
}

impl BlueskyClient {
    /// Create a client for the given PDS, with no session yet
    pub async fn new(service: &str, timeout: Duration) -> ClientResult<Self> {
        let agent = BskyAgent::builder()
            .config(Config {
                endpoint: service.trim_end_matches('/').to_string(),
                ..Default::default()
            })
            .build()
            .await
            .map_err(map_sdk_error)?;

        Ok(Self { agent, timeout })
    }

    async fn require_session(&self) -> ClientResult<()> {
        match self.agent.get_session().await {
            Some(_) => Ok(()),
            None => Err(ClientError::Session {
                error: "AuthMissing".to_string(),
                message: "no active Bluesky session".to_string(),
            }),
        }
    }
}

#[async_trait]
impl BlueskyApi for BlueskyClient {
    async fn login(&self, identifier: &str, password: &str) -> ClientResult<()> {
        tracing::debug!("Creating Bluesky session for {}", identifier);

        let login = async {
            self.agent
                .login(identifier, password)
                .await
                .map_err(map_xrpc_error)
        };
        with_deadline(self.timeout, login).await?;

        tracing::debug!("Bluesky session created for {}", identifier);
        Ok(())
    }

    async fn upload_blob(&self, bytes: Vec<u8>, mime_type: &str) -> ClientResult<BlobRef> {
        self.require_session().await?;
        tracing::debug!("Uploading {} byte {} blob", bytes.len(), mime_type);

        let upload = async {
            self.agent
                .api
                .com
                .atproto
                .repo
                .upload_blob(bytes)
                .await
                .map_err(map_xrpc_error)
        };
        let output = with_deadline(self.timeout, upload).await?;

        let blob = serde_json::to_value(&output.blob)
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(BlobRef(blob))
    }

    async fn send_post(
        &self,
        text: &str,
        images: &[EmbeddedImage],
        langs: &[&str],
    ) -> ClientResult<String> {
        self.require_session().await?;

        let embed = if images.is_empty() {
            None
        } else {
            Some(images_embed(images)?)
        };

        let record = RecordData {
            created_at: Datetime::now(),
            embed,
            entities: None,
            facets: None,
            labels: None,
            langs: Some(languages(langs)?),
            reply: None,
            tags: None,
            text: text.to_string(),
        };

        let create = async {
            self.agent
                .create_record(record)
                .await
                .map_err(map_sdk_error)
        };
        let output = with_deadline(self.timeout, create).await?;

        let at_uri = output.uri.to_string();
        tracing::debug!("Posted to Bluesky: {}", at_uri);
        Ok(at_uri)
    }
}

/// Build the `app.bsky.embed.images` embed from uploaded blobs
fn images_embed(images: &[EmbeddedImage]) -> ClientResult<Union<RecordEmbedRefs>> {
    let images: Vec<serde_json::Value> = images
        .iter()
        .map(|image| json!({ "alt": image.alt, "image": image.image.0 }))
        .collect();

    serde_json::from_value(json!({
        "$type": "app.bsky.embed.images",
        "images": images,
    }))
    .map_err(|e| ClientError::Decode(format!("invalid image embed: {}", e)))
}

fn languages(langs: &[&str]) -> ClientResult<Vec<Language>> {
    serde_json::from_value(json!(langs))
        .map_err(|e| ClientError::Other(format!("invalid language tag: {}", e)))
}

/// Map a typed XRPC failure onto [`ClientError`]
///
/// Error responses keep their status and `{error, message}` body so the
/// expired-token code stays machine-readable.
fn map_xrpc_error<E: fmt::Debug>(error: XrpcCallError<E>) -> ClientError {
    match error {
        XrpcCallError::XrpcResponse(response) => {
            let body = match response.error {
                Some(XrpcErrorKind::Undefined(body)) => Some(ApiErrorBody {
                    error: body.error,
                    message: body.message,
                }),
                Some(XrpcErrorKind::Custom(custom)) => Some(ApiErrorBody {
                    error: Some(format!("{:?}", custom)),
                    message: None,
                }),
                None => None,
            };
            ClientError::Api {
                status: response.status.as_u16(),
                body,
            }
        }
        other => ClientError::Transport(format!("Bluesky request failed: {:?}", other)),
    }
}

/// Map a bsky-sdk agent error onto [`ClientError`]
///
/// The agent reports XRPC failures as text; any session error code found in
/// either rendering is kept at the front of the message.
fn map_sdk_error<E: fmt::Display + fmt::Debug>(error: E) -> ClientError {
    let error_msg = error.to_string();
    let debug_msg = format!("{:?}", error);

    match SESSION_ERROR_CODES
        .iter()
        .find(|code| debug_msg.contains(*code) && !error_msg.contains(*code))
    {
        Some(code) => ClientError::Other(format!("{}: {}", code, error_msg)),
        None => ClientError::Other(error_msg),
    }
}
