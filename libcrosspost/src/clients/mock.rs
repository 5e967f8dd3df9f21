//! Scriptable in-memory client for testing
//!
//! [`FakeClient`] implements every platform trait, records each call it
//! receives, and can be told to fail specific operations. Clones share state,
//! so a test can hand one clone to a poster and inspect the other.
//!
//! Operations are recorded under `<platform>.<call>` names:
//! `bluesky.login`, `bluesky.upload_blob`, `bluesky.send_post`,
//! `x.upload_media`, `x.create_tweet`, `threads.user_id`,
//! `threads.create_container`, `threads.publish`, `misskey.upload_drive_file`,
//! `misskey.create_note`, `mastodon.upload_media`, `mastodon.post_status`.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::sleep;

use super::{
    BlobRef, BlueskyApi, ClientResult, EmbeddedImage, MastodonApi, MisskeyApi,
    ThreadsApi, XApi,
};
use crate::error::ClientError;

/// One call received by the fake
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub op: String,
    pub args: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashMap<String, VecDeque<ClientError>>>,
    delay: Mutex<Duration>,
}

#[derive(Clone, Default)]
pub struct FakeClient {
    state: Arc<FakeState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call sleep for `delay` before answering
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.state.delay) = delay;
        self
    }

    /// Fail the next call of `op` with `error`
    ///
    /// Queued failures for the same op are consumed in order.
    pub fn fail_next(&self, op: &str, error: ClientError) {
        lock(&self.state.failures)
            .entry(op.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.state.calls).clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        lock(&self.state.calls).iter().filter(|c| c.op == op).count()
    }

    /// Names of all calls in the order they arrived
    pub fn ops(&self) -> Vec<String> {
        lock(&self.state.calls).iter().map(|c| c.op.clone()).collect()
    }

    /// Texts of every post/note/status/tweet that was accepted
    pub fn posted_content(&self) -> Vec<String> {
        const POST_OPS: [&str; 5] = [
            "bluesky.send_post",
            "x.create_tweet",
            "threads.create_container",
            "misskey.create_note",
            "mastodon.post_status",
        ];
        lock(&self.state.calls)
            .iter()
            .filter(|c| POST_OPS.contains(&c.op.as_str()))
            .filter_map(|c| c.args.first().cloned())
            .collect()
    }

    async fn record(&self, op: &str, args: Vec<String>) -> ClientResult<()> {
        lock(&self.state.calls).push(RecordedCall {
            op: op.to_string(),
            args,
        });

        let delay = *lock(&self.state.delay);
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let failure = lock(&self.state.failures)
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn fake_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[async_trait]
impl BlueskyApi for FakeClient {
    async fn login(&self, identifier: &str, _password: &str) -> ClientResult<()> {
        self.record("bluesky.login", vec![identifier.to_string()]).await
    }

    async fn upload_blob(&self, bytes: Vec<u8>, mime_type: &str) -> ClientResult<BlobRef> {
        self.record(
            "bluesky.upload_blob",
            vec![bytes.len().to_string(), mime_type.to_string()],
        )
        .await?;

        Ok(BlobRef(json!({
            "$type": "blob",
            "ref": { "$link": fake_id("bafkrei") },
            "mimeType": mime_type,
            "size": bytes.len(),
        })))
    }

    async fn send_post(
        &self,
        text: &str,
        images: &[EmbeddedImage],
        langs: &[&str],
    ) -> ClientResult<String> {
        let mut args = vec![text.to_string(), images.len().to_string(), langs.join(",")];
        args.extend(images.iter().map(|image| image.alt.clone()));
        self.record("bluesky.send_post", args).await?;

        Ok(format!("at://did:plc:fake/app.bsky.feed.post/{}", fake_id("rec")))
    }
}

#[async_trait]
impl XApi for FakeClient {
    async fn upload_media(&self, path: &Path) -> ClientResult<String> {
        self.record("x.upload_media", vec![path_arg(path)]).await?;
        Ok(fake_id("media"))
    }

    async fn create_tweet(&self, text: &str, media_ids: &[String]) -> ClientResult<String> {
        self.record(
            "x.create_tweet",
            vec![text.to_string(), media_ids.len().to_string()],
        )
        .await?;
        Ok(fake_id("tweet"))
    }
}

#[async_trait]
impl ThreadsApi for FakeClient {
    async fn user_id(&self) -> ClientResult<String> {
        self.record("threads.user_id", Vec::new()).await?;
        Ok("1789".to_string())
    }

    async fn create_container(&self, user_id: &str, text: &str) -> ClientResult<String> {
        self.record(
            "threads.create_container",
            vec![text.to_string(), user_id.to_string()],
        )
        .await?;
        Ok(fake_id("container"))
    }

    async fn publish(&self, user_id: &str, creation_id: &str) -> ClientResult<String> {
        self.record(
            "threads.publish",
            vec![creation_id.to_string(), user_id.to_string()],
        )
        .await?;
        Ok(fake_id("thread"))
    }
}

#[async_trait]
impl MisskeyApi for FakeClient {
    async fn upload_drive_file(&self, path: &Path) -> ClientResult<String> {
        self.record("misskey.upload_drive_file", vec![path_arg(path)]).await?;
        Ok(fake_id("file"))
    }

    async fn create_note(&self, text: &str, file_ids: &[String]) -> ClientResult<String> {
        self.record(
            "misskey.create_note",
            vec![text.to_string(), file_ids.len().to_string()],
        )
        .await?;
        Ok(fake_id("note"))
    }
}

#[async_trait]
impl MastodonApi for FakeClient {
    async fn upload_media(&self, path: &Path) -> ClientResult<String> {
        self.record("mastodon.upload_media", vec![path_arg(path)]).await?;
        Ok(fake_id("attachment"))
    }

    async fn post_status(&self, text: &str, media_ids: &[String]) -> ClientResult<String> {
        self.record(
            "mastodon.post_status",
            vec![text.to_string(), media_ids.len().to_string()],
        )
        .await?;
        Ok(fake_id("status"))
    }
}
