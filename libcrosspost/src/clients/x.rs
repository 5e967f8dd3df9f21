//! X (Twitter) client
//!
//! Media goes through the v1.1 upload endpoint, tweets through v2. Both are
//! signed with OAuth 1.0a user credentials.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::oauth1::{authorization_header, OAuth1Credentials};
use super::{file_part, http_client, read_json, ClientResult, XApi};

pub const MEDIA_UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";
pub const TWEETS_URL: &str = "https://api.twitter.com/2/tweets";

#[derive(Debug, Deserialize)]
struct MediaUploadOutput {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreateTweetOutput {
    data: TweetData,
}

pub struct XClient {
    http: reqwest::Client,
    credentials: OAuth1Credentials,
}

impl XClient {
    pub fn new(credentials: OAuth1Credentials, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            credentials,
        })
    }
}

#[async_trait]
impl XApi for XClient {
    async fn upload_media(&self, path: &Path) -> ClientResult<String> {
        let form = reqwest::multipart::Form::new().part("media", file_part(path).await?);
        let authorization = authorization_header(&self.credentials, "POST", MEDIA_UPLOAD_URL, &[])?;

        let response = self
            .http
            .post(MEDIA_UPLOAD_URL)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .multipart(form)
            .send()
            .await?;
        let output: MediaUploadOutput = read_json(response).await?;

        tracing::debug!("Uploaded {} to X as {}", path.display(), output.media_id_string);
        Ok(output.media_id_string)
    }

    async fn create_tweet(&self, text: &str, media_ids: &[String]) -> ClientResult<String> {
        let mut body = json!({ "text": text });
        if !media_ids.is_empty() {
            body["media"] = json!({ "media_ids": media_ids });
        }
        let authorization = authorization_header(&self.credentials, "POST", TWEETS_URL, &[])?;

        let response = self
            .http
            .post(TWEETS_URL)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&body)
            .send()
            .await?;
        let output: CreateTweetOutput = read_json(response).await?;

        Ok(output.data.id)
    }
}
