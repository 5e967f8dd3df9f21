//! Threads Graph API client

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{http_client, read_json, ClientResult, ThreadsApi};

pub const GRAPH_API_BASE: &str = "https://graph.threads.net/v1.0";

#[derive(Debug, Deserialize)]
struct IdOutput {
    id: String,
}

pub struct ThreadsClient {
    http: reqwest::Client,
    base_url: String,
    access_token: SecretString,
}

impl ThreadsClient {
    pub fn new(access_token: SecretString, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: GRAPH_API_BASE.to_string(),
            access_token,
        })
    }

    /// Point the client at another Graph API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post_for_id(&self, url: String, params: &[(&str, &str)]) -> ClientResult<String> {
        let response = self
            .http
            .post(url)
            .query(params)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;
        let output: IdOutput = read_json(response).await?;
        Ok(output.id)
    }
}

#[async_trait]
impl ThreadsApi for ThreadsClient {
    async fn user_id(&self) -> ClientResult<String> {
        let response = self
            .http
            .get(format!("{}/me", self.base_url))
            .query(&[("fields", "id")])
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;
        let output: IdOutput = read_json(response).await?;
        Ok(output.id)
    }

    async fn create_container(&self, user_id: &str, text: &str) -> ClientResult<String> {
        self.post_for_id(
            format!("{}/{}/threads", self.base_url, user_id),
            &[("media_type", "TEXT"), ("text", text)],
        )
        .await
    }

    async fn publish(&self, user_id: &str, creation_id: &str) -> ClientResult<String> {
        self.post_for_id(
            format!("{}/{}/threads_publish", self.base_url, user_id),
            &[("creation_id", creation_id)],
        )
        .await
    }
}
