//! Misskey API client
//!
//! Misskey takes the access token as the `i` field of every request body.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::{
    file_part, http_client, normalize_instance_url, read_json, ClientResult, MisskeyApi,
};

const NOTE_VISIBILITY: &str = "home";

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Note {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNoteOutput {
    created_note: Note,
}

pub struct MisskeyClient {
    http: reqwest::Client,
    instance_url: String,
    token: SecretString,
}

impl MisskeyClient {
    pub fn new(instance: &str, token: SecretString, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            instance_url: normalize_instance_url(instance),
            token,
        })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.instance_url, endpoint)
    }

    fn note_body(&self, text: &str, file_ids: &[String]) -> serde_json::Value {
        let mut body = json!({
            "i": self.token.expose_secret(),
            "text": text,
            "visibility": NOTE_VISIBILITY,
        });
        if !file_ids.is_empty() {
            body["fileIds"] = json!(file_ids);
        }
        body
    }
}

#[async_trait]
impl MisskeyApi for MisskeyClient {
    async fn upload_drive_file(&self, path: &Path) -> ClientResult<String> {
        let form = reqwest::multipart::Form::new()
            .text("i", self.token.expose_secret().to_string())
            .part("file", file_part(path).await?);

        let response = self
            .http
            .post(self.api_url("drive/files/create"))
            .multipart(form)
            .send()
            .await?;
        let file: DriveFile = read_json(response).await?;

        Ok(file.id)
    }

    async fn create_note(&self, text: &str, file_ids: &[String]) -> ClientResult<String> {
        let body = self.note_body(text, file_ids);
        let response = self
            .http
            .post(self.api_url("notes/create"))
            .json(&body)
            .send()
            .await?;
        let output: CreateNoteOutput = read_json(response).await?;

        Ok(output.created_note.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let client = MisskeyClient::new(
            "misskey.io/",
            SecretString::from("token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.api_url("notes/create"),
            "https://misskey.io/api/notes/create"
        );
    }

    #[test]
    fn test_note_body() {
        let client = MisskeyClient::new(
            "misskey.io",
            SecretString::from("token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let body = client.note_body("hello", &[]);
        assert_eq!(body["visibility"], "home");
        assert_eq!(body["i"], "token");
        assert!(body.get("fileIds").is_none());

        let body = client.note_body("hello", &["f1".to_string(), "f2".to_string()]);
        assert_eq!(body["fileIds"], json!(["f1", "f2"]));
    }

    #[test]
    fn test_create_note_output() {
        let output: CreateNoteOutput = serde_json::from_str(
            r#"{"createdNote":{"id":"9abcdef","text":"hello","visibility":"home"}}"#,
        )
        .unwrap();
        assert_eq!(output.created_note.id, "9abcdef");
    }
}
