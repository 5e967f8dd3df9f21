//! Mastodon client
//!
//! Thin wrapper over megalodon. Works with any server speaking the Mastodon
//! API (Pleroma, Akkoma, GoToSocial and friends).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use megalodon::entities::UploadMedia;
use megalodon::megalodon::{PostStatusInputOptions, PostStatusOutput};
use megalodon::{Megalodon, SNS};
use secrecy::{ExposeSecret, SecretString};

use super::{normalize_instance_url, with_deadline, ClientResult, MastodonApi};
use crate::error::ClientError;

pub struct MastodonClient {
    client: Box<dyn Megalodon + Send + Sync>,
    timeout: Duration,
}

impl MastodonClient {
    /// Create a client for `instance` authenticated with `access_token`
    ///
    /// megalodon's HTTP layer has no per-request deadline, so every call is
    /// bounded by `timeout` here instead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use libcrosspost::clients::mastodon::MastodonClient;
    /// use secrecy::SecretString;
    /// use std::time::Duration;
    ///
    /// # fn example() -> Result<(), libcrosspost::error::ClientError> {
    /// let client = MastodonClient::new(
    ///     "mastodon.social",
    ///     SecretString::from("your-access-token".to_string()),
    ///     Duration::from_secs(30),
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        instance: &str,
        access_token: SecretString,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let client = megalodon::generator(
            SNS::Mastodon,
            normalize_instance_url(instance),
            Some(access_token.expose_secret().to_string()),
            None,
        )
        .map_err(|e| map_megalodon_error(e, "create client"))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl MastodonApi for MastodonClient {
    async fn upload_media(&self, path: &Path) -> ClientResult<String> {
        let upload = async {
            self.client
                .upload_media(path.to_string_lossy().into_owned(), None)
                .await
                .map_err(|e| map_megalodon_error(e, "upload media"))
        };
        let response = with_deadline(self.timeout, upload).await?;

        let media_id = match response.json {
            UploadMedia::Attachment(attachment) => attachment.id,
            UploadMedia::AsyncAttachment(attachment) => attachment.id,
        };

        Ok(media_id)
    }

    async fn post_status(&self, text: &str, media_ids: &[String]) -> ClientResult<String> {
        let options = PostStatusInputOptions {
            media_ids: (!media_ids.is_empty()).then(|| media_ids.to_vec()),
            ..Default::default()
        };

        let post = async {
            self.client
                .post_status(text.to_string(), Some(&options))
                .await
                .map_err(|e| map_megalodon_error(e, "post status"))
        };
        let response = with_deadline(self.timeout, post).await?;

        let status_id = match response.json {
            PostStatusOutput::Status(status) => status.id,
            PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(status_id)
    }
}

/// Map megalodon errors onto [`ClientError`]
///
/// megalodon folds the HTTP status into its error text, so the status is
/// recovered from there when present.
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> ClientError {
    let error_str = error.to_string();

    match extract_http_status(&error_str) {
        Some(status) => ClientError::Api {
            status,
            body: Some(crate::error::ApiErrorBody {
                error: None,
                message: Some(format!("{} ({})", error_str, context)),
            }),
        },
        None => ClientError::Other(format!("Mastodon {} failed: {}", context, error_str)),
    }
}

/// Extract an HTTP status code from an error message
///
/// Looks for patterns like "HTTP 401", "status 403" or a bare "401:".
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code) = after_prefix.get(0..3).and_then(|s| s.parse::<u16>().ok()) {
                if (100..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }

    // Standalone 3-digit codes followed by ':' or ' '
    let bytes = error_str.as_bytes();
    for (i, window) in bytes.windows(4).enumerate() {
        let is_code = window[..3].iter().all(u8::is_ascii_digit)
            && (window[3] == b':' || window[3] == b' ')
            && (i == 0 || !bytes[i - 1].is_ascii_digit());
        if !is_code {
            continue;
        }
        if let Some(code) = std::str::from_utf8(&window[..3])
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
        {
            if (100..=599).contains(&code) {
                return Some(code);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_http_status_with_prefix() {
        assert_eq!(extract_http_status("HTTP 401 Unauthorized"), Some(401));
        assert_eq!(extract_http_status("request failed with status 422"), Some(422));
        assert_eq!(extract_http_status("code: 503 service unavailable"), Some(503));
    }

    #[test]
    fn test_extract_http_status_standalone() {
        assert_eq!(extract_http_status("429: too many requests"), Some(429));
        assert_eq!(extract_http_status("error 500 internal"), Some(500));
    }

    #[test]
    fn test_extract_http_status_ignores_other_numbers() {
        assert_eq!(extract_http_status("connection refused"), None);
        assert_eq!(extract_http_status("id 12345 missing"), None);
        assert_eq!(extract_http_status("value 999 out of range"), None);
    }

    #[test]
    fn test_new_client_accepts_bare_hostname() {
        let client = MastodonClient::new(
            "mastodon.social",
            SecretString::from("t".to_string()),
            Duration::from_secs(5),
        );
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_unresponsive_instance_hits_deadline() {
        // Accepts the connection and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = MastodonClient::new(
            &format!("http://{}", address),
            SecretString::from("t".to_string()),
            Duration::from_millis(200),
        )
        .unwrap();

        let error = client.post_status("hello", &[]).await.unwrap_err();
        assert_eq!(
            error,
            ClientError::Transport("request timed out after 200ms".to_string())
        );
    }
}
