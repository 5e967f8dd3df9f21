//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! X's v1.1 media upload and v2 tweet endpoints accept user-context requests
//! signed this way. Only query/form parameters take part in the signature;
//! multipart and JSON bodies do not, so callers usually pass no extra params.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;

use super::ClientResult;
use crate::error::ClientError;

type HmacSha1 = Hmac<Sha1>;

/// Consumer and access-token key pairs for one account
#[derive(Debug, Clone)]
pub struct OAuth1Credentials {
    pub consumer_key: String,
    pub consumer_secret: SecretString,
    pub token: String,
    pub token_secret: SecretString,
}

/// Build an `Authorization` header value with a fresh nonce and timestamp
pub fn authorization_header(
    credentials: &OAuth1Credentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
) -> ClientResult<String> {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let timestamp = chrono::Utc::now().timestamp().to_string();

    authorization_header_with(credentials, method, url, params, &nonce, &timestamp)
}

pub(crate) fn authorization_header_with(
    credentials: &OAuth1Credentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> ClientResult<String> {
    let oauth_params = [
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", credentials.token.as_str()),
        ("oauth_version", "1.0"),
    ];

    let mut signed: Vec<(&str, &str)> = oauth_params.to_vec();
    signed.extend_from_slice(params);

    let signature = sign(
        method,
        url,
        &signed,
        credentials.consumer_secret.expose_secret(),
        credentials.token_secret.expose_secret(),
    )?;

    let header = oauth_params
        .iter()
        .chain(std::iter::once(&("oauth_signature", signature.as_str())))
        .map(|(key, value)| format!("{}=\"{}\"", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!("OAuth {}", header))
}

/// Compute the base64 HMAC-SHA1 signature of a request
pub fn sign(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    consumer_secret: &str,
    token_secret: &str,
) -> ClientResult<String> {
    let base = signature_base_string(method, url, params);
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| ClientError::Other(format!("invalid signing key: {}", e)))?;
    mac.update(base.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn signature_base_string(method: &str, url: &str, params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (encode(key), encode(value)))
        .collect();
    encoded.sort();

    let parameter_string = encoded
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&parameter_string)
    )
}

// RFC 3986 unreserved characters only
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
