//! Error types for Crosspost

use std::fmt;

use thiserror::Error;

use crate::types::Platform;

pub type Result<T> = std::result::Result<T, CrosspostError>;

#[derive(Error, Debug)]
pub enum CrosspostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Publish(#[from] PublishError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosspostError {
    /// Returns the appropriate exit code for this error
    ///
    /// Per-platform failures never surface here; they are folded into the
    /// response and scored by [`crate::types::PublishResponse::exit_code`].
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosspostError::InvalidInput(_) => 3,
            CrosspostError::Publish(_) => 3,
            CrosspostError::Config(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Request-level validation failures, raised before any platform is contacted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("no payload was submitted")]
    NoPayload,

    #[error("no platform selected")]
    NoPlatformSelected,
}

/// Failure of a single platform's posting path
///
/// The `Display` output is what ends up in the `error` field of that
/// platform's result.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Compression(String),

    #[error("upload failed: {0}")]
    Upload(ClientError),

    #[error("publish failed: {0}")]
    Publish(ClientError),

    #[error("refresh failed: {0}")]
    RefreshFailed(String),

    #[error("missing credentials for refresh")]
    MissingRefreshCredentials,

    #[error("{0} client is not configured")]
    NotConfigured(Platform),

    #[error("timed out after {}", format_timeout(.0))]
    Timeout(std::time::Duration),
}

impl PlatformError {
    /// The collaborator error behind this failure, if any
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            PlatformError::Upload(e) | PlatformError::Publish(e) => Some(e),
            _ => None,
        }
    }
}

/// The compressor could not produce an image within budget
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct CompressionFailure {
    pub reason: String,
}

impl CompressionFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<CompressionFailure> for PlatformError {
    fn from(failure: CompressionFailure) -> Self {
        PlatformError::Compression(failure.reason)
    }
}

/// Errors raised by platform clients
///
/// This is the closed set of shapes the posters know how to inspect. Anything
/// a concrete client cannot map more precisely lands in `Other`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The service answered with a non-success status
    #[error("HTTP {status}: {}", describe_body(.body))]
    Api {
        status: u16,
        body: Option<ApiErrorBody>,
    },

    /// The client's own session state rejected the call before it was sent
    #[error("session error {error}: {message}")]
    Session { error: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// The human-readable message carried by this error
    pub fn primary_message(&self) -> String {
        match self {
            ClientError::Api { body: Some(body), .. } => body.to_string(),
            ClientError::Api { status, body: None } => format!("HTTP {}", status),
            ClientError::Session { message, .. } => message.clone(),
            ClientError::Transport(msg)
            | ClientError::Decode(msg)
            | ClientError::Io(msg)
            | ClientError::Other(msg) => msg.clone(),
        }
    }

    /// Build an `Api` error from a status code and raw response body
    pub fn from_response(status: u16, body: &str) -> Self {
        ClientError::Api {
            status,
            body: ApiErrorBody::from_json(body),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        // Request URLs may carry credentials in their query string
        let error = error.without_url();
        if error.is_decode() {
            ClientError::Decode(error.to_string())
        } else {
            ClientError::Transport(error.to_string())
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(error: std::io::Error) -> Self {
        ClientError::Io(error.to_string())
    }
}

fn describe_body(body: &Option<ApiErrorBody>) -> String {
    body.as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "no error details".to_string())
}

fn format_timeout(duration: &std::time::Duration) -> String {
    humantime::format_duration(*duration).to_string()
}

/// Structured error payload returned by a platform API
///
/// Normalizes the shapes used by the supported services:
/// - XRPC / Mastodon: `{"error": "Code", "message": "..."}`
/// - Misskey / Threads: `{"error": {"code": "...", "message": "..."}}`
/// - X: `{"errors": [{"message": "..."}]}` or `{"title": "...", "detail": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn from_json(body: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let text = |v: Option<&serde_json::Value>| v.and_then(|v| v.as_str()).map(str::to_string);

        let parsed = match value.get("error") {
            Some(serde_json::Value::String(code)) => ApiErrorBody {
                error: Some(code.clone()),
                message: text(value.get("message")).or_else(|| text(value.get("error_description"))),
            },
            Some(nested @ serde_json::Value::Object(_)) => ApiErrorBody {
                error: text(nested.get("code")).or_else(|| text(nested.get("type"))),
                message: text(nested.get("message")),
            },
            _ => {
                let first = value.get("errors").and_then(|e| e.get(0));
                ApiErrorBody {
                    error: text(value.get("title"))
                        .or_else(|| first.and_then(|e| e.get("code")).map(|c| c.to_string())),
                    message: text(value.get("detail"))
                        .or_else(|| text(first.and_then(|e| e.get("message")))),
                }
            }
        };

        if parsed.error.is_none() && parsed.message.is_none() {
            None
        } else {
            Some(parsed)
        }
    }
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error, &self.message) {
            (Some(error), Some(message)) => write!(f, "{}: {}", error, message),
            (Some(error), None) => write!(f, "{}", error),
            (None, Some(message)) => write!(f, "{}", message),
            (None, None) => write!(f, "unknown error"),
        }
    }
}
