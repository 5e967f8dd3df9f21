//! Core types for Crosspost

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{CrosspostError, Result};

/// The supported social networks
///
/// Declaration order is the stable iteration order used everywhere a set of
/// platforms is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Bluesky,
    X,
    Threads,
    Misskey,
    Mastodon,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Bluesky,
        Platform::X,
        Platform::Threads,
        Platform::Misskey,
        Platform::Mastodon,
    ];

    /// Lowercase identifier used on the wire and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Bluesky => "bluesky",
            Platform::X => "x",
            Platform::Threads => "threads",
            Platform::Misskey => "misskey",
            Platform::Mastodon => "mastodon",
        }
    }

    /// Static posting limits for this platform
    pub fn limits(&self) -> &'static PlatformLimits {
        match self {
            Platform::Bluesky => &BLUESKY_LIMITS,
            Platform::X => &X_LIMITS,
            Platform::Threads => &THREADS_LIMITS,
            Platform::Misskey => &MISSKEY_LIMITS,
            Platform::Mastodon => &MASTODON_LIMITS,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bluesky" => Ok(Platform::Bluesky),
            "x" | "twitter" => Ok(Platform::X),
            "threads" => Ok(Platform::Threads),
            "misskey" => Ok(Platform::Misskey),
            "mastodon" => Ok(Platform::Mastodon),
            _ => Err(format!(
                "Unknown platform: '{}'. Valid options: bluesky, x, threads, misskey, mastodon",
                s
            )),
        }
    }
}

// ============================================================================
// Limits
// ============================================================================

/// Size constraints an uploaded image must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBudget {
    /// Maximum encoded size in bytes
    pub max_byte_size: usize,
    /// Neither side may be shrunk once it is below this many pixels
    pub min_pixel_dimension: u32,
    /// Upper bound on encode attempts
    pub max_attempts: u32,
}

/// Per-platform posting constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLimits {
    pub character_limit: usize,
    pub max_image_count: usize,
    /// `Some` when images must be compressed to fit before upload
    pub image_budget: Option<ImageBudget>,
}

const BLUESKY_LIMITS: PlatformLimits = PlatformLimits {
    character_limit: 300,
    max_image_count: 4,
    image_budget: Some(ImageBudget {
        max_byte_size: 976 * 1024,
        min_pixel_dimension: 100,
        max_attempts: 15,
    }),
};

const X_LIMITS: PlatformLimits = PlatformLimits {
    character_limit: 280,
    max_image_count: 4,
    image_budget: None,
};

const THREADS_LIMITS: PlatformLimits = PlatformLimits {
    character_limit: 500,
    max_image_count: 4,
    image_budget: None,
};

const MISSKEY_LIMITS: PlatformLimits = PlatformLimits {
    character_limit: 3000,
    max_image_count: 4,
    image_budget: None,
};

const MASTODON_LIMITS: PlatformLimits = PlatformLimits {
    character_limit: 500,
    max_image_count: 4,
    image_budget: None,
};

// ============================================================================
// Requests
// ============================================================================

/// What to post on one platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEntry {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_paths: Vec<PathBuf>,
}

impl PlatformEntry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            selected: true,
            image_paths: Vec::new(),
        }
    }

    pub fn with_images(mut self, image_paths: Vec<PathBuf>) -> Self {
        self.image_paths = image_paths;
        self
    }

    /// Selected with non-empty content
    pub fn is_eligible(&self) -> bool {
        self.selected && !self.content.is_empty()
    }
}

/// A publish request keyed by platform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishRequest {
    entries: BTreeMap<Platform, PlatformEntry>,
}

impl PublishRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON payload shape `{"bluesky": {"content": "...", "selected": true}, ...}`
    ///
    /// Keys that do not name a supported platform are ignored.
    pub fn from_json(payload: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(payload)
            .map_err(|e| CrosspostError::InvalidInput(format!("Invalid request payload: {}", e)))?;

        let mut request = Self::new();
        for (key, value) in raw {
            let Ok(platform) = key.parse::<Platform>() else {
                tracing::debug!("Ignoring unknown platform key in request: {}", key);
                continue;
            };
            let entry: PlatformEntry = serde_json::from_value(value).map_err(|e| {
                CrosspostError::InvalidInput(format!("Invalid entry for {}: {}", platform, e))
            })?;
            request.insert(platform, entry);
        }

        Ok(request)
    }

    pub fn insert(&mut self, platform: Platform, entry: PlatformEntry) -> &mut Self {
        self.entries.insert(platform, entry);
        self
    }

    /// Select `platform` with the given content
    pub fn select(mut self, platform: Platform, content: impl Into<String>) -> Self {
        self.entries.insert(platform, PlatformEntry::new(content));
        self
    }

    /// Attach the same image list to every entry
    pub fn with_shared_images(mut self, image_paths: &[PathBuf]) -> Self {
        for entry in self.entries.values_mut() {
            entry.image_paths = image_paths.to_vec();
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, platform: Platform) -> Option<&PlatformEntry> {
        self.entries.get(&platform)
    }

    /// Entries that will actually be posted, in platform order
    pub fn eligible(&self) -> Vec<(Platform, &PlatformEntry)> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_eligible())
            .map(|(platform, entry)| (*platform, entry))
            .collect()
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of posting to one platform
///
/// Serializes as `{"success": true, "response": ...}` or
/// `{"success": false, "error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformPostResult {
    Posted { response: String },
    Failed { error: String },
}

impl PlatformPostResult {
    pub fn posted(response: impl Into<String>) -> Self {
        PlatformPostResult::Posted {
            response: response.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        PlatformPostResult::Failed {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PlatformPostResult::Posted { .. })
    }

    /// The response on success, the error on failure
    pub fn message(&self) -> &str {
        match self {
            PlatformPostResult::Posted { response } => response,
            PlatformPostResult::Failed { error } => error,
        }
    }

    fn serialize_fields<M: SerializeMap>(&self, map: &mut M) -> std::result::Result<(), M::Error> {
        map.serialize_entry("success", &self.is_success())?;
        match self {
            PlatformPostResult::Posted { response } => map.serialize_entry("response", response),
            PlatformPostResult::Failed { error } => map.serialize_entry("error", error),
        }
    }
}

impl Serialize for PlatformPostResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        self.serialize_fields(&mut map)?;
        map.end()
    }
}

/// Results of one publish call, keyed by platform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateResult {
    pub results: BTreeMap<Platform, PlatformPostResult>,
}

impl AggregateResult {
    /// True when every platform succeeded
    pub fn all_success(&self) -> bool {
        self.results.values().all(PlatformPostResult::is_success)
    }
}

/// Caller-facing shape of a publish call
///
/// A single eligible platform is flattened into its own result, anything else
/// keeps the full map plus the `all_success` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishResponse {
    Single {
        platform: Platform,
        result: PlatformPostResult,
    },
    Multi(AggregateResult),
}

impl PublishResponse {
    pub fn from_results(mut results: Vec<(Platform, PlatformPostResult)>) -> Self {
        if results.len() == 1 {
            if let Some((platform, result)) = results.pop() {
                return PublishResponse::Single { platform, result };
            }
        }

        PublishResponse::Multi(AggregateResult {
            results: results.into_iter().collect(),
        })
    }

    pub fn is_success(&self) -> bool {
        match self {
            PublishResponse::Single { result, .. } => result.is_success(),
            PublishResponse::Multi(aggregate) => aggregate.all_success(),
        }
    }

    /// Process exit code for this outcome
    ///
    /// 0 when every platform posted, 2 when something failed and at least one
    /// requested platform had no credentials, 1 for any other failure.
    pub fn exit_code(&self, missing_credentials: bool) -> i32 {
        if self.is_success() {
            0
        } else if missing_credentials {
            2
        } else {
            1
        }
    }

    /// Iterate over every platform result regardless of shape
    pub fn results(&self) -> Vec<(Platform, &PlatformPostResult)> {
        match self {
            PublishResponse::Single { platform, result } => vec![(*platform, result)],
            PublishResponse::Multi(aggregate) => aggregate
                .results
                .iter()
                .map(|(platform, result)| (*platform, result))
                .collect(),
        }
    }
}

impl Serialize for PublishResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PublishResponse::Single { platform, result } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("platform", platform)?;
                result.serialize_fields(&mut map)?;
                map.end()
            }
            PublishResponse::Multi(aggregate) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("all_success", &aggregate.all_success())?;
                map.serialize_entry("results", &aggregate.results)?;
                map.end()
            }
        }
    }
}

/// Enabled flag and character limit reported for each platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformStatus {
    pub enabled: bool,
    pub limit: usize,
}
