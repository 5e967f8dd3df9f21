//! Crosspost - publish one post to several social networks at once
//!
//! This library provides the publishing core used by the `cross-post` binary:
//! adaptive image compression, per-platform posters, credential refresh for
//! Bluesky, and the fan-out orchestrator that aggregates per-platform results.

pub mod clients;
pub mod compress;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod poster;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use context::PlatformContext;
pub use error::{CrosspostError, PlatformError, PublishError, Result};
pub use poster::{MultiPlatformPoster, PublishSettings};
pub use types::{
    AggregateResult, Platform, PlatformEntry, PlatformPostResult, PublishRequest,
    PublishResponse,
};
