//! End-to-end publishing workflows against fake platform clients
//!
//! These tests drive `MultiPlatformPoster` the way the CLI does:
//! - Single-platform requests come back flattened
//! - Multi-platform requests aggregate with `all_success`
//! - Images are truncated per platform before any upload
//! - Unsupported or unconfigured platforms fail in isolation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use image::{DynamicImage, ImageFormat, RgbImage};
use libcrosspost::clients::mock::FakeClient;
use libcrosspost::error::ClientError;
use libcrosspost::{
    MultiPlatformPoster, Platform, PlatformContext, PlatformEntry, PlatformPostResult,
    PublishRequest, PublishResponse, PublishSettings,
};
use serde_json::json;
use tempfile::TempDir;

/// Fakes for every platform, kept so tests can inspect calls
struct Fakes {
    bluesky: FakeClient,
    x: FakeClient,
    threads: FakeClient,
    misskey: FakeClient,
    mastodon: FakeClient,
}

impl Fakes {
    fn new() -> Self {
        Self {
            bluesky: FakeClient::new(),
            x: FakeClient::new(),
            threads: FakeClient::new(),
            misskey: FakeClient::new(),
            mastodon: FakeClient::new(),
        }
    }

    fn poster(&self) -> MultiPlatformPoster {
        let context = PlatformContext::builder()
            .with_bluesky(Arc::new(self.bluesky.clone()), None)
            .with_x(Arc::new(self.x.clone()))
            .with_threads(Arc::new(self.threads.clone()))
            .with_misskey(Arc::new(self.misskey.clone()))
            .with_mastodon(Arc::new(self.mastodon.clone()))
            .build();
        MultiPlatformPoster::new(Arc::new(context), PublishSettings::default())
    }
}

fn write_images(dir: &Path, count: usize) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(count);
    for i in 0..count {
        let path = dir.join(format!("photo{}.png", i));
        DynamicImage::ImageRgb8(RgbImage::new(24, 24)).save_with_format(&path, ImageFormat::Png)?;
        paths.push(path);
    }
    Ok(paths)
}

#[tokio::test]
async fn test_single_mastodon_post_is_flattened() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let images = write_images(temp_dir.path(), 1)?;
    let fakes = Fakes::new();
    let poster = fakes.poster();

    let request = PublishRequest::new()
        .select(Platform::Mastodon, "hello")
        .with_shared_images(&images);
    let response = poster.publish(&request).await?;

    assert_eq!(
        serde_json::to_value(&response)?,
        json!({"platform": "mastodon", "success": true, "response": "posted"})
    );
    assert_eq!(fakes.mastodon.posted_content(), vec!["hello"]);
    assert_eq!(
        fakes.mastodon.ops(),
        vec!["mastodon.upload_media", "mastodon.post_status"]
    );
    Ok(())
}

#[tokio::test]
async fn test_multi_platform_success_aggregates() -> Result<()> {
    let fakes = Fakes::new();
    let poster = fakes.poster();

    let request = PublishRequest::new()
        .select(Platform::Bluesky, "hello everyone")
        .select(Platform::Misskey, "hello everyone")
        .select(Platform::Mastodon, "hello everyone");
    let response = poster.publish(&request).await?;

    assert!(response.is_success());
    assert_eq!(
        serde_json::to_value(&response)?,
        json!({
            "all_success": true,
            "results": {
                "bluesky": {"success": true, "response": "posted"},
                "misskey": {"success": true, "response": "posted"},
                "mastodon": {"success": true, "response": "posted"},
            }
        })
    );
    assert!(fakes.x.calls().is_empty());
    assert!(fakes.threads.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_partial_failure_clears_all_success() -> Result<()> {
    let fakes = Fakes::new();
    fakes.x.fail_next(
        "x.create_tweet",
        ClientError::from_response(403, r#"{"title":"Forbidden","detail":"duplicate content"}"#),
    );
    let poster = fakes.poster();

    let request = PublishRequest::new()
        .select(Platform::X, "same text")
        .select(Platform::Mastodon, "same text");
    let response = poster.publish(&request).await?;

    let PublishResponse::Multi(aggregate) = &response else {
        panic!("expected aggregated response, got {:?}", response);
    };
    assert!(!aggregate.all_success());
    assert_eq!(
        aggregate.results[&Platform::X],
        PlatformPostResult::failed("publish failed: HTTP 403: Forbidden: duplicate content")
    );
    assert!(aggregate.results[&Platform::Mastodon].is_success());
    Ok(())
}

#[tokio::test]
async fn test_threads_with_image_fails_without_calls() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let images = write_images(temp_dir.path(), 1)?;
    let fakes = Fakes::new();
    let poster = fakes.poster();

    let request = PublishRequest::new()
        .select(Platform::Threads, "x")
        .with_shared_images(&images);
    let response = poster.publish(&request).await?;

    assert_eq!(
        serde_json::to_value(&response)?,
        json!({
            "platform": "threads",
            "success": false,
            "error": "threads does not support image posts"
        })
    );
    assert!(fakes.threads.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_images_truncated_to_four_per_platform() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let images = write_images(temp_dir.path(), 6)?;
    let fakes = Fakes::new();
    let poster = fakes.poster();

    let request = PublishRequest::new()
        .select(Platform::Bluesky, "six pictures")
        .select(Platform::X, "six pictures")
        .select(Platform::Misskey, "six pictures")
        .select(Platform::Mastodon, "six pictures")
        .with_shared_images(&images);
    let response = poster.publish(&request).await?;

    assert!(response.is_success());
    assert_eq!(fakes.bluesky.call_count("bluesky.upload_blob"), 4);
    assert_eq!(fakes.x.call_count("x.upload_media"), 4);
    assert_eq!(fakes.misskey.call_count("misskey.upload_drive_file"), 4);
    assert_eq!(fakes.mastodon.call_count("mastodon.upload_media"), 4);

    // Order is preserved: the first four paths are the ones uploaded
    let uploaded: Vec<String> = fakes
        .mastodon
        .calls()
        .iter()
        .filter(|call| call.op == "mastodon.upload_media")
        .map(|call| call.args[0].clone())
        .collect();
    let expected: Vec<String> = images[..4].iter().map(|p| p.display().to_string()).collect();
    assert_eq!(uploaded, expected);
    Ok(())
}

#[tokio::test]
async fn test_unselected_and_empty_entries_are_skipped() -> Result<()> {
    let fakes = Fakes::new();
    let poster = fakes.poster();

    let mut request = PublishRequest::new()
        .select(Platform::Misskey, "only misskey")
        .select(Platform::Mastodon, "");
    request.insert(
        Platform::X,
        PlatformEntry {
            content: "not selected".to_string(),
            selected: false,
            image_paths: Vec::new(),
        },
    );
    let response = poster.publish(&request).await?;

    assert!(matches!(
        response,
        PublishResponse::Single { platform: Platform::Misskey, .. }
    ));
    assert!(fakes.x.calls().is_empty());
    assert!(fakes.mastodon.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_json_payload_workflow() -> Result<()> {
    let fakes = Fakes::new();
    let poster = fakes.poster();

    let request = PublishRequest::from_json(
        r#"{
            "bluesky": {"content": "from json", "selected": true},
            "threads": {"content": "from json", "selected": true},
            "x": {"content": "skipped", "selected": false},
            "facebook": {"content": "ignored", "selected": true}
        }"#,
    )?;
    let response = poster.publish(&request).await?;

    let results = response.results();
    assert_eq!(results.len(), 2);
    assert!(response.is_success());
    assert_eq!(fakes.bluesky.posted_content(), vec!["from json"]);
    assert_eq!(fakes.threads.posted_content(), vec!["from json"]);
    Ok(())
}

#[tokio::test]
async fn test_missing_clients_fail_individually() -> Result<()> {
    let mastodon = FakeClient::new();
    let context = PlatformContext::builder()
        .with_mastodon(Arc::new(mastodon.clone()))
        .build();
    let poster = MultiPlatformPoster::new(Arc::new(context), PublishSettings::default());

    let request = PublishRequest::new()
        .select(Platform::Bluesky, "hi")
        .select(Platform::Mastodon, "hi");
    let response = poster.publish(&request).await?;

    assert_eq!(
        serde_json::to_value(&response)?,
        json!({
            "all_success": false,
            "results": {
                "bluesky": {"success": false, "error": "bluesky client is not configured"},
                "mastodon": {"success": true, "response": "posted"},
            }
        })
    );
    Ok(())
}
