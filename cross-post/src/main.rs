//! cross-post - Publish one post to several social networks at once

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use libcrosspost::config::expand_path;
use libcrosspost::logging::LoggingConfig;
use libcrosspost::{
    Config, CrosspostError, MultiPlatformPoster, Platform, PlatformContext, PublishError,
    PublishRequest, PublishResponse, PublishSettings,
};

#[derive(Parser, Debug)]
#[command(name = "cross-post")]
#[command(version, about = "Publish one post to Bluesky, X, Threads, Misskey and Mastodon")]
#[command(long_about = r#"Publish one post to several social networks at once.

EXAMPLES:
    # Post to every platform that has credentials
    cross-post "Hello, everyone"

    # Pick platforms and attach images (at most 4 are kept per platform)
    cross-post "Look at this" -p bluesky,mastodon -i cat.jpg -i dog.png

    # Read the content from stdin
    echo "Hello from a pipe" | cross-post -p misskey

    # Per-platform content from a JSON request file
    cross-post --request post.json --format json

    # Inspect what is available
    cross-post --list-platforms
    cross-post --limits

EXIT CODES:
    0 - Every selected platform succeeded
    1 - At least one platform failed, or a runtime error
    2 - A selected platform has no usable credentials
    3 - Invalid input (empty content, no platform selected, bad request)
"#)]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Target platform(s), comma-separated (default: all enabled)
    #[arg(short, long, value_delimiter = ',', value_name = "PLATFORM")]
    platform: Vec<String>,

    /// Attach an image (repeatable)
    #[arg(short, long, value_name = "PATH")]
    image: Vec<PathBuf>,

    /// JSON request with per-platform content, instead of CONTENT/--platform
    #[arg(long, value_name = "FILE", conflicts_with_all = ["content", "platform"])]
    request: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (default: $CROSSPOST_CONFIG or ~/.config/crosspost/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Print every platform with its enabled flag and character limit
    #[arg(long, conflicts_with = "limits")]
    list_platforms: bool,

    /// Print the character limit of every platform
    #[arg(long)]
    limits: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<CrosspostError>()
                .map(CrosspostError::exit_code)
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    tracing::debug!("cross-post started with args: {:?}", cli);

    if cli.limits {
        print_json(&PlatformContext::character_limits())?;
        return Ok(0);
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(&expand_path(path))?,
        None => Config::load()?,
    };
    let context = PlatformContext::from_config(&config).await?;

    if cli.list_platforms {
        print_json(&context.platforms())?;
        return Ok(0);
    }

    let request = build_request(&cli, &context)?;
    let missing_credentials = request
        .eligible()
        .iter()
        .any(|(platform, _)| !context.is_enabled(*platform));

    let settings = PublishSettings::try_from(&config.publish)?;
    let poster = MultiPlatformPoster::new(Arc::new(context), settings);
    let response = poster
        .publish(&request)
        .await
        .map_err(CrosspostError::from)?;

    match cli.format.as_str() {
        "json" => print_json(&response)?,
        _ => print_text(&response),
    }

    Ok(response.exit_code(missing_credentials))
}

fn build_request(cli: &Cli, context: &PlatformContext) -> Result<PublishRequest> {
    if let Some(path) = &cli.request {
        let payload = std::fs::read_to_string(path)
            .map_err(|e| {
                CrosspostError::InvalidInput(format!(
                    "Failed to read request file {}: {}",
                    path.display(),
                    e
                ))
            })?;
        let mut request = PublishRequest::from_json(&payload)?;
        if !cli.image.is_empty() {
            request = request.with_shared_images(&cli.image);
        }
        return Ok(request);
    }

    let content = read_content(cli.content.as_deref())?;

    let platforms = if cli.platform.is_empty() {
        context.enabled_platforms()
    } else {
        parse_platforms(&cli.platform)?
    };
    if platforms.is_empty() {
        return Err(CrosspostError::from(PublishError::NoPlatformSelected))
            .context("no platform has credentials configured; pass --platform or add credentials");
    }

    let request = platforms
        .into_iter()
        .fold(PublishRequest::new(), |request, platform| {
            request.select(platform, content.clone())
        })
        .with_shared_images(&cli.image);
    Ok(request)
}

fn read_content(argument: Option<&str>) -> Result<String> {
    let content = match argument {
        Some(content) => content.to_string(),
        None => {
            let mut stdin = std::io::stdin();
            if stdin.is_terminal() {
                return Err(CrosspostError::InvalidInput(
                    "No content provided. Pass it as an argument or pipe it via stdin".to_string(),
                )
                .into());
            }
            let mut buffer = String::new();
            stdin
                .read_to_string(&mut buffer)
                .map_err(|e| CrosspostError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
            buffer
        }
    };

    let content = content.trim_end().to_string();
    if content.trim().is_empty() {
        return Err(CrosspostError::InvalidInput("Content cannot be empty".to_string()).into());
    }
    Ok(content)
}

fn parse_platforms(names: &[String]) -> Result<Vec<Platform>> {
    let mut platforms = Vec::with_capacity(names.len());
    for name in names.iter().filter(|name| !name.trim().is_empty()) {
        let platform = name
            .parse::<Platform>()
            .map_err(CrosspostError::InvalidInput)?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    Ok(platforms)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_text(response: &PublishResponse) {
    for (platform, result) in response.results() {
        let symbol = if result.is_success() { "✓" } else { "✗" };
        println!("{} {}: {}", symbol, platform, result.message());
    }
}
