//! Configuration management for Crosspost
//!
//! Settings come from a TOML file, and platform credentials may also come from
//! the environment (a `.env` file in the working directory is honoured).
//! Environment values win over the file.
//!
//! ```toml
//! [publish]
//! fan_out = "concurrent"        # or "sequential"
//! request_timeout = "30s"
//! platform_timeout = "2m"
//! enforce_character_limits = true
//!
//! [bluesky]
//! identifier = "alice.bsky.social"
//! password = "app-password"
//!
//! [mastodon]
//! instance = "mastodon.social"
//! access_token = "..."
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const CONFIG_ENV_VAR: &str = "CROSSPOST_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub publish: PublishConfig,
    pub bluesky: Option<BlueskyConfig>,
    pub x: Option<XConfig>,
    pub threads: Option<ThreadsConfig>,
    pub misskey: Option<MisskeyConfig>,
    pub mastodon: Option<MastodonConfig>,
}

/// How selected platforms are driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// One platform at a time, in platform order
    Sequential,
    /// All platforms at once
    #[default]
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub fan_out: FanOut,
    /// Per HTTP request, humantime syntax
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
    /// Per platform attempt, humantime syntax
    #[serde(default = "default_platform_timeout")]
    pub platform_timeout: String,
    #[serde(default = "default_true")]
    pub enforce_character_limits: bool,
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_platform_timeout() -> String {
    "2m".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            fan_out: FanOut::default(),
            request_timeout: default_request_timeout(),
            platform_timeout: default_platform_timeout(),
            enforce_character_limits: true,
        }
    }
}

impl PublishConfig {
    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration("publish.request_timeout", &self.request_timeout)
    }

    pub fn platform_timeout(&self) -> Result<Duration> {
        parse_duration("publish.platform_timeout", &self.platform_timeout)
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    let duration = humantime::parse_duration(value).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })?;

    if duration.is_zero() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        }
        .into());
    }

    Ok(duration)
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    pub identifier: String,
    pub password: String,
    #[serde(default = "default_bluesky_service")]
    pub service: String,
}

fn default_bluesky_service() -> String {
    crate::clients::bluesky::DEFAULT_SERVICE.to_string()
}

impl BlueskyConfig {
    pub fn password(&self) -> SecretString {
        SecretString::from(self.password.clone())
    }
}

impl fmt::Debug for BlueskyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueskyConfig")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .field("service", &self.service)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct XConfig {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl XConfig {
    pub fn oauth1_credentials(&self) -> crate::clients::oauth1::OAuth1Credentials {
        crate::clients::oauth1::OAuth1Credentials {
            consumer_key: self.api_key.clone(),
            consumer_secret: SecretString::from(self.api_secret.clone()),
            token: self.access_token.clone(),
            token_secret: SecretString::from(self.access_token_secret.clone()),
        }
    }
}

impl fmt::Debug for XConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("access_token_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ThreadsConfig {
    pub access_token: String,
}

impl ThreadsConfig {
    pub fn access_token(&self) -> SecretString {
        SecretString::from(self.access_token.clone())
    }
}

impl fmt::Debug for ThreadsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadsConfig")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MisskeyConfig {
    pub instance: String,
    pub token: String,
}

impl MisskeyConfig {
    pub fn token(&self) -> SecretString {
        SecretString::from(self.token.clone())
    }
}

impl fmt::Debug for MisskeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MisskeyConfig")
            .field("instance", &self.instance)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    pub instance: String,
    pub access_token: String,
}

impl MastodonConfig {
    pub fn access_token(&self) -> SecretString {
        SecretString::from(self.access_token.clone())
    }
}

impl fmt::Debug for MastodonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MastodonConfig")
            .field("instance", &self.instance)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing config file is not an error; the defaults are used and
    /// credentials may still come from the environment.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from `path` if it exists, then apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        // .env is optional
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", env_file.display());
        }

        let mut config = if path.exists() {
            Self::load_from_path(path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file, without environment overrides
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.publish.request_timeout()?;
        self.publish.platform_timeout()?;

        if let Some(misskey) = &self.misskey {
            if misskey.instance.trim().is_empty() {
                return Err(ConfigError::MissingField("misskey.instance".to_string()).into());
            }
        }
        if let Some(mastodon) = &self.mastodon {
            if mastodon.instance.trim().is_empty() {
                return Err(ConfigError::MissingField("mastodon.instance".to_string()).into());
            }
        }

        Ok(())
    }

    /// Fill or override platform sections from environment variables
    ///
    /// A section that does not exist yet is only created when every
    /// required variable for it is set.
    pub fn apply_env_overrides(&mut self) {
        let identifier = env_value("BLUESKY_USERNAME");
        let password = env_value("BLUESKY_PASSWORD");
        match &mut self.bluesky {
            Some(bluesky) => {
                override_with(&mut bluesky.identifier, identifier);
                override_with(&mut bluesky.password, password);
            }
            None => {
                if let (Some(identifier), Some(password)) = (identifier, password) {
                    self.bluesky = Some(BlueskyConfig {
                        identifier,
                        password,
                        service: default_bluesky_service(),
                    });
                }
            }
        }

        let api_key = env_value("X_API_KEY");
        let api_secret = env_value("X_API_SECRET");
        let access_token = env_value("X_ACCESS_TOKEN");
        let access_token_secret = env_value("X_ACCESS_TOKEN_SECRET");
        match &mut self.x {
            Some(x) => {
                override_with(&mut x.api_key, api_key);
                override_with(&mut x.api_secret, api_secret);
                override_with(&mut x.access_token, access_token);
                override_with(&mut x.access_token_secret, access_token_secret);
            }
            None => {
                if let (Some(api_key), Some(api_secret), Some(access_token), Some(access_token_secret)) =
                    (api_key, api_secret, access_token, access_token_secret)
                {
                    self.x = Some(XConfig {
                        api_key,
                        api_secret,
                        access_token,
                        access_token_secret,
                    });
                }
            }
        }

        let threads_token = env_value("THREADS_ACCESS_TOKEN");
        match &mut self.threads {
            Some(threads) => override_with(&mut threads.access_token, threads_token),
            None => {
                self.threads = threads_token.map(|access_token| ThreadsConfig { access_token });
            }
        }

        let misskey_token = env_value("MISSKEY_API_TOKEN");
        let misskey_instance = env_value("MISSKEY_INSTANCE_URL");
        match &mut self.misskey {
            Some(misskey) => {
                override_with(&mut misskey.token, misskey_token);
                override_with(&mut misskey.instance, misskey_instance);
            }
            None => {
                if let (Some(token), Some(instance)) = (misskey_token, misskey_instance) {
                    self.misskey = Some(MisskeyConfig { instance, token });
                }
            }
        }

        let mastodon_token = env_value("MASTODON_ACCESS_TOKEN");
        let mastodon_instance = env_value("MASTODON_INSTANCE_URL");
        match &mut self.mastodon {
            Some(mastodon) => {
                override_with(&mut mastodon.access_token, mastodon_token);
                override_with(&mut mastodon.instance, mastodon_instance);
            }
            None => {
                if let (Some(access_token), Some(instance)) = (mastodon_token, mastodon_instance) {
                    self.mastodon = Some(MastodonConfig {
                        instance,
                        access_token,
                    });
                }
            }
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn override_with(field: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *field = value;
    }
}

/// Resolve the configuration file path under the XDG config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Ok(expand_path(&path));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosspost").join("config.toml"))
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PLATFORM_VARS: [&str; 11] = [
        "BLUESKY_USERNAME",
        "BLUESKY_PASSWORD",
        "X_API_KEY",
        "X_API_SECRET",
        "X_ACCESS_TOKEN",
        "X_ACCESS_TOKEN_SECRET",
        "THREADS_ACCESS_TOKEN",
        "MISSKEY_API_TOKEN",
        "MISSKEY_INSTANCE_URL",
        "MASTODON_ACCESS_TOKEN",
        "MASTODON_INSTANCE_URL",
    ];

    fn clear_platform_vars() {
        for var in PLATFORM_VARS {
            std::env::remove_var(var);
        }
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.publish.fan_out, FanOut::Concurrent);
        assert_eq!(config.publish.request_timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(config.publish.platform_timeout().unwrap(), Duration::from_secs(120));
        assert!(config.publish.enforce_character_limits);
        assert!(config.bluesky.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let file = write_config(
            r#"
[publish]
fan_out = "sequential"
request_timeout = "10s"
platform_timeout = "45s"
enforce_character_limits = false

[bluesky]
identifier = "alice.bsky.social"
password = "app-password"

[x]
api_key = "k"
api_secret = "s"
access_token = "t"
access_token_secret = "ts"

[threads]
access_token = "threads-token"

[misskey]
instance = "misskey.io"
token = "mk"

[mastodon]
instance = "https://mastodon.social"
access_token = "md"
"#,
        );

        let config = Config::load_from_path(file.path()).unwrap();

        assert_eq!(config.publish.fan_out, FanOut::Sequential);
        assert_eq!(config.publish.request_timeout().unwrap(), Duration::from_secs(10));
        assert_eq!(config.publish.platform_timeout().unwrap(), Duration::from_secs(45));
        assert!(!config.publish.enforce_character_limits);

        let bluesky = config.bluesky.unwrap();
        assert_eq!(bluesky.identifier, "alice.bsky.social");
        assert_eq!(bluesky.service, "https://bsky.social");
        assert_eq!(config.x.unwrap().access_token_secret, "ts");
        assert_eq!(config.threads.unwrap().access_token, "threads-token");
        assert_eq!(config.misskey.unwrap().instance, "misskey.io");
        assert_eq!(config.mastodon.unwrap().access_token, "md");
    }

    #[test]
    fn test_partial_publish_section_uses_defaults() {
        let file = write_config("[publish]\nfan_out = \"sequential\"\n");
        let config = Config::load_from_path(file.path()).unwrap();

        assert_eq!(config.publish.fan_out, FanOut::Sequential);
        assert_eq!(config.publish.request_timeout, "30s");
        assert!(config.publish.enforce_character_limits);
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let file = write_config("[publish]\nrequest_timeout = \"soon\"\n");
        let error = Config::load_from_path(file.path()).unwrap_err();
        assert!(error.to_string().contains("publish.request_timeout"));

        let file = write_config("[publish]\nplatform_timeout = \"0s\"\n");
        let error = Config::load_from_path(file.path()).unwrap_err();
        assert!(error.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_unknown_fan_out_rejected() {
        let file = write_config("[publish]\nfan_out = \"sideways\"\n");
        assert!(Config::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_empty_instance_rejected() {
        let file = write_config("[mastodon]\ninstance = \"\"\naccess_token = \"x\"\n");
        let error = Config::load_from_path(file.path()).unwrap_err();
        assert!(error.to_string().contains("mastodon.instance"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = BlueskyConfig {
            identifier: "alice".to_string(),
            password: "hunter2".to_string(),
            service: default_bluesky_service(),
        };
        let debug = format!("{:?}", config);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));

        let x = XConfig {
            api_key: "key".to_string(),
            api_secret: "very-secret".to_string(),
            access_token: "tok".to_string(),
            access_token_secret: "tok-secret".to_string(),
        };
        let debug = format!("{:?}", x);
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("tok-secret"));
    }

    #[test]
    #[serial]
    fn test_env_creates_sections() {
        clear_platform_vars();
        std::env::set_var("BLUESKY_USERNAME", "env.bsky.social");
        std::env::set_var("BLUESKY_PASSWORD", "env-pw");
        std::env::set_var("MASTODON_ACCESS_TOKEN", "env-token");
        std::env::set_var("MASTODON_INSTANCE_URL", "fosstodon.org");
        std::env::set_var("MISSKEY_API_TOKEN", "only-token");

        let mut config = Config::default();
        config.apply_env_overrides();
        clear_platform_vars();

        assert_eq!(config.bluesky.unwrap().identifier, "env.bsky.social");
        assert_eq!(config.mastodon.unwrap().instance, "fosstodon.org");
        // Instance URL missing, so no misskey section
        assert!(config.misskey.is_none());
        assert!(config.x.is_none());
        assert!(config.threads.is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_values() {
        clear_platform_vars();
        let file = write_config(
            "[threads]\naccess_token = \"from-file\"\n\n[misskey]\ninstance = \"misskey.io\"\ntoken = \"file-token\"\n",
        );
        std::env::set_var("THREADS_ACCESS_TOKEN", "from-env");
        std::env::set_var("MISSKEY_INSTANCE_URL", "  ");

        let mut config = Config::load_from_path(file.path()).unwrap();
        config.apply_env_overrides();
        clear_platform_vars();

        assert_eq!(config.threads.unwrap().access_token, "from-env");
        // Blank values are ignored
        let misskey = config.misskey.unwrap();
        assert_eq!(misskey.instance, "misskey.io");
        assert_eq!(misskey.token, "file-token");
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_from_env() {
        std::env::set_var(CONFIG_ENV_VAR, "/tmp/crosspost-test/config.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(path, PathBuf::from("/tmp/crosspost-test/config.toml"));
    }

    #[test]
    #[serial]
    fn test_load_from_missing_file_uses_defaults() {
        clear_platform_vars();
        let dir = tempfile::TempDir::new().unwrap();

        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.publish.fan_out, FanOut::Concurrent);
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/crosspost.toml");
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}
