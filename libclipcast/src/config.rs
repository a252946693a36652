//! Configuration management for Clipcast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub clippings: ClippingsConfig,
    pub ledger: LedgerConfig,
    pub mastodon: Option<MastodonConfig>,
    pub post: PostConfig,
    pub pacing: PacingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClippingsConfig {
    /// Path to the e-reader's "My Clippings.txt" export
    pub path: String,
}

impl Default for ClippingsConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/clipcast/My Clippings.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// One clipping identity per line
    pub processed_file: String,
    /// One "{account_id} - {handle}" per line
    pub unfollowed_file: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            processed_file: "~/.local/share/clipcast/processed.db".to_string(),
            unfollowed_file: "~/.local/share/clipcast/previously_unfollowed.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    pub instance: String,
    pub token_file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostConfig {
    /// Appended on its own line after the attribution, e.g. "#books #quotes"
    pub hashtags: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause between follow/unfollow actions
    pub action_delay: String,
    /// Wait after the platform reports a rate limit
    pub rate_limit_wait: String,
    /// Wait after a transient platform error
    pub error_wait: String,
    /// Give up after this many attempts; unset retries forever
    pub max_attempts: Option<u32>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            action_delay: "60s".to_string(),
            rate_limit_wait: "15m".to_string(),
            error_wait: "20s".to_string(),
            max_attempts: None,
        }
    }
}

impl PacingConfig {
    pub fn action_delay(&self) -> Result<Duration> {
        parse_duration("pacing.action_delay", &self.action_delay)
    }

    /// Build the retry policy used around every platform call
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        Ok(RetryPolicy {
            rate_limit_wait: parse_duration("pacing.rate_limit_wait", &self.rate_limit_wait)?,
            error_wait: parse_duration("pacing.error_wait", &self.error_wait)?,
            max_attempts: self.max_attempts,
        })
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim()).map_err(|_| {
        ConfigError::InvalidDuration {
            field: field.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing config file is not an error: the defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        // Surface bad durations at load time rather than mid-run
        config.pacing.action_delay()?;
        config.pacing.retry_policy()?;

        Ok(config)
    }

    pub fn clippings_path(&self) -> PathBuf {
        expand_path(&self.clippings.path)
    }

    pub fn processed_path(&self) -> PathBuf {
        expand_path(&self.ledger.processed_file)
    }

    pub fn unfollowed_path(&self) -> PathBuf {
        expand_path(&self.ledger.unfollowed_file)
    }

    /// The Mastodon section, required by every command that talks to the platform
    pub fn require_mastodon(&self) -> Result<&MastodonConfig> {
        self.mastodon
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("mastodon".to_string()).into())
    }
}

/// Expand a leading `~` in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CLIPCAST_CONFIG") {
        return Ok(expand_path(&path));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("clipcast").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.mastodon.is_none());
        assert!(config.post.hashtags.is_none());
        assert_eq!(config.pacing.action_delay().unwrap(), Duration::from_secs(60));

        let policy = config.pacing.retry_policy().unwrap();
        assert_eq!(policy.rate_limit_wait, Duration::from_secs(15 * 60));
        assert_eq!(policy.error_wait, Duration::from_secs(20));
        assert_eq!(policy.max_attempts, None);
    }

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r##"
[clippings]
path = "/books/My Clippings.txt"

[ledger]
processed_file = "/books/processed.db"
unfollowed_file = "/books/unfollowed.txt"

[mastodon]
instance = "mastodon.social"
token_file = "/books/mastodon.token"

[post]
hashtags = "#books #quotes"

[pacing]
action_delay = "0s"
rate_limit_wait = "5m"
error_wait = "1s"
max_attempts = 4
"##,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.clippings_path(), PathBuf::from("/books/My Clippings.txt"));
        assert_eq!(config.processed_path(), PathBuf::from("/books/processed.db"));
        assert_eq!(config.unfollowed_path(), PathBuf::from("/books/unfollowed.txt"));
        assert_eq!(config.post.hashtags.as_deref(), Some("#books #quotes"));
        assert_eq!(config.require_mastodon().unwrap().instance, "mastodon.social");
        assert_eq!(config.pacing.action_delay().unwrap(), Duration::ZERO);

        let policy = config.pacing.retry_policy().unwrap();
        assert_eq!(policy.rate_limit_wait, Duration::from_secs(300));
        assert_eq!(policy.error_wait, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, Some(4));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[post]\nhashtags = \"#reading\"\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.pacing.error_wait, "20s");
        assert!(config.clippings.path.ends_with("My Clippings.txt"));
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[pacing]\naction_delay = \"whenever\"\n").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("pacing.action_delay"));
    }

    #[test]
    fn test_require_mastodon_missing() {
        let config = Config::default();
        let err = config.require_mastodon().unwrap_err();
        assert!(err.to_string().contains("Missing required field: mastodon"));
    }

    #[test]
    fn test_tilde_expansion() {
        let expanded = expand_path("~/clips.txt");
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    #[serial]
    fn test_config_path_from_env() {
        std::env::set_var("CLIPCAST_CONFIG", "/tmp/clipcast-test/config.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("CLIPCAST_CONFIG");

        assert_eq!(path, PathBuf::from("/tmp/clipcast-test/config.toml"));
    }

    #[test]
    #[serial]
    fn test_load_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        std::env::set_var("CLIPCAST_CONFIG", &missing);
        let config = Config::load();
        std::env::remove_var("CLIPCAST_CONFIG");

        assert!(config.unwrap().mastodon.is_none());
    }
}
