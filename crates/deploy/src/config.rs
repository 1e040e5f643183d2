//! Client configuration.
//!
//! Policy constants (concurrency, retry and polling bounds) live here so
//! they can be tuned from a TOML file instead of being hard-coded:
//!
//! ```toml
//! api_url = "https://api.stagehand.dev"
//! upload_concurrency = 8
//! request_timeout_ms = 60000
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 250
//!
//! [poll]
//! interval_ms = 1000
//! max_wait_ms = 900000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stagehand_protocol::constants::DEFAULT_API_URL;

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Pseudo-random value in `[-1.0, 1.0)` taken from the clock's sub-second
/// nanoseconds.
fn jitter_unit() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos) / 1_000_000_000.0 * 2.0 - 1.0
}

/// Settings shared by every deployment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the deployment API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// `User-Agent` sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of blob uploads in flight at once.
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,

    /// Upper bound for a single HTTP request, connect included.
    #[serde(
        rename = "request_timeout_ms",
        with = "duration_ms",
        default = "default_request_timeout"
    )]
    pub request_timeout: Duration,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub poll: PollConfig,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

fn default_user_agent() -> String {
    format!("stagehand/{}", env!("CARGO_PKG_VERSION"))
}

fn default_upload_concurrency() -> usize {
    8
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user_agent: default_user_agent(),
            upload_concurrency: default_upload_concurrency(),
            request_timeout: default_request_timeout(),
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parses configuration from TOML. Missing fields take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads configuration from `path`, or returns the defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// Retry policy for transient remote failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    /// Backoff cap.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff before retrying after failed attempt `attempt` (1-based):
    /// `initial_delay * backoff_factor^(attempt-1)`, capped at `max_delay`,
    /// then spread by ±25%.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let base = (self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent))
            .min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64((base * (1.0 + 0.25 * jitter_unit())).max(0.0))
    }

    /// Attempt budget, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Deployment status polling bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between two status requests.
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,
    /// Give up if no terminal state is reached within this window.
    #[serde(rename = "max_wait_ms", with = "duration_ms")]
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(15 * 60),
        }
    }
}

/// Durations as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.upload_concurrency, 8);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.poll.interval, Duration::from_secs(1));
        assert!(config.user_agent.starts_with("stagehand/"));
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = ClientConfig::from_toml_str(
            r#"
            api_url = "http://localhost:3000"
            upload_concurrency = 2

            [retry]
            max_attempts = 5

            [poll]
            interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.upload_concurrency, 2);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(config.poll.interval, Duration::from_millis(250));
        assert_eq!(config.poll.max_wait, PollConfig::default().max_wait);
    }

    #[test]
    fn request_timeout_from_toml() {
        let config = ClientConfig::from_toml_str("request_timeout_ms = 1500").unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.poll, PollConfig::default());
    }

    #[test]
    fn toml_roundtrip_uses_millis() {
        let text = toml::to_string(&ClientConfig::default()).unwrap();
        assert!(text.contains("interval_ms = 1000"));
        assert!(text.contains("initial_delay_ms = 250"));
        assert_eq!(
            ClientConfig::from_toml_str(&text).unwrap(),
            ClientConfig::default()
        );
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(matches!(
            ClientConfig::from_toml_str("upload_concurrency = \"many\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("stagehand.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stagehand.toml");
        std::fs::write(&path, "upload_concurrency = 1\n").unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap().upload_concurrency, 1);
    }

    #[test]
    fn retry_delay_backoff() {
        let config = RetryConfig::default();
        // Base delays: 250ms, 500ms, 1s, 2s, 4s, 5s (capped), 5s...
        let expected_base = [0.25, 0.5, 1.0, 2.0, 4.0, 5.0, 5.0];
        for (i, &base) in expected_base.iter().enumerate() {
            let secs = config.delay_for_attempt((i + 1) as u32).as_secs_f64();
            let lo = base * 0.74;
            let hi = base * 1.26;
            assert!(
                secs >= lo && secs <= hi,
                "attempt {}: {secs:.3}s not in [{lo:.3}, {hi:.3}]",
                i + 1
            );
        }
    }

    #[test]
    fn jitter_stays_in_unit_range() {
        for _ in 0..1000 {
            let j = jitter_unit();
            assert!((-1.0..1.0).contains(&j), "{j}");
        }
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(config.attempts(), 1);
    }
}
