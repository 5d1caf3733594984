//! Validated configuration for the limiter and the client.
//!
//! Invalid values are rejected at construction time so the runtime paths never see them:
//! a zero leak interval would make the dispatch timer spin, a zero capacity would reject
//! every admission.

use serde::Deserialize;
use std::time::Duration;

/// Default bucket size.
pub const DEFAULT_CAPACITY: usize = 10;
/// Default spacing between dispatches.
pub const DEFAULT_LEAK_INTERVAL: Duration = Duration::from_secs(1);
/// Default host template; `{application_id}` is substituted per session.
pub const DEFAULT_API_HOST: &str = "https://api-{application_id}.sendbird.com";
/// Page size used by the nickname query, and its upper bound.
pub const DEFAULT_NICKNAME_PAGE_LIMIT: u32 = 100;

/// Errors produced when validating configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Capacity must be > 0.
    #[error("capacity must be > 0 (got {provided})")]
    InvalidCapacity { provided: usize },
    /// Leak interval must be non-zero and finite.
    #[error("leak_interval must be non-zero and finite (got {0:?})")]
    InvalidLeakInterval(Duration),
    /// Host template must be non-empty.
    #[error("api_host must not be empty")]
    EmptyApiHost,
    /// Page limit must be within 1..=100.
    #[error("nickname_page_limit must be within 1..={max} (got {provided})")]
    InvalidPageLimit { provided: u32, max: u32 },
    /// The JSON document did not parse.
    #[error("invalid config document: {0}")]
    Parse(String),
}

/// Bucket size and pacing for the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    capacity: usize,
    leak_interval: Duration,
}

impl LimiterConfig {
    /// Create a config with validation.
    pub fn new(capacity: usize, leak_interval: Duration) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidCapacity { provided: capacity });
        }
        if leak_interval == Duration::ZERO || leak_interval == Duration::MAX {
            return Err(ConfigError::InvalidLeakInterval(leak_interval));
        }
        Ok(Self { capacity, leak_interval })
    }

    /// Maximum number of admitted-but-not-yet-dispatched units.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Minimum spacing between successive dispatches; also the refill period of one token.
    pub fn leak_interval(&self) -> Duration {
        self.leak_interval
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_CAPACITY, leak_interval: DEFAULT_LEAK_INTERVAL }
    }
}

/// Client-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    limiter: LimiterConfig,
    api_host: String,
    nickname_page_limit: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    capacity: Option<usize>,
    leak_interval_ms: Option<u64>,
    api_host: Option<String>,
    nickname_page_limit: Option<u32>,
}

impl ClientConfig {
    /// Create a config with validation.
    pub fn new(
        limiter: LimiterConfig,
        api_host: impl Into<String>,
        nickname_page_limit: u32,
    ) -> Result<Self, ConfigError> {
        let api_host = api_host.into();
        if api_host.trim().is_empty() {
            return Err(ConfigError::EmptyApiHost);
        }
        if nickname_page_limit == 0 || nickname_page_limit > DEFAULT_NICKNAME_PAGE_LIMIT {
            return Err(ConfigError::InvalidPageLimit {
                provided: nickname_page_limit,
                max: DEFAULT_NICKNAME_PAGE_LIMIT,
            });
        }
        Ok(Self { limiter, api_host, nickname_page_limit })
    }

    /// Parse a JSON document. Every key is optional; missing keys take their defaults.
    ///
    /// ```rust
    /// use roster::ClientConfig;
    /// use std::time::Duration;
    ///
    /// let cfg = ClientConfig::from_json(r#"{"capacity": 5, "leak_interval_ms": 250}"#).unwrap();
    /// assert_eq!(cfg.limiter().capacity(), 5);
    /// assert_eq!(cfg.limiter().leak_interval(), Duration::from_millis(250));
    /// ```
    pub fn from_json(doc: &str) -> Result<Self, ConfigError> {
        let raw: ConfigDocument =
            serde_json::from_str(doc).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let limiter = LimiterConfig::new(
            raw.capacity.unwrap_or(DEFAULT_CAPACITY),
            raw.leak_interval_ms.map(Duration::from_millis).unwrap_or(DEFAULT_LEAK_INTERVAL),
        )?;
        Self::new(
            limiter,
            raw.api_host.unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
            raw.nickname_page_limit.unwrap_or(DEFAULT_NICKNAME_PAGE_LIMIT),
        )
    }

    /// Replace the limiter settings.
    pub fn with_limiter(mut self, limiter: LimiterConfig) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn limiter(&self) -> LimiterConfig {
        self.limiter
    }

    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    pub fn nickname_page_limit(&self) -> u32 {
        self.nickname_page_limit
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            limiter: LimiterConfig::default(),
            api_host: DEFAULT_API_HOST.to_string(),
            nickname_page_limit: DEFAULT_NICKNAME_PAGE_LIMIT,
        }
    }
}
