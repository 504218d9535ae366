use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Upstream servers every admitted message is relayed to, in order
    /// At least one upstream is required
    #[serde(rename = "upstream")]
    pub upstreams: Vec<Upstream>,
    /// Shared quota settings
    #[serde(default)]
    pub limiter: LimiterConfig,
    /// Per-connection relay settings
    #[serde(default)]
    pub session: SessionConfig,
    /// Timeout configuration
    /// Every timeout is disabled unless set
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Config with the given upstreams and every other section at its default.
    pub fn with_upstreams(upstreams: Vec<Upstream>) -> Self {
        Self {
            upstreams,
            limiter: LimiterConfig::default(),
            session: SessionConfig::default(),
            timeout: TimeoutConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Upstream server coordinates
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// Hostname or IP address
    /// Example: "localhost" or "192.168.1.10"
    pub host: String,
    pub port: u16,
}

impl Upstream {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Token bucket configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LimiterConfig {
    /// Maximum number of permits held by the bucket
    /// Default: 10
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Seconds between full refills of the bucket
    /// Default: 60
    #[serde(default = "default_refill_secs")]
    pub refill_secs: u64,
}

impl LimiterConfig {
    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(self.refill_secs)
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self { capacity: default_capacity(), refill_secs: default_refill_secs() }
    }
}

/// Session configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Size of a single read from the client or from an upstream.
    /// One read is treated as one message; nothing is reassembled.
    /// Default: 2046, at most 1 MiB
    #[serde(default = "default_read_chunk_bytes")]
    pub read_chunk_bytes: usize,
    /// Maximum number of concurrent client sessions
    /// Default: unlimited
    #[serde(default)]
    pub max_sessions: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { read_chunk_bytes: default_read_chunk_bytes(), max_sessions: None }
    }
}

/// Timeout configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TimeoutConfig {
    /// Upstream connect timeout in milliseconds
    /// Default: none (waits forever)
    #[serde(default)]
    pub connect_ms: Option<u64>,
    /// Timeout for the upstream reply in milliseconds
    /// Default: none (waits forever)
    #[serde(default)]
    pub upstream_read_ms: Option<u64>,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Option<Duration> {
        self.connect_ms.map(Duration::from_millis)
    }

    pub fn upstream_read(&self) -> Option<Duration> {
        self.upstream_read_ms.map(Duration::from_millis)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    /// RUST_LOG takes precedence when set
    /// Default: "debug"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module target in log lines
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

fn default_capacity() -> usize {
    10
}

fn default_refill_secs() -> u64 {
    60
}

fn default_read_chunk_bytes() -> usize {
    2046
}

fn default_log_level() -> String {
    "debug".to_string()
}
