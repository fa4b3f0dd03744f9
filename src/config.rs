// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Configuration types and parsing for the logging engine.
//!
//! JSON5 configuration format supporting comments and trailing commas.
//! Only `level` is re-read by the hot-reload watcher; every other knob
//! takes effect at `init` (rotation thresholds are re-read by the file
//! sink on each check because it keeps its own copy of this struct).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Level;

/// What `push` does when the record queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FullPolicy {
    /// Backpressure the producer: spin, then sleep, up to `block_timeout_us`.
    Block,
    /// Fail fast; the caller counts the drop.
    Drop,
}

/// File rotation policy for the file sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotatePolicy {
    None,
    Daily,
    Size,
    SizeAndTime,
}

/// Startup configuration (JSON5 file format)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Minimum level to record. Hot-reloadable.
    #[serde(default = "defaults::level")]
    pub level: Level,

    /// strftime-style pattern for the rendered timestamp. Must be non-empty.
    #[serde(default = "defaults::time_format")]
    pub time_format: String,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub buffer_pool: BufferPoolConfig,

    #[serde(default)]
    pub console: ConsoleConfig,

    #[serde(default)]
    pub file: FileConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// Hot-reload polling cadence in milliseconds. 0 falls back to 1000.
    #[serde(default = "defaults::reload_interval_ms")]
    pub reload_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    /// Soft cap in records; 0 means unbounded (no admission check).
    #[serde(default = "defaults::queue_capacity")]
    pub capacity: usize,

    #[serde(default = "defaults::full_policy")]
    pub full_policy: FullPolicy,

    /// Upper bound on BLOCK waiting, in microseconds.
    #[serde(default = "defaults::block_timeout_us")]
    pub block_timeout_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Max records per queue pop.
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferPoolConfig {
    /// Initial buffer count.
    #[serde(default = "defaults::pool_size")]
    pub size: usize,

    /// Per-thread cache size.
    #[serde(default = "defaults::tls_cache")]
    pub tls_cache: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Base file path; rotated files are derived from its stem.
    #[serde(default = "defaults::file_path")]
    pub path: String,

    /// User-space write buffer size in KiB.
    #[serde(default = "defaults::file_buffer_kb")]
    pub buffer_kb: usize,

    #[serde(default = "defaults::rotate_policy")]
    pub rotate_policy: RotatePolicy,

    /// Threshold for SIZE rotation, in MiB.
    #[serde(default = "defaults::max_size_mb")]
    pub max_size_mb: u64,

    /// Retention count: at most this many files matching the stem prefix.
    #[serde(default = "defaults::max_files")]
    pub max_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Server URL, e.g. `http://127.0.0.1:8080`.
    #[serde(default)]
    pub url: String,

    #[serde(default = "defaults::http_endpoint")]
    pub endpoint: String,

    #[serde(default = "defaults::http_content_type")]
    pub content_type: String,

    #[serde(default = "defaults::http_timeout_sec")]
    pub timeout_sec: u64,

    #[serde(default = "defaults::http_max_retries")]
    pub max_retries: u32,

    /// Records buffered before a POST is attempted.
    #[serde(default = "defaults::http_batch_size")]
    pub batch_size: usize,
}

mod defaults {
    use super::{FullPolicy, RotatePolicy};
    use crate::Level;

    pub fn level() -> Level {
        Level::Info
    }
    pub fn time_format() -> String {
        "%Y-%m-%d %H:%M:%S".to_string()
    }
    pub fn reload_interval_ms() -> u64 {
        1000
    }
    pub fn queue_capacity() -> usize {
        65536
    }
    pub fn full_policy() -> FullPolicy {
        FullPolicy::Block
    }
    pub fn block_timeout_us() -> u64 {
        u64::MAX
    }
    pub fn batch_size() -> usize {
        2048
    }
    pub fn pool_size() -> usize {
        65536
    }
    pub fn tls_cache() -> usize {
        64
    }
    pub fn file_path() -> String {
        "logfile.log".to_string()
    }
    pub fn file_buffer_kb() -> usize {
        64
    }
    pub fn rotate_policy() -> RotatePolicy {
        RotatePolicy::None
    }
    pub fn max_size_mb() -> u64 {
        1024
    }
    pub fn max_files() -> usize {
        7
    }
    pub fn http_endpoint() -> String {
        "/logs".to_string()
    }
    pub fn http_content_type() -> String {
        "application/json".to_string()
    }
    pub fn http_timeout_sec() -> u64 {
        30
    }
    pub fn http_max_retries() -> u32 {
        3
    }
    pub fn http_batch_size() -> usize {
        100
    }
}

impl Default for Config {
    fn default() -> Self {
        // json5 "{}" routes every field through its serde default
        Self::parse("{}").expect("empty config must parse")
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            capacity: defaults::queue_capacity(),
            full_policy: defaults::full_policy(),
            block_timeout_us: defaults::block_timeout_us(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            batch_size: defaults::batch_size(),
        }
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        BufferPoolConfig {
            size: defaults::pool_size(),
            tls_cache: defaults::tls_cache(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig { enabled: false }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            enabled: false,
            path: defaults::file_path(),
            buffer_kb: defaults::file_buffer_kb(),
            rotate_policy: defaults::rotate_policy(),
            max_size_mb: defaults::max_size_mb(),
            max_files: defaults::max_files(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            enabled: false,
            url: String::new(),
            endpoint: defaults::http_endpoint(),
            content_type: defaults::http_content_type(),
            timeout_sec: defaults::http_timeout_sec(),
            max_retries: defaults::http_max_retries(),
            batch_size: defaults::http_batch_size(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_format.is_empty() {
            return Err(ConfigError::EmptyTimeFormat);
        }
        if self.worker.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.file.enabled && self.file.path.is_empty() {
            return Err(ConfigError::EmptyFilePath);
        }
        if self.http.enabled {
            crate::sink::parse_http_url(&self.http.url).map_err(|reason| {
                ConfigError::InvalidHttpUrl {
                    url: self.http.url.clone(),
                    reason,
                }
            })?;
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    Io(std::path::PathBuf, String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("time_format cannot be empty")]
    EmptyTimeFormat,

    #[error("worker.batch_size cannot be zero")]
    ZeroBatchSize,

    #[error("file sink enabled with empty path")]
    EmptyFilePath,

    #[error("invalid http url '{url}': {reason}")]
    InvalidHttpUrl { url: String, reason: String },
}
