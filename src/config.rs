// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::error::{MediaError, Result};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Upstream NVR server.
    #[serde(default)]
    pub server: ServerConfig,
    /// Live polling connection admission.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Clip retrieval behaviour.
    #[serde(default)]
    pub clip: ClipConfig,
    /// HTTP API configuration (optional).
    #[serde(default)]
    pub api: ApiConfig,
}

/// HTTP API configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Whether to enable the HTTP API.
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    /// Port to listen on.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { enabled: default_api_enabled(), port: default_api_port() }
    }
}

fn default_api_enabled() -> bool { true }
fn default_api_port() -> u16 { 8080 }

/// Where and how to reach the NVR.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Base URL of the NVR, e.g. `http://10.1.1.252:5000`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional bearer token sent with every request.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Time allowed to establish a TCP/TLS connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Time allowed for a single request, body included. 0 disables it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String { "http://127.0.0.1:5000".into() }
fn default_user_agent() -> String { format!("nvr-media/{}", env!("CARGO_PKG_VERSION")) }
fn default_connect_timeout() -> u64 { 10 }
fn default_request_timeout() -> u64 { 120 }

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Limits for simultaneous polling connections to one origin.
///
/// Browsers allow six persistent connections per host; one is left free
/// for navigation, so five are handed out to camera tiles.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_max_active")]
    pub max_active: usize,
    /// A queue head above this priority may preempt an active consumer.
    #[serde(default = "default_rotation_floor")]
    pub rotation_floor: i32,
    /// A priority update above this value attempts a rotation.
    #[serde(default = "default_rotation_threshold")]
    pub rotation_threshold: i32,
    #[serde(default = "default_visible_priority")]
    pub visible_priority: i32,
    #[serde(default = "default_hidden_priority")]
    pub hidden_priority: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_active: default_max_active(),
            rotation_floor: default_rotation_floor(),
            rotation_threshold: default_rotation_threshold(),
            visible_priority: default_visible_priority(),
            hidden_priority: default_hidden_priority(),
        }
    }
}

fn default_max_active() -> usize { 5 }
fn default_rotation_floor() -> i32 { 3 }
fn default_rotation_threshold() -> i32 { 5 }
fn default_visible_priority() -> i32 { 3 }
fn default_hidden_priority() -> i32 { 1 }

/// Direct download retries and playlist fallback.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClipConfig {
    /// Direct download attempts before falling back to the playlist.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts that returned an empty body.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Segments fetched in parallel during reconstruction.
    #[serde(default = "default_segment_concurrency")]
    pub segment_concurrency: usize,
    /// Optional deadline for a whole clip request, retries and fallback included.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            segment_concurrency: default_segment_concurrency(),
            deadline_secs: None,
        }
    }
}

fn default_max_attempts() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 2000 }
fn default_segment_concurrency() -> usize { 4 }

impl ClipConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MediaError::Config(format!("Cannot read config file: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| MediaError::Config(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.server.base_url)
            .map_err(|e| MediaError::Config(format!("Invalid server.base_url: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(MediaError::Config("server.base_url must be http or https".into()));
        }
        if self.scheduler.max_active == 0 {
            return Err(MediaError::Config("max_active must be > 0".into()));
        }
        if self.scheduler.rotation_floor > self.scheduler.rotation_threshold {
            return Err(MediaError::Config(
                "scheduler.rotation_floor must not exceed rotation_threshold".into(),
            ));
        }
        if self.clip.max_attempts == 0 {
            return Err(MediaError::Config("max_attempts must be > 0".into()));
        }
        if self.clip.segment_concurrency == 0 {
            return Err(MediaError::Config("segment_concurrency must be > 0".into()));
        }
        if self.clip.deadline_secs == Some(0) {
            return Err(MediaError::Config("deadline_secs must be > 0 when set".into()));
        }
        Ok(())
    }
}
