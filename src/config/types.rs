// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for influx-recorder

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::event::EventKind;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecorderConfig {
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub recorder: RecorderSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sink selection plus the target store layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Backend type: "influxdb" or "filesystem"
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub retention_policy: RetentionPolicy,

    #[serde(default)]
    pub influxdb: InfluxDbConfig,

    #[serde(default)]
    pub filesystem: FilesystemConfig,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database: default_database(),
            retention_policy: RetentionPolicy::default(),
            influxdb: InfluxDbConfig::default(),
            filesystem: FilesystemConfig::default(),
        }
    }
}

/// Retention policy records are written under
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetentionPolicy {
    #[serde(default = "default_rp_name")]
    pub name: String,

    /// InfluxQL duration literal, e.g. "7d" or "INF"
    #[serde(default = "default_rp_duration")]
    pub duration: String,

    #[serde(default = "default_replication")]
    pub replication: u32,

    #[serde(default = "default_shard_duration")]
    pub shard_duration: String,

    /// Make this the database's default policy
    #[serde(default)]
    pub default: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            name: default_rp_name(),
            duration: default_rp_duration(),
            replication: default_replication(),
            shard_duration: default_shard_duration(),
            default: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InfluxDbConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub use_https: bool,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Gzip request bodies on /write
    #[serde(default)]
    pub gzip: bool,
}

impl Default for InfluxDbConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
            use_https: false,
            timeout_seconds: default_timeout(),
            gzip: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

/// Recorder pipeline settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderSettings {
    /// Inbox capacity; producers are rejected beyond this
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long the worker waits on an empty inbox before re-checking its run flag
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// How long a waiting producer (feed replay) may block on a full inbox
    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,

    /// Write events still queued when recording is stopped
    #[serde(default = "default_true")]
    pub drain_on_stop: bool,

    /// Event kinds to subscribe to and record
    #[serde(default = "default_events")]
    pub events: Vec<EventKind>,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            poll_timeout_ms: default_poll_timeout_ms(),
            max_batch_size: default_max_batch_size(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
            drain_on_stop: true,
            events: default_events(),
        }
    }
}

impl RecorderSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_backend() -> String { "influxdb".to_string() }
fn default_database() -> String { "vnpy_record".to_string() }
fn default_rp_name() -> String { "rt".to_string() }
fn default_rp_duration() -> String { "7d".to_string() }
fn default_replication() -> u32 { 1 }
fn default_shard_duration() -> String { "1d".to_string() }
fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 8086 }
fn default_timeout() -> u64 { 30 }
fn default_base_path() -> String { "/data/influx-recorder".to_string() }
fn default_queue_capacity() -> usize { 100 }
fn default_poll_timeout_ms() -> u64 { 1000 }
fn default_max_batch_size() -> usize { 50 }
fn default_enqueue_timeout_ms() -> u64 { 30_000 }
fn default_true() -> bool { true }
fn default_events() -> Vec<EventKind> { EventKind::ALL.to_vec() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
