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

// Persisted connection settings (flat JSON file)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use super::types::InfluxDbConfig;
use crate::error::RecorderError;

pub const DEFAULT_SETTINGS_FILE: &str = "influx_recorder_setting.json";

/// Parameters entered by the operator to start recording
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl ConnectionSettings {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
        }
    }

    /// Load settings from `path`, falling back to `defaults` for a missing file
    /// and for keys absent from the file.
    pub fn load_or<P: AsRef<Path>>(path: P, defaults: ConnectionSettings) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(defaults);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let mut value: serde_json::Value =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;

        // Overlay file keys on the defaults
        let mut merged = serde_json::to_value(&defaults)?;
        if let (Some(base), Some(overlay)) = (merged.as_object_mut(), value.as_object_mut()) {
            for (key, v) in std::mem::take(overlay) {
                base.insert(key, v);
            }
        }

        serde_json::from_value(merged).context("Invalid settings file")
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_or(path, Self::default())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings file {}", path.display()))?;
        info!("Saved connection settings to {}", path.display());
        Ok(())
    }

    /// Reject parameters that cannot possibly address a server
    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.host.trim().is_empty() {
            return Err(RecorderError::Configuration("host cannot be empty".to_string()));
        }
        if self.host.contains(char::is_whitespace) || self.host.contains('/') {
            return Err(RecorderError::Configuration(format!(
                "invalid host '{}'",
                self.host
            )));
        }
        if self.port == 0 {
            return Err(RecorderError::Configuration("port must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
        }
    }
}

impl From<&InfluxDbConfig> for ConnectionSettings {
    fn from(config: &InfluxDbConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.password.clone(),
        }
    }
}

// Keep passwords out of logs
impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .finish()
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8086
}
