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

// Sink factory for creating sinks from configuration

use super::backend::Sink;
use super::filesystem::FilesystemSink;
use super::influxdb::InfluxDbSink;
use crate::config::{ConnectionSettings, SinkConfig};
use crate::error::{RecorderError, Result};
use std::sync::Arc;

pub struct SinkFactory;

impl SinkFactory {
    /// Create the configured sink for one recording session
    pub fn create(config: &SinkConfig, connection: &ConnectionSettings) -> Result<Arc<dyn Sink>> {
        match config.backend.as_str() {
            "influxdb" => {
                connection.validate()?;
                let sink = InfluxDbSink::new(&config.influxdb, connection, &config.database)
                    .map_err(|e| RecorderError::Configuration(format!("{:#}", e)))?;
                Ok(Arc::new(sink))
            }

            "filesystem" => {
                let sink = FilesystemSink::new(&config.filesystem, &config.database)
                    .map_err(|e| RecorderError::Configuration(format!("{:#}", e)))?;
                Ok(Arc::new(sink))
            }

            unknown => Err(RecorderError::Configuration(format!(
                "Unknown sink backend: '{}'. Supported: influxdb, filesystem",
                unknown
            ))),
        }
    }
}
