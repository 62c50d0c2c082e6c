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

// Sink trait for write-only recording

use anyhow::Result;
use async_trait::async_trait;

use crate::config::RetentionPolicy;
use crate::record::Record;

/// Time-series store the recorder writes to
///
/// The worker owns its sink exclusively for the whole session and calls
/// `write` from a single task, so implementations never see concurrent writes
/// from the same recorder.
///
/// Query operations are NOT part of this trait - users should query
/// the store directly with its own tools (influx CLI, Grafana, etc.)
#[async_trait]
pub trait Sink: Send + Sync {
    /// Check the store is reachable
    ///
    /// `Ok(false)` means the store answered but is not healthy.
    async fn ping(&self) -> Result<bool>;

    /// Create the target database if it does not exist
    async fn ensure_database(&self, name: &str) -> Result<()>;

    /// Create or update the retention policy records are written under
    async fn ensure_retention_policy(&self, policy: &RetentionPolicy) -> Result<()>;

    /// Write a batch of records, in order, under `retention_policy`
    async fn write(&self, records: &[Record], retention_policy: &str) -> Result<()>;

    /// Release connections held by the sink
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Get sink type identifier
    fn sink_type(&self) -> &str;
}
