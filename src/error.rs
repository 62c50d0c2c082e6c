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

use crate::event::EventKind;

/// Errors surfaced by the recording pipeline
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// Malformed connection parameters or an event kind without a mapping
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Sink unreachable or refused provisioning at start
    #[error("connection error: {0:#}")]
    Connection(#[source] anyhow::Error),

    /// Sink rejected a batch while recording
    #[error("write failure after {records_written} records: {source:#}")]
    Write {
        records_written: u64,
        #[source]
        source: anyhow::Error,
    },

    /// Inbox at capacity or closed
    #[error("inbox full or closed, {kind} event rejected")]
    QueueOverflow { kind: EventKind },

    #[error("recorder is already running")]
    AlreadyRunning,
}

impl RecorderError {
    pub fn unmapped(kind: EventKind) -> Self {
        RecorderError::Configuration(format!("no record mapping enabled for '{}' events", kind))
    }
}

pub type Result<T, E = RecorderError> = std::result::Result<T, E>;
