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

// Telemetry recorder for InfluxDB
//
// Records trading and logging events into a time-series store:
// - Subscribes to tick, trade, log and strategy log events on an event source
// - Buffers them in a bounded inbox, rejecting producers when it is full
// - Maps each event to a measurement/tags/fields record
// - Writes batches from a single background worker that halts on the first failure
// - Sinks: InfluxDB 1.x over HTTP, or line-protocol files on disk

pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod inbox;
pub mod mapper;
pub mod record;
pub mod recorder;
pub mod sink;
pub mod source;
pub mod worker;

// Re-export main types
pub use config::{
    load_config, load_config_with_env, ConnectionSettings, RecorderConfig, DEFAULT_SETTINGS_FILE,
};
pub use error::RecorderError;
pub use event::{Direction, Event, EventKind, Exchange, LogData, LogLevel, TickData, TradeData};
pub use feed::{publish_lines, replay_lines};
pub use inbox::{Inbox, InboxStats};
pub use mapper::RecordMapper;
pub use record::{FieldValue, Record};
pub use recorder::Recorder;
pub use sink::{FilesystemSink, InfluxDbSink, Sink, SinkFactory};
pub use source::{EventBus, EventHandler, EventSource, HandlerId, Subscription};
pub use worker::{WorkerState, WorkerStats};
