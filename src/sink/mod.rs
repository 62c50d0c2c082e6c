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

// Sink module
//
// Provides a trait-based abstraction for the time-series store the
// recorder writes to (InfluxDB over HTTP, or line-protocol files on disk).
//
// This module focuses on WRITE-ONLY operations plus the provisioning
// (database, retention policy) needed before the first write.

pub mod backend;
pub mod factory;
pub mod filesystem;
pub mod influxdb;

pub use backend::Sink;
pub use factory::SinkFactory;
pub use filesystem::FilesystemSink;
pub use influxdb::InfluxDbSink;
