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

//! Normalized storage records and their InfluxDB line-protocol encoding.
//!
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2="text" epoch_seconds
//! ```

use anyhow::{bail, Result};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical second-resolution timestamp format
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Field value stored in a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    String(String),
}

impl FieldValue {
    /// Encode as a line-protocol field value.
    ///
    /// Floats are written bare, strings are double-quoted with `"` and `\` escaped.
    /// NaN and infinities have no line-protocol representation.
    pub fn to_line_protocol(&self) -> Result<String> {
        match self {
            FieldValue::Float(v) if !v.is_finite() => {
                bail!("non-finite float {} cannot be encoded", v)
            }
            FieldValue::Float(v) => Ok(format!("{}", v)),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                Ok(format!("\"{}\"", escaped))
            }
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

/// A single point ready for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// Build a record, truncating the timestamp to whole seconds.
    pub fn new(
        measurement: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: BTreeMap<String, FieldValue>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            tags,
            fields,
            timestamp: truncate_to_second(timestamp),
        }
    }

    /// Encode as one line of InfluxDB line protocol with second precision.
    pub fn to_line_protocol(&self) -> Result<String> {
        if self.fields.is_empty() {
            bail!("record for '{}' has no fields", self.measurement);
        }

        let mut line = escape_measurement(&self.measurement);

        for (key, value) in &self.tags {
            // Empty tag values are not allowed by the protocol
            if value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_line_protocol()?);
        }

        line.push(' ');
        line.push_str(&self.timestamp.timestamp().to_string());

        Ok(line)
    }
}

/// Encode a batch as a newline-separated line-protocol body
pub fn encode_batch(records: &[Record]) -> Result<String> {
    let mut body = String::new();
    for record in records {
        body.push_str(&record.to_line_protocol()?);
        body.push('\n');
    }
    Ok(body)
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS`
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn truncate_to_second(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Tag keys, tag values and field keys share the same escaping rules
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}
