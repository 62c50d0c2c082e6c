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

//! JSON-lines event feed.
//!
//! Each non-blank line is one [`Event`] as JSON, tagged by `type`:
//!
//! ```text
//! {"type":"tick","symbol":"AAPL","exchange":"NASDAQ","datetime":"2024-01-02T14:30:00Z","last_price":150.0,"bid_price_1":149.9,"ask_price_1":150.1,"volume":1000.0}
//! ```

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::event::Event;
use crate::recorder::Recorder;
use crate::source::EventBus;

/// Publish every event read from `reader` on `bus` until end of input.
///
/// Delivery goes through the bus handlers, so a full inbox drops events just
/// as it does for live producers. Malformed lines are logged and skipped.
/// Returns the number of events published.
pub async fn publish_lines<R>(reader: R, bus: &EventBus) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut published = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read event feed")? {
        line_no += 1;
        if let Some(event) = parse_line(line_no, &line) {
            bus.publish(event);
            published += 1;
        }
    }

    debug!("Event feed finished: {} published", published);
    Ok(published)
}

/// Replay every event read from `reader` into `recorder`, waiting up to `wait`
/// per event for inbox space instead of dropping it.
///
/// Stops with an error when the recorder no longer accepts events. Returns the
/// number of events recorded; kinds the recorder does not record are skipped.
pub async fn replay_lines<R>(reader: R, recorder: &Recorder, wait: Duration) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut recorded = 0usize;
    let mut skipped = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read event feed")? {
        line_no += 1;
        let Some(event) = parse_line(line_no, &line) else {
            continue;
        };

        let accepted = recorder
            .record(event, wait)
            .await
            .with_context(|| format!("Replay stopped at line {}", line_no))?;
        if accepted {
            recorded += 1;
        } else {
            skipped += 1;
        }
    }

    debug!(
        "Event replay finished: {} recorded, {} skipped",
        recorded, skipped
    );
    Ok(recorded)
}

fn parse_line(line_no: usize, line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<Event>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Skipping malformed event on line {}: {}", line_no, e);
            None
        }
    }
}
