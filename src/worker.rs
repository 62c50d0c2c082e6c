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

//! Single consumer draining the inbox into the sink.
//!
//! The worker is fail-stop: the first rejected write moves it to
//! [`WorkerState::Faulted`], closes the inbox and releases the subscription and
//! the sink. Nothing is retried.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{RecorderError, Result};
use crate::event::Event;
use crate::inbox::Inbox;
use crate::mapper::RecordMapper;
use crate::record::Record;
use crate::sink::Sink;
use crate::source::Subscription;

/// Lifecycle of the recording worker
#[derive(Debug, Clone, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    Running,
    Stopping,
    Stopped,
    /// Terminal after a write failure; carries the cause
    Faulted(Arc<RecorderError>),
}

impl WorkerState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
            WorkerState::Faulted(_) => "faulted",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, WorkerState::Running)
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, WorkerState::Faulted(_))
    }

    pub fn fault(&self) -> Option<&Arc<RecorderError>> {
        match self {
            WorkerState::Faulted(cause) => Some(cause),
            _ => None,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Faulted(cause) => write!(f, "faulted: {}", cause),
            other => f.write_str(other.name()),
        }
    }
}

/// Worker counters, shared with the controller
#[derive(Debug, Default)]
pub(crate) struct WorkerCounters {
    records_written: AtomicU64,
    batches_written: AtomicU64,
    unmapped: AtomicU64,
    discarded: AtomicU64,
}

impl WorkerCounters {
    pub(crate) fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            records_written: self.records_written.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            unmapped: self.unmapped.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of worker counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerStats {
    pub records_written: u64,
    pub batches_written: u64,
    /// Events skipped because no mapping is enabled for their kind
    pub unmapped: u64,
    /// Events or records dropped by a fault or a non-draining stop
    pub discarded: u64,
}

/// Everything one recording session's worker owns
pub(crate) struct Worker {
    pub session_id: String,
    pub inbox: Arc<Inbox>,
    pub sink: Arc<dyn Sink>,
    pub subscription: Arc<Subscription>,
    pub mapper: RecordMapper,
    pub retention_policy: String,
    pub poll_timeout: Duration,
    pub max_batch_size: usize,
    pub drain_on_stop: bool,
    pub running: Arc<AtomicBool>,
    pub state: Arc<watch::Sender<WorkerState>>,
    pub counters: Arc<WorkerCounters>,
}

impl Worker {
    pub fn spawn(self) -> JoinHandle<Result<(), Arc<RecorderError>>> {
        let span = info_span!("recorder", session = %self.session_id);
        tokio::spawn(self.run().instrument(span))
    }

    async fn run(self) -> Result<(), Arc<RecorderError>> {
        info!(
            "Worker started (sink: {}, batch size {}, poll timeout {:?})",
            self.sink.sink_type(),
            self.max_batch_size,
            self.poll_timeout
        );

        let outcome = self.process().await;

        // Release on every exit path: stop accepting, unsubscribe, drop the connection
        self.inbox.close();
        self.subscription.release();
        self.inbox.quiesce().await;
        let left_behind = self.inbox.len() as u64;
        if left_behind > 0 {
            self.counters.discarded.fetch_add(left_behind, Ordering::Relaxed);
        }
        if let Err(e) = self.sink.close().await {
            warn!("Failed to close {} sink: {:#}", self.sink.sink_type(), e);
        }

        let stats = self.counters.snapshot();
        match outcome {
            Ok(()) => {
                info!(
                    "Worker stopped: {} records in {} batches, {} unmapped, {} discarded",
                    stats.records_written, stats.batches_written, stats.unmapped, stats.discarded
                );
                self.state.send_replace(WorkerState::Stopped);
                Ok(())
            }
            Err(e) => {
                let cause = Arc::new(e);
                error!(
                    "Recording halted: {} ({} events discarded)",
                    cause, stats.discarded
                );
                self.state.send_replace(WorkerState::Faulted(cause.clone()));
                Err(cause)
            }
        }
    }

    async fn process(&self) -> Result<()> {
        let mut batch = Vec::with_capacity(self.max_batch_size);

        while self.running.load(Ordering::Acquire) {
            let Some(event) = self.inbox.dequeue(self.poll_timeout).await else {
                if self.inbox.is_closed() {
                    break;
                }
                continue;
            };

            self.collect(event, &mut batch);
            for _ in 1..self.max_batch_size {
                match self.inbox.try_dequeue() {
                    Some(event) => self.collect(event, &mut batch),
                    None => break,
                }
            }

            self.flush(&mut batch).await?;
        }

        if self.drain_on_stop {
            self.inbox.close();
            self.inbox.quiesce().await;
            let mut drained = 0usize;
            while let Some(event) = self.inbox.try_dequeue() {
                drained += 1;
                self.collect(event, &mut batch);
                if batch.len() >= self.max_batch_size {
                    self.flush(&mut batch).await?;
                }
            }
            self.flush(&mut batch).await?;
            if drained > 0 {
                debug!("Drained {} queued events on stop", drained);
            }
        }

        Ok(())
    }

    fn collect(&self, event: Event, batch: &mut Vec<Record>) {
        match self.mapper.map(&event) {
            Ok(record) => batch.push(record),
            Err(e) => {
                let skipped = self.counters.unmapped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Skipping event ({} skipped so far): {}", skipped, e);
            }
        }
    }

    async fn flush(&self, batch: &mut Vec<Record>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        match self.sink.write(batch, &self.retention_policy).await {
            Ok(()) => {
                let count = batch.len() as u64;
                self.counters.records_written.fetch_add(count, Ordering::Relaxed);
                self.counters.batches_written.fetch_add(1, Ordering::Relaxed);
                debug!("Wrote batch of {} records", count);
                batch.clear();
                Ok(())
            }
            Err(source) => {
                self.counters
                    .discarded
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                batch.clear();
                Err(RecorderError::Write {
                    records_written: self.counters.records_written.load(Ordering::Relaxed),
                    source,
                })
            }
        }
    }
}
