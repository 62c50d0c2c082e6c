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

use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ConnectionSettings, RecorderConfig};
use crate::error::{RecorderError, Result};
use crate::event::Event;
use crate::inbox::{Inbox, InboxStats};
use crate::mapper::RecordMapper;
use crate::sink::{Sink, SinkFactory};
use crate::source::{EventHandler, EventSource, Subscription};
use crate::worker::{Worker, WorkerCounters, WorkerState, WorkerStats};

/// One start/stop cycle: the inbox, the subscription feeding it and the worker draining it
struct Session {
    id: String,
    inbox: Arc<Inbox>,
    subscription: Arc<Subscription>,
    running: Arc<AtomicBool>,
    counters: Arc<WorkerCounters>,
    handle: Option<JoinHandle<Result<(), Arc<RecorderError>>>>,
    fault: Option<Arc<RecorderError>>,
}

impl Session {
    /// A worker that published `Faulted` or `Stopped` is done, even if its
    /// task has not returned yet.
    fn is_active(&self, state: &WorkerState) -> bool {
        let worker_alive = self
            .handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false);
        worker_alive && !matches!(state, WorkerState::Faulted(_) | WorkerState::Stopped)
    }

    /// Unsubscribe, stop the worker and wait for it to release the sink
    async fn shutdown(&mut self) {
        self.subscription.release();
        self.running.store(false, Ordering::Release);
        self.inbox.close();

        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(cause)) => self.fault = Some(cause),
                Err(e) => error!("Recorder worker for session {} panicked: {}", self.id, e),
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Detached worker exits within one poll timeout
        self.subscription.release();
        self.running.store(false, Ordering::Release);
        self.inbox.close();
    }
}

/// Records events from an [`EventSource`] into a [`Sink`]
///
/// At most one worker runs at a time. Start and stop are serialized.
pub struct Recorder {
    config: RecorderConfig,
    source: Arc<dyn EventSource>,
    mapper: RecordMapper,
    session: Mutex<Option<Session>>,
    state: Arc<watch::Sender<WorkerState>>,
}

impl Recorder {
    pub fn new(config: RecorderConfig, source: Arc<dyn EventSource>) -> Self {
        let mapper = RecordMapper::new(config.recorder.events.iter().copied());
        let (state, _) = watch::channel(WorkerState::Idle);

        Self {
            config,
            source,
            mapper,
            session: Mutex::new(None),
            state: Arc::new(state),
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Connect to the configured sink with `connection` and start recording
    pub async fn start_recording(&self, connection: &ConnectionSettings) -> Result<()> {
        info!(
            "Starting recording to {} at {}:{}",
            self.config.sink.backend, connection.host, connection.port
        );
        let sink = SinkFactory::create(&self.config.sink, connection)?;
        self.start_with_sink(sink).await
    }

    /// Start recording into an already constructed sink
    pub async fn start_with_sink(&self, sink: Arc<dyn Sink>) -> Result<()> {
        let mut guard = self.session.lock().await;

        if let Some(previous) = guard.as_mut() {
            let state = self.state();
            if previous.is_active(&state) {
                return Err(RecorderError::AlreadyRunning);
            }
            previous.shutdown().await;
        }
        *guard = None;

        if let Err(e) = self.provision(sink.as_ref()).await {
            if let Err(close_err) = sink.close().await {
                warn!("Failed to close sink after failed start: {:#}", close_err);
            }
            return Err(e);
        }

        let session_id = Uuid::new_v4().to_string();
        let inbox = Arc::new(Inbox::new(self.config.recorder.queue_capacity));
        let running = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(WorkerCounters::default());

        let handler: EventHandler = {
            let inbox = inbox.clone();
            Arc::new(move |event| {
                // Overflow is counted by the inbox
                let _ = inbox.enqueue(event);
            })
        };
        let subscription = Arc::new(Subscription::register(
            self.source.clone(),
            self.mapper.kinds(),
            handler,
        ));

        self.state.send_replace(WorkerState::Running);

        let worker = Worker {
            session_id: session_id.clone(),
            inbox: inbox.clone(),
            sink,
            subscription: subscription.clone(),
            mapper: self.mapper.clone(),
            retention_policy: self.config.sink.retention_policy.name.clone(),
            poll_timeout: self.config.recorder.poll_timeout(),
            max_batch_size: self.config.recorder.max_batch_size.max(1),
            drain_on_stop: self.config.recorder.drain_on_stop,
            running: running.clone(),
            state: self.state.clone(),
            counters: counters.clone(),
        };
        let handle = worker.spawn();

        info!(
            "Recording session {} started, subscribed to {:?}",
            session_id,
            subscription.kinds()
        );

        *guard = Some(Session {
            id: session_id,
            inbox,
            subscription,
            running,
            counters,
            handle: Some(handle),
            fault: None,
        });

        Ok(())
    }

    /// Ping the sink and create the database and retention policy
    async fn provision(&self, sink: &dyn Sink) -> Result<()> {
        match sink.ping().await {
            Ok(true) => {}
            Ok(false) => {
                return Err(RecorderError::Connection(anyhow!(
                    "{} sink did not answer ping",
                    sink.sink_type()
                )))
            }
            Err(e) => return Err(RecorderError::Connection(e)),
        }

        let sink_config = &self.config.sink;
        sink.ensure_database(&sink_config.database)
            .await
            .map_err(RecorderError::Connection)?;
        sink.ensure_retention_policy(&sink_config.retention_policy)
            .await
            .map_err(RecorderError::Connection)?;

        Ok(())
    }

    /// Stop recording and wait until the worker has released the sink.
    ///
    /// Safe to call at any time; a no-op when nothing is running.
    pub async fn stop_recording(&self) {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            debug!("Stop requested while idle");
            return;
        };

        let stopped = matches!(*self.state.borrow(), WorkerState::Stopped);
        if stopped && session.handle.is_none() {
            debug!("Recording session {} already stopped", session.id);
            return;
        }

        self.state.send_replace(WorkerState::Stopping);
        session.shutdown().await;
        self.state.send_replace(WorkerState::Stopped);

        match &session.fault {
            Some(cause) => warn!("Recording session {} stopped after fault: {}", session.id, cause),
            None => info!("Recording session {} stopped", session.id),
        }
    }

    /// Application shutdown hook
    pub async fn close(&self) {
        self.stop_recording().await;
    }

    pub fn state(&self) -> WorkerState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state transition
    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        let state = self.state();
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.is_active(&state))
            .unwrap_or(false)
    }

    /// Hand an event straight to the running worker, waiting up to `wait` for
    /// inbox space.
    ///
    /// For producers that can afford to wait, such as a replayed feed. Returns
    /// `Ok(false)` for event kinds this recorder does not record, and
    /// `QueueOverflow` when nothing is recording or no space freed up in time.
    pub async fn record(&self, event: Event, wait: Duration) -> Result<bool> {
        let kind = event.kind();
        if !self.mapper.handles(kind) {
            return Ok(false);
        }

        let inbox = self
            .session
            .lock()
            .await
            .as_ref()
            .map(|session| session.inbox.clone());
        let Some(inbox) = inbox else {
            return Err(RecorderError::QueueOverflow { kind });
        };

        inbox
            .enqueue_timeout(event, wait)
            .await
            .map(|()| true)
            .map_err(|_| RecorderError::QueueOverflow { kind })
    }

    /// Fault that ended the current or last session, if any
    pub async fn last_fault(&self) -> Option<Arc<RecorderError>> {
        let current = self.state.borrow().fault().cloned();
        if current.is_some() {
            return current;
        }
        self.session
            .lock()
            .await
            .as_ref()
            .and_then(|session| session.fault.clone())
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.id.clone())
    }

    pub async fn inbox_stats(&self) -> Option<InboxStats> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.inbox.stats())
    }

    pub async fn worker_stats(&self) -> Option<WorkerStats> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.counters.snapshot())
    }
}
