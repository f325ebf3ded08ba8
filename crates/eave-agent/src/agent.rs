// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background batching agent.
//!
//! The agent owns the event queue and a single worker task. Producers enqueue through
//! [`Agent::put`] or a cloned [`EventSink`]; the worker accumulates a buffer and hands it to the
//! [`DataHandler`] when it reaches `max_batch_size`, when `flush_interval` has elapsed since the
//! last flush, or when the queue is closed by [`Agent::stop`]. Failed flushes keep the buffer and
//! count toward a circuit breaker which terminates the worker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{AgentConfig, FailurePolicy};
use crate::error::AgentError;
use crate::event::EventPayload;
use crate::handler::DataHandler;
use crate::queue::{Dequeued, EventQueue, PutError, QueueConsumer};

/// Overflow warnings are emitted for the first drop and then once per this many drops.
const DROP_LOG_EVERY: u64 = 100;

/// Lifecycle state of an [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// No worker is consuming the queue. Events are still accepted and wait for `start`.
    Stopped,
    /// A worker is consuming the queue.
    Running,
}

#[derive(Debug)]
struct State {
    status: AgentStatus,
    /// Incremented on every start; tags the worker and the sentinel that stops it.
    generation: u64,
    worker: Option<JoinHandle<()>>,
}

type SharedState = Arc<Mutex<State>>;

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy)]
struct WorkerSettings {
    flush_interval: Duration,
    max_batch_size: usize,
    max_failures: u32,
    failure_policy: FailurePolicy,
}

impl From<&AgentConfig> for WorkerSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            flush_interval: config.flush_interval,
            max_batch_size: config.max_batch_size.max(1),
            max_failures: config.max_failures.max(1),
            failure_policy: config.failure_policy,
        }
    }
}

/// Producer-only handle to an agent's queue.
///
/// Cheap to clone. Instrumentation holds one of these instead of the agent itself.
#[derive(Debug, Clone)]
pub struct EventSink {
    queue: EventQueue,
}

impl EventSink {
    /// Enqueues `payload`. Never blocks and never fails; overflow is logged and the event dropped.
    pub fn put(&self, payload: EventPayload) {
        match self.queue.put(payload) {
            Ok(()) => {}
            Err(PutError::Full(capacity)) => {
                let dropped = self.queue.dropped();
                if dropped == 1 || dropped % DROP_LOG_EVERY == 0 {
                    warn!(
                        "Event queue is full (capacity {capacity}), dropping event. {dropped} events dropped so far"
                    );
                }
            }
            Err(PutError::Closed) => {
                error!("Event queue is closed, dropping event");
            }
        }
    }

    /// Number of events waiting to be consumed.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

/// Handle to the batching agent. Clones share the same queue and worker.
///
/// Dropping the last handle while running closes the queue, so the worker flushes what it has
/// and exits. Nothing waits for that flush; call [`Agent::shutdown`] to wait for it.
#[derive(Clone)]
pub struct Agent {
    queue: EventQueue,
    handler: Arc<dyn DataHandler>,
    settings: WorkerSettings,
    shutdown_timeout: Duration,
    state: SharedState,
    _close_on_drop: Arc<CloseOnLastDrop>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("queue", &self.queue)
            .field("settings", &self.settings)
            .field("status", &self.status())
            .finish()
    }
}

impl Agent {
    pub fn new(config: &AgentConfig, handler: Arc<dyn DataHandler>) -> Result<Self, AgentError> {
        config.validate()?;
        let queue = EventQueue::with_capacity(config.queue_maxsize);
        let state = Arc::new(Mutex::new(State {
            status: AgentStatus::Stopped,
            generation: 0,
            worker: None,
        }));
        Ok(Self {
            _close_on_drop: Arc::new(CloseOnLastDrop {
                queue: queue.clone(),
                state: Arc::clone(&state),
            }),
            queue,
            handler,
            settings: WorkerSettings::from(config),
            shutdown_timeout: config.shutdown_timeout,
            state,
        })
    }

    pub fn sink(&self) -> EventSink {
        EventSink {
            queue: self.queue.clone(),
        }
    }

    /// Enqueues `payload`. Callable from any thread, whether or not the agent is running.
    pub fn put(&self, payload: EventPayload) {
        self.sink().put(payload);
    }

    pub fn status(&self) -> AgentStatus {
        lock(&self.state).status
    }

    pub fn is_running(&self) -> bool {
        self.status() == AgentStatus::Running
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Spawns the worker on the current tokio runtime. No-op while already running.
    pub fn start(&self) -> Result<(), AgentError> {
        let runtime = Handle::try_current().map_err(|_| {
            error!("Cannot start the Eave agent outside of a tokio runtime");
            AgentError::NoRuntime
        })?;

        let mut state = lock(&self.state);
        if state.status == AgentStatus::Running {
            debug!("Eave agent already running");
            return Ok(());
        }

        state.generation += 1;
        let worker = Worker {
            queue: self.queue.clone(),
            handler: Arc::clone(&self.handler),
            settings: self.settings,
            guard: StopOnExit {
                state: Arc::clone(&self.state),
                generation: state.generation,
            },
        };
        state.worker = Some(runtime.spawn(worker.run()));
        state.status = AgentStatus::Running;
        info!("Eave agent started");
        Ok(())
    }

    /// Closes the queue and waits up to `timeout` for the worker to flush and exit.
    /// No-op while stopped.
    pub async fn stop(&self, timeout: Duration) {
        let (generation, worker) = {
            let mut state = lock(&self.state);
            match state.worker.take() {
                Some(worker) if state.status == AgentStatus::Running => (state.generation, worker),
                _ => {
                    debug!("Eave agent not running");
                    return;
                }
            }
        };

        info!("Waiting for the Eave agent to flush (timeout={:?})", timeout);
        if let Err(e) = self.queue.close(generation) {
            error!("Failed to signal the Eave agent worker: {e}");
        }

        match tokio::time::timeout(timeout, worker).await {
            Ok(Ok(())) => info!("Eave agent stopped"),
            Ok(Err(e)) => error!("Eave agent worker ended abnormally: {e}"),
            Err(_) => warn!(
                "Eave agent did not finish flushing within {:?}, continuing shutdown",
                timeout
            ),
        }

        let mut state = lock(&self.state);
        if state.generation == generation {
            state.status = AgentStatus::Stopped;
        }
    }

    /// [`Agent::stop`] with the configured shutdown timeout.
    pub async fn shutdown(&self) {
        self.stop(self.shutdown_timeout).await;
    }
}

/// Marks the agent stopped when the worker of the current generation exits for any reason,
/// including a panic inside the handler.
struct StopOnExit {
    state: SharedState,
    generation: u64,
}

impl Drop for StopOnExit {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state.generation == self.generation {
            state.status = AgentStatus::Stopped;
            state.worker = None;
        }
    }
}

/// Shared by every clone of an [`Agent`]. Signals the running worker when the last one goes away.
struct CloseOnLastDrop {
    queue: EventQueue,
    state: SharedState,
}

impl Drop for CloseOnLastDrop {
    fn drop(&mut self) {
        let state = lock(&self.state);
        if state.status == AgentStatus::Running {
            debug!("Last Eave agent handle dropped, closing the queue");
            if let Err(e) = self.queue.close(state.generation) {
                error!("Failed to signal the Eave agent worker: {e}");
            }
        }
    }
}

struct Worker {
    queue: EventQueue,
    handler: Arc<dyn DataHandler>,
    settings: WorkerSettings,
    guard: StopOnExit,
}

impl Worker {
    async fn run(self) {
        let generation = self.guard.generation;
        let mut consumer = self.queue.consumer().await;
        debug!("Eave agent worker {generation} consuming");

        let mut buffer: Vec<EventPayload> = Vec::new();
        let mut failures: u32 = 0;
        let mut last_flush = Instant::now();
        let mut queue_closed = false;
        // Set once a newer worker has been asked to stop; this one only finishes its buffer.
        let mut superseded = false;

        loop {
            let mut force_flush = false;

            match self
                .next_item(&mut consumer, &buffer, last_flush, queue_closed, superseded)
                .await
            {
                Dequeued::Event(payload) => {
                    if self.handler.validate_data_type(&payload) {
                        buffer.push(payload);
                    } else {
                        warn!(
                            "Dropping {} event not accepted by the data handler",
                            payload.kind()
                        );
                    }
                }
                Dequeued::Shutdown(sentinel) if sentinel == generation => {
                    debug!("Queue closed, draining");
                    queue_closed = true;
                }
                Dequeued::Shutdown(sentinel) if sentinel > generation => {
                    debug!("Handing shutdown request over to worker {sentinel}");
                    if let Err(e) = self.queue.close(sentinel) {
                        error!("Failed to requeue shutdown request for worker {sentinel}: {e}");
                    }
                    queue_closed = true;
                    superseded = true;
                }
                Dequeued::Shutdown(sentinel) => {
                    debug!("Ignoring stale shutdown request addressed to worker {sentinel}");
                }
                Dequeued::Empty => {
                    if queue_closed {
                        force_flush = true;
                    }
                }
            }

            let now = Instant::now();
            if !buffer.is_empty()
                && (force_flush
                    || buffer.len() >= self.settings.max_batch_size
                    || now.duration_since(last_flush) >= self.settings.flush_interval)
            {
                debug!(
                    "Sending event batch: buflen={}, force_flush={}, failures={}",
                    buffer.len(),
                    force_flush,
                    failures
                );
                match self.handler.send_buffer(&buffer).await {
                    Ok(()) => {
                        buffer.clear();
                        if self.settings.failure_policy == FailurePolicy::ResetOnSuccess {
                            failures = 0;
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        error!(
                            "Failed to send {} events ({failures}/{}): {e}",
                            buffer.len(),
                            self.settings.max_failures
                        );
                    }
                }
                // Restarting the clock after a failure spaces retries by the flush interval.
                last_flush = now;
            }

            if failures >= self.settings.max_failures {
                error!(
                    "Eave agent failsafe threshold reached after {failures} failed flushes, terminating. Dropping {} buffered events",
                    buffer.len()
                );
                return;
            }

            if queue_closed && buffer.is_empty() {
                info!("Eave agent queue drained, terminating");
                return;
            }
        }
    }

    /// Reads the next item. Once the queue is closed this never waits; with an empty buffer
    /// there is nothing to flush on a timer, so it waits for the next item without a deadline.
    /// A superseded worker stops reading altogether.
    async fn next_item(
        &self,
        consumer: &mut QueueConsumer,
        buffer: &[EventPayload],
        last_flush: Instant,
        queue_closed: bool,
        superseded: bool,
    ) -> Dequeued {
        if superseded {
            return Dequeued::Empty;
        }
        if queue_closed {
            return consumer.try_get();
        }
        if buffer.is_empty() {
            return consumer.recv().await;
        }
        let timeout = self
            .settings
            .flush_interval
            .saturating_sub(last_flush.elapsed());
        consumer.get(timeout).await
    }
}
