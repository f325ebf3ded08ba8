// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Multi-producer, single-consumer event queue.
//!
//! Producers call [`EventQueue::put`] from any thread, with or without a tokio runtime. The call
//! is a channel send plus an atomic counter update, so it never waits on the consumer. Capacity is
//! enforced with the counter rather than with a bounded channel: a full queue rejects the event
//! immediately instead of making the producer wait, and the shutdown sentinel can always be
//! enqueued regardless of how full the queue is.
//!
//! Exactly one [`QueueConsumer`] can exist at a time. It owns the receiving end through an owned
//! mutex guard, so a second consumer (e.g. a restarted worker) waits until the previous one is
//! dropped and then picks up where it left off.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::event::EventPayload;

#[derive(Debug)]
enum QueueItem {
    Event(EventPayload),
    Shutdown(u64),
}

/// Result of a consumer read.
#[derive(Debug)]
pub enum Dequeued {
    Event(EventPayload),
    /// Shutdown sentinel, tagged with the worker generation that requested it.
    Shutdown(u64),
    Empty,
}

/// Why an event was not enqueued. Returned to the caller instead of being raised.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PutError {
    #[error("queue is full (capacity {0})")]
    Full(usize),

    #[error("queue receiver is gone")]
    Closed,
}

#[derive(Debug, Default)]
struct Counters {
    len: AtomicUsize,
    dropped: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<QueueItem>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<QueueItem>>>,
    counters: Arc<Counters>,
    /// 0 means unbounded
    capacity: usize,
}

impl EventQueue {
    pub fn unbounded() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a queue holding at most `capacity` events. A capacity of 0 is unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            counters: Arc::new(Counters::default()),
            capacity,
        }
    }

    pub fn put(&self, payload: EventPayload) -> Result<(), PutError> {
        let queued = self.counters.len.fetch_add(1, Ordering::AcqRel);
        if self.capacity > 0 && queued >= self.capacity {
            self.counters.len.fetch_sub(1, Ordering::AcqRel);
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(PutError::Full(self.capacity));
        }

        if self.tx.send(QueueItem::Event(payload)).is_err() {
            self.counters.len.fetch_sub(1, Ordering::AcqRel);
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(PutError::Closed);
        }
        Ok(())
    }

    /// Enqueues the shutdown sentinel for `generation`. Ignores capacity.
    pub fn close(&self, generation: u64) -> Result<(), PutError> {
        self.tx
            .send(QueueItem::Shutdown(generation))
            .map_err(|_| PutError::Closed)
    }

    /// Number of events currently queued (sentinels excluded).
    pub fn len(&self) -> usize {
        self.counters.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of events rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> Option<usize> {
        (self.capacity > 0).then_some(self.capacity)
    }

    /// Waits until no other consumer holds the receiver and takes it.
    pub async fn consumer(&self) -> QueueConsumer {
        QueueConsumer {
            rx: Arc::clone(&self.rx).lock_owned().await,
            counters: Arc::clone(&self.counters),
        }
    }
}

pub struct QueueConsumer {
    rx: OwnedMutexGuard<mpsc::UnboundedReceiver<QueueItem>>,
    counters: Arc<Counters>,
}

impl QueueConsumer {
    /// Waits up to `timeout` for the next item. A zero timeout does not wait at all.
    pub async fn get(&mut self, timeout: Duration) -> Dequeued {
        if timeout.is_zero() {
            return self.try_get();
        }

        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(item)) => self.unwrap_item(item),
            Ok(None) | Err(_) => Dequeued::Empty,
        }
    }

    /// Waits for the next item with no deadline.
    pub async fn recv(&mut self) -> Dequeued {
        match self.rx.recv().await {
            Some(item) => self.unwrap_item(item),
            None => Dequeued::Empty,
        }
    }

    pub fn try_get(&mut self) -> Dequeued {
        match self.rx.try_recv() {
            Ok(item) => self.unwrap_item(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Dequeued::Empty,
        }
    }

    fn unwrap_item(&self, item: QueueItem) -> Dequeued {
        match item {
            QueueItem::Event(payload) => {
                self.counters.len.fetch_sub(1, Ordering::AcqRel);
                Dequeued::Event(payload)
            }
            QueueItem::Shutdown(generation) => Dequeued::Shutdown(generation),
        }
    }
}
