// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock data handlers for testing the agent without a collector

use async_trait::async_trait;
use eave_agent::{DataHandler, EventPayload, SendError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every delivered batch. The first `failures` calls fail with a 503.
#[derive(Default)]
pub struct RecordingHandler {
    batches: Mutex<Vec<Vec<EventPayload>>>,
    calls: AtomicU32,
    failures: u32,
}

#[allow(dead_code)]
impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fails the first `failures` calls, then succeeds.
    pub fn flaky(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            ..Default::default()
        })
    }

    /// Never succeeds.
    pub fn failing() -> Arc<Self> {
        Self::flaky(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<EventPayload>> {
        self.batches.lock().expect("batches lock").clone()
    }

    pub fn delivered(&self) -> Vec<EventPayload> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl DataHandler for RecordingHandler {
    async fn send_buffer(&self, buffer: &[EventPayload]) -> Result<(), SendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(SendError::Status(503));
        }
        self.batches
            .lock()
            .expect("batches lock")
            .push(buffer.to_vec());
        Ok(())
    }
}

/// Takes `delay` to deliver each batch, then records it.
#[allow(dead_code)]
pub struct SlowHandler {
    pub delay: Duration,
    pub inner: Arc<RecordingHandler>,
}

#[async_trait]
impl DataHandler for SlowHandler {
    async fn send_buffer(&self, buffer: &[EventPayload]) -> Result<(), SendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.send_buffer(buffer).await
    }
}
