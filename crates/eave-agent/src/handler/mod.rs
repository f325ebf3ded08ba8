// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::SendError;
use crate::event::{EventKind, EventPayload};

pub mod http;

/// Capability the agent uses to accept and deliver payloads.
///
/// Implementations decide which event kinds they ship and how a buffer reaches the collector
/// (HTTP, a file, a test recorder). The agent may call `send_buffer` again with the same buffer
/// after a failure, so delivering a buffer twice must be harmless.
#[async_trait]
pub trait DataHandler: Send + Sync {
    /// Event kinds this handler ships. Defaults to every kind.
    fn accepted_kinds(&self) -> &[EventKind] {
        &EventKind::ALL
    }

    /// Whether a dequeued payload belongs in the buffer handed to this handler.
    fn validate_data_type(&self, payload: &EventPayload) -> bool {
        self.accepted_kinds().contains(&payload.kind())
    }

    /// Delivers a non-empty buffer. Returns an error if the buffer should be retried later.
    async fn send_buffer(&self, buffer: &[EventPayload]) -> Result<(), SendError>;
}

/// Groups a buffer by event type into the collector's batch body:
/// `{"events": {"db_event": [...], "http_server_event": [...]}}`.
///
/// Order within a group follows buffer order.
pub fn batch_body(buffer: &[EventPayload]) -> Result<Value, SendError> {
    let mut groups: BTreeMap<&'static str, Vec<Value>> = BTreeMap::new();
    for payload in buffer {
        let wire = payload
            .to_wire()
            .map_err(|e| SendError::Serialization(e.to_string()))?;
        groups
            .entry(payload.kind().wire_name())
            .or_default()
            .push(Value::Object(wire));
    }

    let events: Map<String, Value> = groups
        .into_iter()
        .map(|(kind, items)| (kind.to_string(), Value::Array(items)))
        .collect();

    let mut body = Map::new();
    body.insert("events".to_string(), Value::Object(events));
    Ok(Value::Object(body))
}
