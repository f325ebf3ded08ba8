// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while building or decoding an event payload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Failed to decode payload: {0}")]
    Decode(String),

    #[error("Failed to encode payload: {0}")]
    Encode(String),
}

/// Errors a `DataHandler` reports when a buffer could not be delivered.
/// The agent keeps the buffer and retries on any of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Collector responded with status {0}")]
    Status(u16),

    /// A 4xx response. Retried like any other failure, so a batch the collector keeps refusing
    /// ends in a circuit breaker trip.
    #[error("Collector rejected the batch with status {0}")]
    Rejected(u16),

    #[error("Failed to serialize batch: {0}")]
    Serialization(String),

    #[error("Failed to compress batch: {0}")]
    Compression(String),
}

/// Errors surfaced by agent setup. Nothing on the `put` path returns these.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No tokio runtime available to spawn the agent worker")]
    NoRuntime,

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}
