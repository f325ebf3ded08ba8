// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Eave Agent
//!
//! In-process telemetry batching for Eave collectors.
//!
//! Instrumentation builds an [`EventPayload`] for each database call, HTTP exchange or AI
//! completion it observes and hands it to an [`Agent`] (or an [`EventSink`] cloned from it).
//! Enqueueing never blocks the caller. A background tokio task groups queued events into
//! batches and delivers them through a [`DataHandler`], by default the
//! [`HttpDataHandler`](handler::http::HttpDataHandler) which posts to the Eave collector.
//!
//! - [`event`]: payload variants, builders and the wire format
//! - [`queue`]: the multi-producer, single-consumer event queue
//! - [`handler`]: the delivery contract and the HTTP transport
//! - [`agent`]: worker lifecycle, batching and the circuit breaker
//! - [`config`]: environment configuration

#![deny(clippy::all)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![deny(unused_extern_crates)]
#![deny(unused_must_use)]

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod handler;
pub mod queue;

pub use agent::{Agent, AgentStatus, EventSink};
pub use config::{AgentConfig, FailurePolicy};
pub use context::CorrelationContext;
pub use error::{AgentError, PayloadError, SendError};
pub use event::{EventKind, EventPayload};
pub use handler::DataHandler;
