// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod listener;
mod logger;

use std::env;
use std::sync::Arc;

use anyhow::Context;
use eave_agent::handler::http::{HttpDataHandler, HttpDataHandlerConfig};
use eave_agent::{Agent, AgentConfig};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::listener::{EventListener, DEFAULT_SOCKET_PATH};

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let config = AgentConfig::from_env().context("invalid agent configuration")?;
    init_logging(&config.log_level)?;
    debug!("Logging subsystem enabled");

    let socket_path =
        env::var("EAVE_AGENT_SOCKET").unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string());

    if config.client_id.is_none() || config.client_secret.is_none() {
        warn!("EAVE_CLIENT_ID or EAVE_CLIENT_SECRET not set, the collector will reject batches");
    }

    let handler = HttpDataHandler::new(HttpDataHandlerConfig::from(&config))
        .context("failed to build the collector client")?;
    info!("Forwarding events to {}", handler.endpoint());

    let agent = Agent::new(&config, Arc::new(handler))?;
    agent.start()?;

    let cancel_token = CancellationToken::new();
    let listener = match EventListener::bind(&socket_path, agent.sink(), cancel_token.clone()) {
        Ok(listener) => listener,
        Err(e) => {
            agent.shutdown().await;
            return Err(e).with_context(|| format!("failed to listen on {socket_path}"));
        }
    };
    info!("eave-agentd: listening on {socket_path}");
    let listener_task = tokio::spawn(listener.spin());

    if let Err(e) = wait_for_shutdown_signal().await {
        error!("Failed to install signal handlers: {e}");
    }
    info!("Shutting down");

    cancel_token.cancel();
    if let Err(e) = listener_task.await {
        error!("Event listener ended abnormally: {e}");
    }
    agent.shutdown().await;

    Ok(())
}

fn init_logging(log_level: &str) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(logger::env_filter(log_level)?)
        .event_format(logger::Formatter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;
    Ok(())
}

async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}
