// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport shipping batches to the Eave collector.
//!
//! Each call to `send_buffer` is exactly one POST of the grouped batch body. There is no retry
//! loop here: a failed POST surfaces as a [`SendError`] and the agent keeps the buffer for its
//! next attempt, which keeps failure accounting in one place.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use std::io::Write;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error};
use zstd::stream::write::Encoder;

use crate::config::AgentConfig;
use crate::error::{AgentError, SendError};
use crate::event::EventPayload;
use crate::handler::{batch_body, DataHandler};

const INGEST_PATH: &str = "/public/ingest/server";
const CLIENT_ID_HEADER: &str = "eave-client-id";
const CLIENT_SECRET_HEADER: &str = "eave-client-secret";

#[derive(Debug, Clone)]
pub struct HttpDataHandlerConfig {
    /// Collector base URL, e.g. `https://api.eave.fyi`
    pub collector_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout: Duration,
    /// zstd level; `None` sends the body uncompressed
    pub compression_level: Option<i32>,
    pub https_proxy: Option<String>,
}

impl From<&AgentConfig> for HttpDataHandlerConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            collector_url: config.collector_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            timeout: config.request_timeout,
            compression_level: config.compression_level,
            https_proxy: config.https_proxy.clone(),
        }
    }
}

#[derive(Debug)]
pub struct HttpDataHandler {
    client: reqwest::Client,
    endpoint: String,
    config: HttpDataHandlerConfig,
    headers: OnceCell<HeaderMap>,
}

impl HttpDataHandler {
    pub fn new(config: HttpDataHandlerConfig) -> Result<Self, AgentError> {
        let client = build_client(&config)?;
        let endpoint = format!("{}{}", config.collector_url.trim_end_matches('/'), INGEST_PATH);
        Ok(Self {
            client,
            endpoint,
            config,
            headers: OnceCell::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_headers(&self) -> &HeaderMap {
        self.headers
            .get_or_init(move || async move {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                if self.config.compression_level.is_some() {
                    headers.insert(CONTENT_ENCODING, HeaderValue::from_static("zstd"));
                }
                insert_credential(&mut headers, CLIENT_ID_HEADER, &self.config.client_id);
                insert_credential(&mut headers, CLIENT_SECRET_HEADER, &self.config.client_secret);
                headers
            })
            .await
    }

    fn encode(&self, buffer: &[EventPayload]) -> Result<Vec<u8>, SendError> {
        let body = batch_body(buffer)?;
        let json = serde_json::to_vec(&body).map_err(|e| SendError::Serialization(e.to_string()))?;

        match self.config.compression_level {
            Some(level) => compress(&json, level),
            None => Ok(json),
        }
    }
}

fn insert_credential(headers: &mut HeaderMap, name: &'static str, value: &Option<String>) {
    let Some(value) = value else {
        return;
    };
    match HeaderValue::from_str(value) {
        Ok(mut header) => {
            header.set_sensitive(true);
            headers.insert(name, header);
        }
        Err(e) => error!("Ignoring invalid {name} header value: {e}"),
    }
}

fn compress(data: &[u8], level: i32) -> Result<Vec<u8>, SendError> {
    let mut encoder =
        Encoder::new(Vec::new(), level).map_err(|e| SendError::Compression(e.to_string()))?;
    encoder
        .write_all(data)
        .map_err(|e| SendError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| SendError::Compression(e.to_string()))
}

fn build_client(config: &HttpDataHandlerConfig) -> Result<reqwest::Client, AgentError> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)));

    if let Some(proxy) = &config.https_proxy {
        let proxy = reqwest::Proxy::https(proxy).map_err(|e| AgentError::Client(e.to_string()))?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|e| AgentError::Client(e.to_string()))
}

#[async_trait]
impl DataHandler for HttpDataHandler {
    async fn send_buffer(&self, buffer: &[EventPayload]) -> Result<(), SendError> {
        if buffer.is_empty() {
            return Ok(());
        }

        let body = self.encode(buffer)?;
        let headers = self.get_headers().await.clone();
        debug!("Sending {} events to {}", buffer.len(), self.endpoint);

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        error!("{}: Collector refused batch: {:?}", status, text);
        if status.is_client_error() {
            Err(SendError::Rejected(status.as_u16()))
        } else {
            Err(SendError::Status(status.as_u16()))
        }
    }
}
