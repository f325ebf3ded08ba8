// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::AgentError;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;
pub const FAILSAFE_MAX_FAILURES: u32 = 10;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COLLECTOR_URL: &str = "https://api.eave.fyi";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How the circuit breaker counts failed flushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// A successful flush resets the counter, so only consecutive failures trip the breaker.
    #[default]
    ResetOnSuccess,
    /// Failures accumulate over the worker's lifetime.
    Cumulative,
}

impl FromStr for FailurePolicy {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reset_on_success" => Ok(FailurePolicy::ResetOnSuccess),
            "cumulative" => Ok(FailurePolicy::Cumulative),
            other => Err(AgentError::InvalidConfig(format!(
                "Invalid failure policy '{other}'. Must be one of: reset_on_success, cumulative"
            ))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::ResetOnSuccess => f.write_str("reset_on_success"),
            FailurePolicy::Cumulative => f.write_str("cumulative"),
        }
    }
}

/// Configuration for the agent and its HTTP transport
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Queue capacity, 0 means unbounded
    pub queue_maxsize: usize,
    /// Time flush threshold
    pub flush_interval: Duration,
    /// Count flush threshold
    pub max_batch_size: usize,
    /// Failed flushes before the worker gives up
    pub max_failures: u32,
    pub failure_policy: FailurePolicy,
    /// Default wait used by `stop` callers
    pub shutdown_timeout: Duration,
    /// Collector base URL
    pub collector_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub request_timeout: Duration,
    /// zstd level for request bodies, `None` disables compression
    pub compression_level: Option<i32>,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            queue_maxsize: 0,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_failures: FAILSAFE_MAX_FAILURES,
            failure_policy: FailurePolicy::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            client_id: None,
            client_secret: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            compression_level: None,
            https_proxy: None,
            log_level: "info".to_string(),
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|val| val.trim().parse::<T>().ok())
}

/// Reads a number of seconds, clamping negatives to zero. Values a `Duration` cannot hold
/// are treated as unparseable.
fn parse_seconds(name: &str) -> Option<Duration> {
    parse_env::<f64>(name)
        .filter(|secs| !secs.is_nan())
        .and_then(|secs| Duration::try_from_secs_f64(secs.max(0.0)).ok())
}

impl AgentConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, AgentError> {
        let defaults = Self::default();

        let queue_maxsize = parse_env("EAVE_QUEUE_MAXSIZE").unwrap_or(defaults.queue_maxsize);
        let flush_interval = parse_seconds("EAVE_QUEUE_FLUSH_FREQUENCY_SECONDS")
            .unwrap_or(defaults.flush_interval);
        let max_batch_size = parse_env::<usize>("EAVE_QUEUE_MAX_BATCH_SIZE")
            .unwrap_or(defaults.max_batch_size)
            .max(1);
        let max_failures =
            parse_env("EAVE_FAILSAFE_MAX_FAILURES").unwrap_or(defaults.max_failures);
        let failure_policy = match env::var("EAVE_FAILURE_POLICY") {
            Ok(val) => val.parse()?,
            Err(_) => defaults.failure_policy,
        };
        let shutdown_timeout = parse_seconds("EAVE_SHUTDOWN_TIMEOUT_SECONDS")
            .unwrap_or(defaults.shutdown_timeout);
        let collector_url = env::var("EAVE_COLLECTOR_URL").unwrap_or(defaults.collector_url);
        let client_id = env::var("EAVE_CLIENT_ID").ok();
        let client_secret = env::var("EAVE_CLIENT_SECRET").ok();
        let request_timeout = parse_seconds("EAVE_REQUEST_TIMEOUT_SECONDS")
            .unwrap_or(defaults.request_timeout);
        let compression_level = parse_env("EAVE_COMPRESSION_LEVEL");
        let https_proxy = env::var("EAVE_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();
        let log_level = env::var("EAVE_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        let config = Self {
            queue_maxsize,
            flush_interval,
            max_batch_size,
            max_failures,
            failure_policy,
            shutdown_timeout,
            collector_url,
            client_id,
            client_secret,
            request_timeout,
            compression_level,
            https_proxy,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_batch_size == 0 {
            return Err(AgentError::InvalidConfig(
                "max batch size must be at least 1".to_string(),
            ));
        }

        if self.max_failures == 0 {
            return Err(AgentError::InvalidConfig(
                "EAVE_FAILSAFE_MAX_FAILURES must be at least 1".to_string(),
            ));
        }

        let url = self.collector_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AgentError::InvalidConfig(format!(
                "EAVE_COLLECTOR_URL must be an http(s) URL, got '{}'",
                self.collector_url
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(AgentError::InvalidConfig(
                "EAVE_REQUEST_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        if let Some(level) = self.compression_level {
            if !(1..=22).contains(&level) {
                return Err(AgentError::InvalidConfig(format!(
                    "Invalid compression level {level}. Must be between 1 and 22"
                )));
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(AgentError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}
