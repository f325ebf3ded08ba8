// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Unix socket intake for out-of-process instrumentation.
//!
//! Clients connect to the socket and write one JSON event per line, in the same flat wire format
//! the collector receives. A line containing only `EOF` ends the connection.

use std::io;
use std::path::{Path, PathBuf};

use eave_agent::{EventPayload, EventSink};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/eaveagent.sock";
const END_OF_STREAM: &str = "EOF";

/// Checks that `path` can be bound as a Unix socket.
///
/// The path must be non-empty, absolute, free of NUL bytes and at most 100 bytes long
/// (the kernel limit is 108 on Linux).
pub fn validate_socket_path(path: &str) -> io::Result<()> {
    if path.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Unix socket path cannot be empty",
        ));
    }

    if path.contains('\0') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Unix socket path cannot contain null bytes",
        ));
    }

    let byte_len = path.len();
    if byte_len > 100 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Unix socket path too long: {byte_len} bytes (maximum 100 bytes). Path: {path}"),
        ));
    }

    if !path.starts_with('/') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Unix socket path must be absolute (start with '/'). Got: {path}"),
        ));
    }

    Ok(())
}

/// Removes the socket file when dropped. `UnixListener` leaves it behind otherwise.
#[derive(Debug)]
struct SocketCleanupGuard {
    path: PathBuf,
}

impl Drop for SocketCleanupGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove Unix socket file '{}': {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

pub struct EventListener {
    listener: UnixListener,
    sink: EventSink,
    cancel_token: CancellationToken,
    _cleanup: SocketCleanupGuard,
}

impl EventListener {
    /// Binds the socket at `path`, replacing a stale socket file left by a previous run.
    pub fn bind(path: &str, sink: EventSink, cancel_token: CancellationToken) -> io::Result<Self> {
        validate_socket_path(path)?;

        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed stale socket file {path}"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let listener = UnixListener::bind(path)?;
        Ok(Self {
            listener,
            sink,
            cancel_token,
            _cleanup: SocketCleanupGuard {
                path: PathBuf::from(path),
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self._cleanup.path
    }

    /// Accepts connections until the cancel token fires. Each connection is served on its own task.
    pub async fn spin(self) {
        let mut next_id: u64 = 0;
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Event listener on {} shutting down", self.path().display());
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        next_id += 1;
                        let id = next_id;
                        let sink = self.sink.clone();
                        let cancel_token = self.cancel_token.clone();
                        tokio::spawn(
                            read_events(stream, sink, cancel_token)
                                .instrument(info_span!("connection", id)),
                        );
                    }
                    Err(e) => error!("Failed to accept connection: {e}"),
                },
            }
        }
    }
}

/// Forwards every decodable line on `stream` to `sink`. Returns the number of events forwarded.
async fn read_events(stream: UnixStream, sink: EventSink, cancel_token: CancellationToken) -> u64 {
    let mut lines = BufReader::new(stream).lines();
    let mut forwarded = 0;

    loop {
        let line = tokio::select! {
            () = cancel_token.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Connection read failed: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == END_OF_STREAM {
            trace!("Client closed the stream");
            break;
        }

        match EventPayload::from_wire_str(line) {
            Ok(payload) => {
                sink.put(payload);
                forwarded += 1;
            }
            Err(e) => warn!("Skipping undecodable event line: {e}"),
        }
    }

    debug!("Connection closed after {forwarded} events");
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use eave_agent::event::{DatabaseOperation, HttpMethod};
    use eave_agent::{Agent, AgentConfig, DataHandler, SendError};
    use tokio::io::AsyncWriteExt;

    struct NoopHandler;

    #[async_trait::async_trait]
    impl DataHandler for NoopHandler {
        async fn send_buffer(&self, _buffer: &[EventPayload]) -> Result<(), SendError> {
            Ok(())
        }
    }

    fn stopped_agent() -> Agent {
        Agent::new(&AgentConfig::default(), std::sync::Arc::new(NoopHandler)).unwrap()
    }

    fn wire_line(payload: &EventPayload) -> String {
        let wire = payload.to_wire().unwrap();
        format!("{}\n", serde_json::Value::Object(wire))
    }

    async fn wait_for_queued(agent: &Agent, expected: usize) {
        for _ in 0..200 {
            if agent.queued() == expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("expected {expected} queued events, found {}", agent.queued());
    }

    #[test]
    fn test_validate_socket_path() {
        assert!(validate_socket_path("/tmp/eaveagent.sock").is_ok());
        assert!(validate_socket_path("").is_err());
        assert!(validate_socket_path("relative.sock").is_err());
        assert!(validate_socket_path("/tmp/bad\0path.sock").is_err());

        let long = format!("/tmp/{}.sock", "a".repeat(100));
        let err = validate_socket_path(&long).unwrap_err();
        assert!(err.to_string().contains("too long"));
    }

    #[tokio::test]
    async fn test_forwards_lines_until_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.sock");
        let path = path.to_str().unwrap();

        let agent = stopped_agent();
        let cancel = CancellationToken::new();
        let listener = EventListener::bind(path, agent.sink(), cancel.clone()).unwrap();
        let server = tokio::spawn(listener.spin());

        let db = EventPayload::database()
            .statement("DELETE FROM carts WHERE id = 1")
            .operation(DatabaseOperation::Delete)
            .build()
            .unwrap();
        let http = EventPayload::http_client()
            .method(HttpMethod::Put)
            .url("https://upstream.internal/carts/1")
            .build()
            .unwrap();

        let mut input = wire_line(&db);
        input.push_str("\n{not json}\n");
        input.push_str("{\"event_type\":\"mystery_event\"}\n");
        input.push_str(&wire_line(&http));
        input.push_str("EOF\n");
        input.push_str(&wire_line(&db));

        let mut client = UnixStream::connect(path).await.unwrap();
        client.write_all(input.as_bytes()).await.unwrap();
        client.flush().await.unwrap();

        wait_for_queued(&agent, 2).await;
        // Lines after EOF are never read.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(agent.queued(), 2);

        cancel.cancel();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        std::fs::write(&path, b"left over").unwrap();
        let path_str = path.to_str().unwrap();

        let agent = stopped_agent();
        let cancel = CancellationToken::new();
        let listener = EventListener::bind(path_str, agent.sink(), cancel.clone()).unwrap();
        assert_eq!(listener.path(), path.as_path());
        assert!(path.exists());

        cancel.cancel();
        listener.spin().await;
        assert!(!path.exists(), "socket file should be removed on shutdown");
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_path() {
        let agent = stopped_agent();
        let result = EventListener::bind("relative.sock", agent.sink(), CancellationToken::new());
        assert!(matches!(result, Err(e) if e.kind() == io::ErrorKind::InvalidInput));
    }
}
