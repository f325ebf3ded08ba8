// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use eave_agent::event::{DatabaseOperation, HttpMethod};
use eave_agent::EventPayload;
use std::time::{Duration, Instant};

/// A database event whose statement identifies it in assertions
pub fn db_event(statement: &str) -> EventPayload {
    EventPayload::database()
        .statement(statement)
        .operation(DatabaseOperation::Select)
        .table_name("accounts")
        .build()
        .expect("valid db event")
}

#[allow(dead_code)]
pub fn http_server_event(url: &str) -> EventPayload {
    EventPayload::http_server()
        .method(HttpMethod::Get)
        .url(url)
        .header("accept", "application/json")
        .build()
        .expect("valid http event")
}

/// Statement texts of a run of db events, in order
pub fn statements(events: &[EventPayload]) -> Vec<String> {
    events
        .iter()
        .map(|payload| match payload {
            EventPayload::Database(e) => e.statement().to_string(),
            other => panic!("expected a db event, got {other:?}"),
        })
        .collect()
}

/// Polls `cond` until it holds, failing the test after 5 seconds
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
