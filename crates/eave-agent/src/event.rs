// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Event payloads produced by instrumentation shims.
//!
//! A payload is built once at the instrumented call site and never mutated afterwards. Every
//! variant shares the same envelope (`event_id`, `timestamp`, `corr_ctx`) and serializes to a
//! flat JSON object tagged with `event_type`, which is the shape the collector ingests:
//!
//! ```json
//! {
//!   "event_type": "db_event",
//!   "event_id": "4f0c…",
//!   "timestamp": 1718000000.25,
//!   "corr_ctx": {"session_id": "s-1"},
//!   "statement": "SELECT * FROM users WHERE id = $1",
//!   "operation": "SELECT",
//!   ...
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::context::CorrelationContext;
use crate::error::PayloadError;

/// Discriminant of an [`EventPayload`], also used as the batch grouping key on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    DbEvent,
    HttpServerEvent,
    HttpClientEvent,
    AiChatCompletionEvent,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::DbEvent,
        EventKind::HttpServerEvent,
        EventKind::HttpClientEvent,
        EventKind::AiChatCompletionEvent,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::DbEvent => "db_event",
            EventKind::HttpServerEvent => "http_server_event",
            EventKind::HttpClientEvent => "http_client_event",
            EventKind::AiChatCompletionEvent => "openai_chat_completion_event",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatabaseOperation {
    Insert,
    Update,
    Delete,
    Select,
}

impl FromStr for DatabaseOperation {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "SELECT" => Ok(Self::Select),
            other => Err(PayloadError::Decode(format!(
                "unsupported database operation '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatabaseStructure {
    #[default]
    Sql,
    NoSql,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Connect,
    Trace,
}

impl FromStr for HttpMethod {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            "CONNECT" => Ok(Self::Connect),
            "TRACE" => Ok(Self::Trace),
            other => Err(PayloadError::Decode(format!(
                "unsupported HTTP method '{other}'"
            ))),
        }
    }
}

/// Envelope shared by every payload variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    event_id: Uuid,
    timestamp: f64,
    #[serde(rename = "corr_ctx", default)]
    correlation_context: CorrelationContext,
}

impl EventMeta {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Capture time in seconds since the Unix epoch.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn correlation_context(&self) -> &CorrelationContext {
        &self.correlation_context
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseEvent {
    #[serde(flatten)]
    meta: EventMeta,
    statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    statement_values: Option<Map<String, Value>>,
    operation: DatabaseOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db_name: Option<String>,
    #[serde(default)]
    db_structure: DatabaseStructure,
}

impl DatabaseEvent {
    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn statement_values(&self) -> Option<&Map<String, Value>> {
        self.statement_values.as_ref()
    }

    pub fn operation(&self) -> DatabaseOperation {
        self.operation
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn db_name(&self) -> Option<&str> {
        self.db_name.as_deref()
    }

    pub fn db_structure(&self) -> DatabaseStructure {
        self.db_structure
    }
}

/// Request/response data captured by either the server middleware or the outgoing client shim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEvent {
    #[serde(flatten)]
    meta: EventMeta,
    request_method: HttpMethod,
    request_url: String,
    #[serde(default)]
    request_headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_payload: Option<String>,
}

impl HttpEvent {
    pub fn method(&self) -> HttpMethod {
        self.request_method
    }

    pub fn url(&self) -> &str {
        &self.request_url
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.request_headers
    }

    pub fn body(&self) -> Option<&str> {
        self.request_payload.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub filename: String,
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiChatCompletionEvent {
    #[serde(flatten)]
    meta: EventMeta,
    model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completion_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completion_created_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completion_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    num_completions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_start_timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_end_timestamp: Option<f64>,
    #[serde(default)]
    stack_frames: Vec<StackFrame>,
}

impl AiChatCompletionEvent {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn completion_id(&self) -> Option<&str> {
        self.completion_id.as_deref()
    }

    pub fn prompt_tokens(&self) -> Option<u64> {
        self.prompt_tokens
    }

    pub fn completion_tokens(&self) -> Option<u64> {
        self.completion_tokens
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.total_tokens
    }

    /// Wall time between request start and end, when both were captured.
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.request_start_timestamp, self.request_end_timestamp) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }

    pub fn stack_frames(&self) -> &[StackFrame] {
        &self.stack_frames
    }
}

/// One captured occurrence, ready to be queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    #[serde(rename = "db_event")]
    Database(DatabaseEvent),
    #[serde(rename = "http_server_event")]
    HttpServer(HttpEvent),
    #[serde(rename = "http_client_event")]
    HttpClient(HttpEvent),
    #[serde(rename = "openai_chat_completion_event")]
    AiChatCompletion(AiChatCompletionEvent),
}

impl EventPayload {
    pub fn database() -> DatabaseEventBuilder {
        DatabaseEventBuilder::default()
    }

    pub fn http_server() -> HttpEventBuilder {
        HttpEventBuilder::new(EventKind::HttpServerEvent)
    }

    pub fn http_client() -> HttpEventBuilder {
        HttpEventBuilder::new(EventKind::HttpClientEvent)
    }

    pub fn ai_chat_completion() -> AiChatCompletionEventBuilder {
        AiChatCompletionEventBuilder::default()
    }

    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Database(_) => EventKind::DbEvent,
            EventPayload::HttpServer(_) => EventKind::HttpServerEvent,
            EventPayload::HttpClient(_) => EventKind::HttpClientEvent,
            EventPayload::AiChatCompletion(_) => EventKind::AiChatCompletionEvent,
        }
    }

    pub fn meta(&self) -> &EventMeta {
        match self {
            EventPayload::Database(e) => &e.meta,
            EventPayload::HttpServer(e) | EventPayload::HttpClient(e) => &e.meta,
            EventPayload::AiChatCompletion(e) => &e.meta,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.meta().event_id
    }

    pub fn timestamp(&self) -> f64 {
        self.meta().timestamp
    }

    pub fn correlation_context(&self) -> &CorrelationContext {
        &self.meta().correlation_context
    }

    /// Flat JSON object in the collector's wire format, tagged with `event_type`.
    pub fn to_wire(&self) -> Result<Map<String, Value>, PayloadError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(PayloadError::Encode(format!(
                "expected a JSON object, got {other}"
            ))),
            Err(e) => Err(PayloadError::Encode(e.to_string())),
        }
    }

    /// Inverse of [`EventPayload::to_wire`], accepting a single JSON document.
    pub fn from_wire_str(raw: &str) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| PayloadError::Decode(e.to_string()))?;
        Self::from_wire(value)
    }

    pub fn from_wire(value: Value) -> Result<Self, PayloadError> {
        let event_type = value
            .get("event_type")
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("event_type"))?;
        if EventKind::from_wire_name(event_type).is_none() {
            return Err(PayloadError::UnknownEventType(event_type.to_string()));
        }
        serde_json::from_value(value).map_err(|e| PayloadError::Decode(e.to_string()))
    }
}

fn now_epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Envelope fields shared by all builders. Anything left unset is generated at build time.
#[derive(Debug, Clone, Default)]
struct MetaBuilder {
    event_id: Option<Uuid>,
    timestamp: Option<f64>,
    correlation_context: CorrelationContext,
}

impl MetaBuilder {
    fn finish(self) -> EventMeta {
        EventMeta {
            event_id: self.event_id.unwrap_or_else(Uuid::new_v4),
            timestamp: self.timestamp.unwrap_or_else(now_epoch_seconds),
            correlation_context: self.correlation_context,
        }
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, PayloadError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PayloadError::MissingField(field)),
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseEventBuilder {
    meta: MetaBuilder,
    statement: Option<String>,
    statement_values: Option<Map<String, Value>>,
    operation: Option<DatabaseOperation>,
    table_name: Option<String>,
    db_name: Option<String>,
    db_structure: DatabaseStructure,
}

impl DatabaseEventBuilder {
    pub fn event_id(mut self, event_id: Uuid) -> Self {
        self.meta.event_id = Some(event_id);
        self
    }

    pub fn timestamp(mut self, timestamp: f64) -> Self {
        self.meta.timestamp = Some(timestamp);
        self
    }

    pub fn correlation_context(mut self, ctx: CorrelationContext) -> Self {
        self.meta.correlation_context = ctx;
        self
    }

    pub fn statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    pub fn statement_values(mut self, values: Map<String, Value>) -> Self {
        self.statement_values = Some(values);
        self
    }

    pub fn operation(mut self, operation: DatabaseOperation) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = Some(db_name.into());
        self
    }

    pub fn db_structure(mut self, db_structure: DatabaseStructure) -> Self {
        self.db_structure = db_structure;
        self
    }

    pub fn build(self) -> Result<EventPayload, PayloadError> {
        let statement = required(self.statement, "statement")?;
        let operation = self
            .operation
            .ok_or(PayloadError::MissingField("operation"))?;

        Ok(EventPayload::Database(DatabaseEvent {
            meta: self.meta.finish(),
            statement,
            statement_values: self.statement_values,
            operation,
            table_name: self.table_name,
            db_name: self.db_name,
            db_structure: self.db_structure,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct HttpEventBuilder {
    kind: EventKind,
    meta: MetaBuilder,
    method: Option<HttpMethod>,
    url: Option<String>,
    headers: BTreeMap<String, String>,
    body: Option<String>,
}

impl HttpEventBuilder {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            meta: MetaBuilder::default(),
            method: None,
            url: None,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn event_id(mut self, event_id: Uuid) -> Self {
        self.meta.event_id = Some(event_id);
        self
    }

    pub fn timestamp(mut self, timestamp: f64) -> Self {
        self.meta.timestamp = Some(timestamp);
        self
    }

    pub fn correlation_context(mut self, ctx: CorrelationContext) -> Self {
        self.meta.correlation_context = ctx;
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Result<EventPayload, PayloadError> {
        let request_method = self.method.ok_or(PayloadError::MissingField("method"))?;
        let request_url = required(self.url, "url")?;

        let event = HttpEvent {
            meta: self.meta.finish(),
            request_method,
            request_url,
            request_headers: self.headers,
            request_payload: self.body,
        };

        Ok(match self.kind {
            EventKind::HttpClientEvent => EventPayload::HttpClient(event),
            _ => EventPayload::HttpServer(event),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AiChatCompletionEventBuilder {
    meta: MetaBuilder,
    model: Option<String>,
    completion_id: Option<String>,
    completion_created_timestamp: Option<i64>,
    completion_user_id: Option<String>,
    service_tier: Option<String>,
    num_completions: Option<u32>,
    max_tokens: Option<u64>,
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
    request_start_timestamp: Option<f64>,
    request_end_timestamp: Option<f64>,
    stack_frames: Vec<StackFrame>,
}

impl AiChatCompletionEventBuilder {
    pub fn event_id(mut self, event_id: Uuid) -> Self {
        self.meta.event_id = Some(event_id);
        self
    }

    pub fn timestamp(mut self, timestamp: f64) -> Self {
        self.meta.timestamp = Some(timestamp);
        self
    }

    pub fn correlation_context(mut self, ctx: CorrelationContext) -> Self {
        self.meta.correlation_context = ctx;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn completion_id(mut self, completion_id: impl Into<String>) -> Self {
        self.completion_id = Some(completion_id.into());
        self
    }

    pub fn completion_created_timestamp(mut self, created: i64) -> Self {
        self.completion_created_timestamp = Some(created);
        self
    }

    pub fn completion_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.completion_user_id = Some(user_id.into());
        self
    }

    pub fn service_tier(mut self, service_tier: impl Into<String>) -> Self {
        self.service_tier = Some(service_tier.into());
        self
    }

    pub fn num_completions(mut self, n: u32) -> Self {
        self.num_completions = Some(n);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Token usage as reported by the completion response.
    pub fn usage(mut self, prompt: u64, completion: u64, total: u64) -> Self {
        self.prompt_tokens = Some(prompt);
        self.completion_tokens = Some(completion);
        self.total_tokens = Some(total);
        self
    }

    pub fn request_timing(mut self, start: f64, end: f64) -> Self {
        self.request_start_timestamp = Some(start);
        self.request_end_timestamp = Some(end);
        self
    }

    pub fn stack_frame(mut self, frame: StackFrame) -> Self {
        self.stack_frames.push(frame);
        self
    }

    pub fn build(self) -> Result<EventPayload, PayloadError> {
        let model = required(self.model, "model")?;

        Ok(EventPayload::AiChatCompletion(AiChatCompletionEvent {
            meta: self.meta.finish(),
            model,
            completion_id: self.completion_id,
            completion_created_timestamp: self.completion_created_timestamp,
            completion_user_id: self.completion_user_id,
            service_tier: self.service_tier,
            num_completions: self.num_completions,
            max_tokens: self.max_tokens,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            request_start_timestamp: self.request_start_timestamp,
            request_end_timestamp: self.request_end_timestamp,
            stack_frames: self.stack_frames,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn select_event() -> EventPayload {
        EventPayload::database()
            .statement("SELECT * FROM users WHERE id = $1")
            .operation(DatabaseOperation::Select)
            .table_name("users")
            .db_name("app")
            .correlation_context([("session_id", "s-1")].into_iter().collect())
            .build()
            .expect("valid db event")
    }

    #[test]
    fn test_database_event_requires_statement() {
        let err = EventPayload::database()
            .operation(DatabaseOperation::Insert)
            .build()
            .unwrap_err();
        assert_eq!(err, PayloadError::MissingField("statement"));

        let err = EventPayload::database()
            .statement("   ")
            .operation(DatabaseOperation::Insert)
            .build()
            .unwrap_err();
        assert_eq!(err, PayloadError::MissingField("statement"));
    }

    #[test]
    fn test_database_event_requires_operation() {
        let err = EventPayload::database()
            .statement("DELETE FROM users")
            .build()
            .unwrap_err();
        assert_eq!(err, PayloadError::MissingField("operation"));
    }

    #[test]
    fn test_http_event_requires_method_and_url() {
        let err = EventPayload::http_server()
            .url("https://example.com")
            .build()
            .unwrap_err();
        assert_eq!(err, PayloadError::MissingField("method"));

        let err = EventPayload::http_client()
            .method(HttpMethod::Get)
            .build()
            .unwrap_err();
        assert_eq!(err, PayloadError::MissingField("url"));
    }

    #[test]
    fn test_ai_event_requires_model() {
        let err = EventPayload::ai_chat_completion()
            .usage(1, 2, 3)
            .build()
            .unwrap_err();
        assert_eq!(err, PayloadError::MissingField("model"));
    }

    #[test]
    fn test_builder_generates_envelope() {
        let a = select_event();
        let b = select_event();
        assert_ne!(a.event_id(), b.event_id());
        assert!(a.timestamp() > 0.0);
        assert_eq!(a.correlation_context().get("session_id"), Some("s-1"));
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(select_event().kind(), EventKind::DbEvent);

        let server = EventPayload::http_server()
            .method(HttpMethod::Post)
            .url("/api/orders")
            .build()
            .expect("valid");
        assert_eq!(server.kind(), EventKind::HttpServerEvent);

        let client = EventPayload::http_client()
            .method(HttpMethod::Get)
            .url("https://upstream.internal/health")
            .build()
            .expect("valid");
        assert_eq!(client.kind(), EventKind::HttpClientEvent);
    }

    #[test]
    fn test_to_wire_is_flat_and_tagged() {
        let event_id = Uuid::new_v4();
        let payload = EventPayload::database()
            .event_id(event_id)
            .timestamp(1718000000.5)
            .statement("INSERT INTO orders (id) VALUES ($1)")
            .operation(DatabaseOperation::Insert)
            .table_name("orders")
            .build()
            .expect("valid");

        let wire = payload.to_wire().expect("wire");
        assert_eq!(wire["event_type"], json!("db_event"));
        assert_eq!(wire["event_id"], json!(event_id.to_string()));
        assert_eq!(wire["timestamp"], json!(1718000000.5));
        assert_eq!(wire["operation"], json!("INSERT"));
        assert_eq!(wire["table_name"], json!("orders"));
        assert_eq!(wire["db_structure"], json!("SQL"));
        assert_eq!(wire["corr_ctx"], json!({}));
        assert!(!wire.contains_key("meta"));
        assert!(!wire.contains_key("db_name"));
    }

    #[test]
    fn test_ai_event_wire_fields() {
        let payload = EventPayload::ai_chat_completion()
            .model("gpt-4o")
            .completion_id("chatcmpl-123")
            .usage(12, 30, 42)
            .request_timing(10.0, 12.5)
            .stack_frame(StackFrame {
                filename: "app/handlers.py".to_string(),
                function: "summarize".to_string(),
                lineno: Some(88),
            })
            .build()
            .expect("valid");

        if let EventPayload::AiChatCompletion(ref event) = payload {
            assert_eq!(event.duration_seconds(), Some(2.5));
            assert_eq!(event.total_tokens(), Some(42));
        } else {
            panic!("wrong variant");
        }

        let wire = payload.to_wire().expect("wire");
        assert_eq!(wire["event_type"], json!("openai_chat_completion_event"));
        assert_eq!(wire["model"], json!("gpt-4o"));
        assert_eq!(wire["stack_frames"][0]["lineno"], json!(88));
    }

    #[test]
    fn test_from_wire_str_decodes_http_event() {
        let raw = r#"{
            "event_type": "http_client_event",
            "event_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "timestamp": 1718000001.0,
            "request_method": "get",
            "request_url": "https://api.example.com/v1/items"
        }"#;

        // Lowercase methods are not accepted by the wire format.
        assert!(matches!(
            EventPayload::from_wire_str(raw),
            Err(PayloadError::Decode(_))
        ));

        let raw = raw.replace("\"get\"", "\"GET\"");
        let payload = EventPayload::from_wire_str(&raw).expect("decodes");
        match payload {
            EventPayload::HttpClient(ref event) => {
                assert_eq!(event.method(), HttpMethod::Get);
                assert_eq!(event.url(), "https://api.example.com/v1/items");
                assert!(event.headers().is_empty());
                assert!(payload.correlation_context().is_empty());
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn test_from_wire_rejects_unknown_event_type() {
        let err = EventPayload::from_wire(json!({"event_type": "browser_event"})).unwrap_err();
        assert_eq!(err, PayloadError::UnknownEventType("browser_event".to_string()));

        let err = EventPayload::from_wire(json!({"statement": "SELECT 1"})).unwrap_err();
        assert_eq!(err, PayloadError::MissingField("event_type"));
    }

    #[test]
    fn test_from_str_parsers() {
        assert_eq!(
            "select".parse::<DatabaseOperation>().expect("parses"),
            DatabaseOperation::Select
        );
        assert_eq!(" Patch ".parse::<HttpMethod>().expect("parses"), HttpMethod::Patch);
        assert!("MERGE".parse::<DatabaseOperation>().is_err());
    }

    #[test]
    fn test_event_kind_wire_names() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_wire_name(kind.wire_name()), Some(kind));
        }
        assert_eq!(EventKind::from_wire_name("unknown"), None);
    }
}
