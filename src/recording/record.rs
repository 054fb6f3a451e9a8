// src/recording/record.rs
//! Capture record model and normalization
//!
//! One record is built per intercepted invocation, stamped with process
//! identity and wall/monotonic timing, then serialized as a single JSON
//! line:
//!
//! ```json
//! {"timestamp":"...","hostname":"...","user":"...","pid":123,
//!  "client":"...","method":"...","request":{},"response":null,
//!  "durationMs":1.5,"error":null}
//! ```

use crate::interception::interceptor::Identity;
use crate::interception::outcome::CallError;
use crate::utils::errors::{CaptureError, Result};
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

/// Process identity metadata, fixed for the lifetime of the process.
struct ProcessIdentity {
    hostname: String,
    user: String,
    pid: u32,
}

static PROCESS_IDENTITY: Lazy<ProcessIdentity> = Lazy::new(|| ProcessIdentity {
    hostname: nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string()),
    user: nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|u| u.name)
        .unwrap_or_else(|| "unknown".to_string()),
    pid: std::process::id(),
});

/// Normalized event describing one intercepted invocation.
///
/// Immutable once built; field names match the on-the-wire JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Capture-start instant, RFC 3339 with millisecond precision.
    pub timestamp: String,

    /// Host the process runs on.
    pub hostname: String,

    /// User the process runs as.
    pub user: String,

    /// Process ID.
    pub pid: u32,

    /// Label of the wrapped entity (client type or `"<provider>/<id>"`).
    pub client: String,

    /// Dotted method path or function name.
    pub method: String,

    /// Derived request mapping.
    pub request: Value,

    /// Resolved value, ordered sequence items, or null on failure.
    pub response: Value,

    /// Wall-clock elapsed from call start to the terminal event,
    /// monotonic-clock based.
    #[serde(rename = "durationMs")]
    pub duration_ms: f64,

    /// `"<kind>: <message>"` on failure, null on success.
    pub error: Option<String>,
}

impl CaptureRecord {
    /// Serialize to the single-line JSON form sinks emit.
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| CaptureError::SerializationFailed(format!("record encoding failed: {}", e)))
    }
}

/// Conversion hook for values that know their own wire form.
///
/// Adapters call this at the seam when a producer's value carries its own
/// transportable representation; the hook's output is treated as terminal
/// and only re-normalized structurally. No cycle detection is performed, so
/// implementations must expand to acyclic structures.
pub trait Transportable {
    fn to_transportable(&self) -> Value;
}

impl Transportable for Value {
    fn to_transportable(&self) -> Value {
        self.clone()
    }
}

/// Recursively normalize a response value.
///
/// Null and primitives pass through, arrays normalize element-wise, objects
/// key-wise with insertion order preserved.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect())
        }
        other => other,
    }
}

/// Builder carrying everything known at call start.
///
/// Created before the wrapped callable runs so `timestamp` marks
/// capture-start and `duration_ms` covers the full lifecycle, including
/// streaming. The builder is `Send` and moves into deferred continuations.
pub struct RecordBuilder {
    client: String,
    method: String,
    request: Value,
    timestamp: String,
    started_at: Instant,
}

impl RecordBuilder {
    /// Start a record at the current instant.
    pub fn new(identity: Identity, request: Value) -> Self {
        Self {
            client: identity.client,
            method: identity.method,
            request,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            started_at: Instant::now(),
        }
    }

    /// Finish with a resolved value.
    pub fn success(self, response: Value) -> CaptureRecord {
        let response = normalize(response);
        self.finish(response, None)
    }

    /// Finish with the ordered items a tapped sequence yielded.
    pub fn items(self, items: Vec<Value>) -> CaptureRecord {
        let response = normalize(Value::Array(items));
        self.finish(response, None)
    }

    /// Finish with a failure; the response is null.
    pub fn failure(self, error: &CallError) -> CaptureRecord {
        self.finish(Value::Null, Some(error.to_string()))
    }

    fn finish(self, response: Value, error: Option<String>) -> CaptureRecord {
        let identity = &*PROCESS_IDENTITY;
        CaptureRecord {
            timestamp: self.timestamp,
            hostname: identity.hostname.clone(),
            user: identity.user.clone(),
            pid: identity.pid,
            client: self.client,
            method: self.method,
            request: self.request,
            response,
            duration_ms: self.started_at.elapsed().as_secs_f64() * 1000.0,
            error,
        }
    }
}
