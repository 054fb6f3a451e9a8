// src/interception/outcome.rs
//! Tagged call outcomes
//!
//! Adapters tag every return value with the shape they know it has instead
//! of the pipeline probing for promise- or iterator-like capabilities:
//!
//! - **Immediate**: value (or error) produced synchronously
//! - **Deferred**: value still being produced, resolved later
//! - **Sequence**: items produced incrementally as a stream
//!
//! A deferred outcome is classified a second time on resolution: it may
//! settle into a plain value or into a still-pending sequence.

use crate::interception::stream_tap::CallSequence;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;

/// Result of a single call or stream step.
pub type CallResult = std::result::Result<Value, CallError>;

/// Result of awaiting a deferred outcome.
pub type DeferredResult = std::result::Result<Resolved, CallError>;

/// Error raised by an intercepted call.
///
/// The kind and message are carried separately so records can render the
/// `"<kind>: <message>"` form while the caller still receives the error
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    /// Error kind, e.g. `"Error"` or `"RateLimitError"`.
    pub kind: String,

    /// Human-readable message.
    pub message: String,
}

impl CallError {
    /// Create an error with an explicit kind.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an error with the default `"Error"` kind.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CallError {}

/// Shape of a call's return value, tagged by the adapter.
pub enum Outcome {
    /// Value or error produced synchronously.
    Immediate(CallResult),

    /// Value still being produced; settles into a [`Resolved`].
    Deferred(BoxFuture<'static, DeferredResult>),

    /// Sequence of items produced incrementally.
    Sequence(CallSequence),
}

/// What a deferred outcome settled into.
pub enum Resolved {
    /// A plain value.
    Value(Value),

    /// A still-pending sequence; iteration has not started yet.
    Sequence(CallSequence),
}

impl Outcome {
    /// Immediate successful value.
    pub fn value(value: Value) -> Self {
        Outcome::Immediate(Ok(value))
    }

    /// Immediate (synchronous) failure.
    pub fn error(error: CallError) -> Self {
        Outcome::Immediate(Err(error))
    }

    /// Deferred outcome from any future.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = DeferredResult> + Send + 'static,
    {
        Outcome::Deferred(Box::pin(future))
    }

    /// Deferred outcome that always settles into a plain value.
    pub fn deferred_value<F>(future: F) -> Self
    where
        F: Future<Output = CallResult> + Send + 'static,
    {
        Outcome::Deferred(Box::pin(async move {
            future.await.map(Resolved::Value)
        }))
    }

    /// Immediate sequence outcome.
    pub fn sequence(sequence: CallSequence) -> Self {
        Outcome::Sequence(sequence)
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Immediate(result) => f.debug_tuple("Immediate").field(result).finish(),
            Outcome::Deferred(_) => f.write_str("Deferred(..)"),
            Outcome::Sequence(_) => f.write_str("Sequence(..)"),
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolved::Sequence(_) => f.write_str("Sequence(..)"),
        }
    }
}
