// src/lib.rs
//! Callscope Capture Library
//!
//! Transparent call interception and durable capture: wraps methods on
//! live client objects (or standalone functions) so every invocation, with
//! its arguments, outcome, timing, and errors, becomes one structured
//! record, without changing the wrapped callable's observable behavior.
//!
//! # Architecture
//!
//! The crate is structured into two core modules plus support:
//!
//! - **interception**: outcome classification, the wrapping decorator,
//!   sequence tapping, and the client/method-path registry
//! - **recording**: the capture record model and the sink implementations
//!   (stream, file, memory, fan-out, rotating directory, named pipe)
//! - **observability**: tracing setup for host programs
//! - **utils**: configuration and error types

// Public module exports
pub mod interception;
pub mod observability;
pub mod recording;
pub mod utils;

// Re-export commonly used types
pub use interception::{
    intercept, wrap_fn, CallError, CallSequence, ClientRegistry, Identity, InterceptTarget,
    Interceptable, Intercepted, MethodPath, MethodTable, Outcome, Resolved,
};
pub use recording::{CaptureRecord, RecordBuilder, RotatingSink, RotatingSinkConfig, Sink};
pub use utils::config::CaptureConfig;
pub use utils::errors::{CaptureError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
