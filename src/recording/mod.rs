// src/recording/mod.rs
//! Record model and durable output
//!
//! One capture record per intercepted invocation, emitted as a single JSON
//! line through a [`Sink`]:
//!
//! - **Record**: the normalized capture event and its builder
//! - **Stream/File/Memory/Fanout sinks**: passthrough and append-only output
//! - **Rotating Sink**: size-bounded directory of append-only files
//! - **Pipe Sink**: best-effort non-blocking delivery to a named pipe

pub mod pipe_sink;
pub mod record;
pub mod rotating_sink;
pub mod sink;

// Re-export commonly used types
pub use pipe_sink::PipeSink;
pub use record::{normalize, CaptureRecord, RecordBuilder, Transportable};
pub use rotating_sink::{RotatingSink, RotatingSinkConfig};
pub use sink::{FanoutSink, FileSink, MemorySink, Sink, StreamSink};
