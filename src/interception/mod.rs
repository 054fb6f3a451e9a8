// src/interception/mod.rs
//! Call interception layer
//!
//! Transparently wraps callables so every invocation is captured as a
//! structured record without changing observable behavior:
//!
//! - **Outcome**: tagged call shapes (immediate, deferred, sequence)
//! - **Interceptor**: the wrapping decorator and patch entry points
//! - **Stream Tap**: sequence observation with exactly-once completion
//! - **Registry**: client type to method path mapping and path resolution
//!
//! # Architecture
//!
//! ```text
//! caller -> Intercepted::invoke -> inner callable
//!               |                       |
//!               |             Outcome (tagged by adapter)
//!               |                       |
//!               +- Immediate --------> record written now
//!               +- Deferred  --------> record written on settlement
//!               +- Sequence  - tap --> record written once iteration ends
//! ```

pub mod interceptor;
pub mod outcome;
pub mod registry;
pub mod stream_tap;

// Re-export commonly used types
pub use interceptor::{intercept, wrap_fn, Identity, InterceptTarget, Interceptable, Intercepted};
pub use outcome::{CallError, CallResult, DeferredResult, Outcome, Resolved};
pub use registry::{ClientRegistry, MethodNode, MethodPath, MethodTable};
pub use stream_tap::{AuxAccessor, CallSequence, ValueStream};
