// src/interception/stream_tap.rs
//! Streaming tap for sequence outcomes
//!
//! Wraps a sequence in a decorator that observes every item without
//! altering delivery, then reports completion exactly once:
//!
//! - natural exhaustion reports all buffered items
//! - consumer abandonment (drop before exhaustion) reports the items
//!   consumed so far
//! - a mid-stream failure reports the error and re-raises it unchanged
//!
//! Any out-of-band result accessor the producer exposes alongside the
//! stream is forwarded untouched, so its callability and binding survive
//! tapping.

use crate::interception::outcome::{CallError, CallResult};
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Boxed stream of call items.
pub type ValueStream = Pin<Box<dyn Stream<Item = CallResult> + Send>>;

/// Out-of-band result accessor some producers expose next to their stream.
pub type AuxAccessor = Arc<dyn Fn() -> Value + Send + Sync>;

/// Completion callback: buffered items plus the error that ended the
/// sequence, if any. Invoked exactly once per tapped sequence.
pub(crate) type CompletionFn = Box<dyn FnOnce(Vec<Value>, Option<CallError>) + Send>;

/// A sequence outcome: the item stream plus any auxiliary accessor the
/// producer exposes alongside it.
pub struct CallSequence {
    stream: ValueStream,
    aux: Option<AuxAccessor>,
}

impl CallSequence {
    /// Wrap a raw item stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = CallResult> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
            aux: None,
        }
    }

    /// Attach the producer's out-of-band result accessor.
    pub fn with_aux(mut self, aux: AuxAccessor) -> Self {
        self.aux = Some(aux);
        self
    }

    /// The auxiliary accessor, if the producer exposed one.
    pub fn aux(&self) -> Option<&AuxAccessor> {
        self.aux.as_ref()
    }

    fn into_parts(self) -> (ValueStream, Option<AuxAccessor>) {
        (self.stream, self.aux)
    }
}

impl Stream for CallSequence {
    type Item = CallResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

/// Tap a sequence, reporting completion through `on_done` exactly once.
///
/// The auxiliary accessor is carried over to the tapped sequence untouched.
pub(crate) fn tap(sequence: CallSequence, on_done: CompletionFn) -> CallSequence {
    let (stream, aux) = sequence.into_parts();
    CallSequence {
        stream: Box::pin(TappedStream {
            inner: stream,
            items: Vec::new(),
            on_done: Some(on_done),
        }),
        aux,
    }
}

/// Stream decorator that buffers items and fires `on_done` exactly once.
struct TappedStream {
    inner: ValueStream,
    items: Vec<Value>,
    on_done: Option<CompletionFn>,
}

impl TappedStream {
    fn report(&mut self, error: Option<CallError>) {
        if let Some(on_done) = self.on_done.take() {
            on_done(std::mem::take(&mut self.items), error);
        }
    }
}

impl Stream for TappedStream {
    type Item = CallResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        // Completion already reported; pass any further polls straight through.
        if this.on_done.is_none() {
            return this.inner.as_mut().poll_next(cx);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(item))) => {
                this.items.push(item.clone());
                Poll::Ready(Some(Ok(item)))
            }
            Poll::Ready(Some(Err(error))) => {
                this.report(Some(error.clone()));
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.report(None);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TappedStream {
    fn drop(&mut self) {
        // Consumer abandoned the sequence: completion with the items
        // observed so far. No-op when already reported.
        self.report(None);
    }
}
