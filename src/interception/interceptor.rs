// src/interception/interceptor.rs
//! Interception wrapper
//!
//! [`Intercepted`] decorates any [`Interceptable`] so that every invocation
//! produces exactly one capture record, whatever shape the call resolves
//! through:
//!
//! - immediate value or error: record written synchronously
//! - deferred value: record written when the future settles, or when the
//!   caller drops it unsettled
//! - sequence (immediate or deferred): record written once iteration ends,
//!   whether drained, abandoned, or errored
//!
//! Capture is purely observational: values and errors reach the caller
//! unchanged, and timing always covers call start to the terminal event.

use crate::interception::outcome::{DeferredResult, Outcome, Resolved};
use crate::interception::registry::{ClientRegistry, MethodPath, MethodTable};
use crate::interception::stream_tap::{self, CallSequence};
use crate::recording::record::{CaptureRecord, RecordBuilder};
use crate::recording::sink::Sink;
use crate::utils::errors::Result;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, error};

/// Identity attributed to one intercepted invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Client label: the wrapped object's type name, or a derived
    /// `"<provider>/<id>"` label for standalone functions.
    pub client: String,

    /// Dotted method path, or the function's own name.
    pub method: String,
}

impl Identity {
    pub fn new(client: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            method: method.into(),
        }
    }
}

/// A callable the pipeline can wrap.
pub trait Interceptable: Send + Sync {
    fn invoke(&self, args: Vec<Value>) -> Outcome;
}

impl<F> Interceptable for F
where
    F: Fn(Vec<Value>) -> Outcome + Send + Sync,
{
    fn invoke(&self, args: Vec<Value>) -> Outcome {
        self(args)
    }
}

/// How an invocation is labeled and its request derived.
enum Labeling {
    /// Object-method patch: identity fixed at wrap time.
    Method(Identity),

    /// Standalone function: client label derived per call from the first
    /// argument.
    Function { method: String },
}

/// Decorator producing exactly one capture record per invocation.
///
/// Implements [`Interceptable`] itself, so it can occupy a method-table
/// slot in place of the callable it wraps.
pub struct Intercepted {
    inner: Arc<dyn Interceptable>,
    labeling: Labeling,
    sink: Arc<dyn Sink>,
}

impl Intercepted {
    /// Wrap an object method with a fixed identity.
    pub fn method(inner: Arc<dyn Interceptable>, identity: Identity, sink: Arc<dyn Sink>) -> Self {
        Self {
            inner,
            labeling: Labeling::Method(identity),
            sink,
        }
    }

    /// Wrap a standalone function; the method label falls back to
    /// `"anonymous"` and the client label is derived per call.
    pub fn function(inner: Arc<dyn Interceptable>, name: Option<&str>, sink: Arc<dyn Sink>) -> Self {
        Self {
            inner,
            labeling: Labeling::Function {
                method: name.unwrap_or("anonymous").to_string(),
            },
            sink,
        }
    }

    fn derive_identity(&self, args: &[Value]) -> Identity {
        match &self.labeling {
            Labeling::Method(identity) => identity.clone(),
            Labeling::Function { method } => {
                let client = args
                    .first()
                    .and_then(|arg| {
                        let provider = arg.get("provider")?.as_str()?;
                        let id = arg.get("id")?.as_str()?;
                        Some(format!("{}/{}", provider, id))
                    })
                    .unwrap_or_else(|| "Unknown".to_string());
                Identity::new(client, method.clone())
            }
        }
    }

    fn derive_request(&self, args: &[Value]) -> Value {
        match &self.labeling {
            // Object-method call: a single object argument is the request
            // itself.
            Labeling::Method(_) => {
                if args.len() == 1 && args[0].is_object() {
                    args[0].clone()
                } else {
                    json!({ "args": args })
                }
            }
            // Standalone function: the options object follows the subject
            // argument.
            Labeling::Function { .. } => {
                if args.len() >= 2 && args[1].is_object() {
                    args[1].clone()
                } else {
                    json!({ "args": args })
                }
            }
        }
    }
}

impl Interceptable for Intercepted {
    fn invoke(&self, args: Vec<Value>) -> Outcome {
        let identity = self.derive_identity(&args);
        let request = self.derive_request(&args);
        // Built before the call so the timestamp marks capture-start and
        // the duration spans the full lifecycle.
        let builder = RecordBuilder::new(identity, request);
        let sink = Arc::clone(&self.sink);

        match self.inner.invoke(args) {
            Outcome::Immediate(Ok(value)) => {
                emit(&sink, builder.success(value.clone()));
                Outcome::Immediate(Ok(value))
            }
            Outcome::Immediate(Err(err)) => {
                emit(&sink, builder.failure(&err));
                Outcome::Immediate(Err(err))
            }
            Outcome::Deferred(future) => Outcome::Deferred(Box::pin(DeferredGuard {
                inner: future,
                pending: Some((builder, sink)),
            })),
            Outcome::Sequence(sequence) => {
                Outcome::Sequence(tap_sequence(sequence, builder, sink))
            }
        }
    }
}

/// Deferred decorator that settles the record exactly once.
///
/// Settlement writes the success or failure record, or hands the builder
/// over to the stream tap when the call resolved into a sequence. Dropping
/// the future before settlement writes a completion record with no
/// response, the same consumed-state pattern the stream tap uses.
struct DeferredGuard {
    inner: BoxFuture<'static, DeferredResult>,
    pending: Option<(RecordBuilder, Arc<dyn Sink>)>,
}

impl Future for DeferredGuard {
    type Output = DeferredResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.inner.as_mut().poll(cx) {
            Poll::Ready(result) => {
                // Record already settled; pass any further polls through.
                let Some((builder, sink)) = this.pending.take() else {
                    return Poll::Ready(result);
                };
                Poll::Ready(match result {
                    Ok(Resolved::Value(value)) => {
                        emit(&sink, builder.success(value.clone()));
                        Ok(Resolved::Value(value))
                    }
                    Ok(Resolved::Sequence(sequence)) => {
                        Ok(Resolved::Sequence(tap_sequence(sequence, builder, sink)))
                    }
                    Err(err) => {
                        emit(&sink, builder.failure(&err));
                        Err(err)
                    }
                })
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        // Caller abandoned the deferred result before settlement: still
        // exactly one record, a completion with no response.
        if let Some((builder, sink)) = self.pending.take() {
            emit(&sink, builder.success(Value::Null));
        }
    }
}

/// Tap a sequence so its completion writes the record.
fn tap_sequence(
    sequence: CallSequence,
    builder: RecordBuilder,
    sink: Arc<dyn Sink>,
) -> CallSequence {
    stream_tap::tap(
        sequence,
        Box::new(move |items, err| {
            let record = match err {
                Some(err) => builder.failure(&err),
                None => builder.items(items),
            };
            emit(&sink, record);
        }),
    )
}

/// Write a record, absorbing sink failures so capture never alters the
/// caller-observed result.
fn emit(sink: &Arc<dyn Sink>, record: CaptureRecord) {
    if let Err(e) = sink.write(&record) {
        error!(
            "Failed to write capture record for {}.{}: {}",
            record.client, record.method, e
        );
    }
}

/// A client object whose method slots can be intercepted.
pub trait InterceptTarget {
    /// Runtime type name used for registry lookup.
    fn client_type(&self) -> &str;

    /// Mutable access to the client's method slots.
    fn method_table(&mut self) -> &mut MethodTable;
}

/// Patch a client's methods in place so every call is captured to `sink`.
///
/// `paths` overrides the registry lookup; with `None`, the client's type
/// name must be present in `registry`. All configuration errors surface
/// here, before any call is made and before anything is written, and a
/// bad path leaves the client entirely unpatched.
pub fn intercept<T: InterceptTarget>(
    target: &mut T,
    sink: Arc<dyn Sink>,
    registry: &ClientRegistry,
    paths: Option<&[MethodPath]>,
) -> Result<()> {
    let client_type = target.client_type().to_string();
    let paths: Vec<MethodPath> = match paths {
        Some(paths) => paths.to_vec(),
        None => registry.methods_for(&client_type)?.to_vec(),
    };

    let table = target.method_table();
    // Validate every path before swapping any slot.
    for path in &paths {
        table.resolve_slot(path)?;
    }
    for path in &paths {
        let slot = table.resolve_slot(path)?;
        let original = Arc::clone(slot);
        *slot = Arc::new(Intercepted::method(
            original,
            Identity::new(client_type.clone(), path.to_string()),
            Arc::clone(&sink),
        ));
        debug!("Intercepted {}.{}", client_type, path);
    }
    Ok(())
}

/// Wrap a standalone callable, inferring identity per call.
pub fn wrap_fn<F>(name: Option<&str>, callable: F, sink: Arc<dyn Sink>) -> Intercepted
where
    F: Fn(Vec<Value>) -> Outcome + Send + Sync + 'static,
{
    Intercepted::function(Arc::new(callable), name, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::outcome::CallError;
    use crate::recording::sink::MemorySink;
    use futures::StreamExt;
    use serde_json::json;

    struct TestClient {
        table: MethodTable,
    }

    impl TestClient {
        fn new() -> Self {
            let mut table = MethodTable::new();
            table.insert_handler(
                &MethodPath::parse("messages.create").unwrap(),
                Arc::new(|_args: Vec<Value>| {
                    Outcome::deferred_value(async { Ok(json!({"id": "msg_1"})) })
                }),
            );
            table.insert_handler(
                &MethodPath::parse("messages.stream").unwrap(),
                Arc::new(|_args: Vec<Value>| {
                    Outcome::sequence(CallSequence::new(futures::stream::iter(vec![
                        Ok(json!("a")),
                        Ok(json!("b")),
                    ])))
                }),
            );
            table.insert_handler(
                &MethodPath::parse("completions.create").unwrap(),
                Arc::new(|_args: Vec<Value>| Outcome::value(json!("done"))),
            );
            Self { table }
        }
    }

    impl InterceptTarget for TestClient {
        fn client_type(&self) -> &str {
            "Anthropic"
        }
        fn method_table(&mut self) -> &mut MethodTable {
            &mut self.table
        }
    }

    fn wrapped(outcome: impl Fn(Vec<Value>) -> Outcome + Send + Sync + 'static)
        -> (Intercepted, Arc<MemorySink>)
    {
        let sink = Arc::new(MemorySink::new());
        let intercepted = Intercepted::method(
            Arc::new(outcome),
            Identity::new("Anthropic", "messages.create"),
            Arc::clone(&sink) as Arc<dyn Sink>,
        );
        (intercepted, sink)
    }

    #[test]
    fn test_immediate_success_writes_one_record() {
        let (intercepted, sink) = wrapped(|_| Outcome::value(json!({"ok": true})));
        let outcome = intercepted.invoke(vec![json!({"model": "m-1"})]);

        match outcome {
            Outcome::Immediate(Ok(value)) => assert_eq!(value, json!({"ok": true})),
            other => panic!("value must pass through unchanged, got {:?}", other),
        }
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client, "Anthropic");
        assert_eq!(records[0].method, "messages.create");
        // Single object argument is the request verbatim.
        assert_eq!(records[0].request, json!({"model": "m-1"}));
        assert!(records[0].error.is_none());
    }

    #[test]
    fn test_multiple_args_wrapped_in_args_mapping() {
        let (intercepted, sink) = wrapped(|_| Outcome::value(json!(null)));
        intercepted.invoke(vec![json!("a"), json!(2)]);
        assert_eq!(sink.records()[0].request, json!({"args": ["a", 2]}));
    }

    #[test]
    fn test_sync_error_fidelity() {
        let (intercepted, sink) = wrapped(|_| Outcome::error(CallError::message("boom")));
        let outcome = intercepted.invoke(vec![]);

        match outcome {
            Outcome::Immediate(Err(err)) => {
                assert_eq!(err, CallError::message("boom"));
            }
            other => panic!("error must pass through unchanged, got {:?}", other),
        }
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error.as_deref(), Some("Error: boom"));
        assert_eq!(records[0].response, Value::Null);
    }

    #[tokio::test]
    async fn test_deferred_success_written_on_settlement() {
        let (intercepted, sink) = wrapped(|_| {
            Outcome::deferred_value(async { Ok(json!({"id": "msg_1"})) })
        });

        let Outcome::Deferred(future) = intercepted.invoke(vec![json!({"model": "m"})]) else {
            panic!("expected deferred outcome");
        };
        // Not written until the future settles.
        assert!(sink.is_empty());

        match future.await {
            Ok(Resolved::Value(value)) => assert_eq!(value, json!({"id": "msg_1"})),
            _ => panic!("expected resolved value"),
        }
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].response, json!({"id": "msg_1"}));
    }

    #[test]
    fn test_dropped_deferred_still_writes_one_record() {
        let (intercepted, sink) = wrapped(|_| {
            Outcome::deferred_value(async { Ok(json!({"id": "msg_1"})) })
        });

        let outcome = intercepted.invoke(vec![json!({"model": "m"})]);
        drop(outcome);

        // Abandonment before settlement is a completion with no response.
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response, Value::Null);
        assert!(records[0].error.is_none());
    }

    #[tokio::test]
    async fn test_deferred_rejection_fidelity() {
        let (intercepted, sink) = wrapped(|_| {
            Outcome::deferred_value(async {
                Err(CallError::new("RateLimitError", "slow down"))
            })
        });

        let Outcome::Deferred(future) = intercepted.invoke(vec![]) else {
            panic!("expected deferred outcome");
        };
        let err = future.await.unwrap_err();
        assert_eq!(err, CallError::new("RateLimitError", "slow down"));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error.as_deref(), Some("RateLimitError: slow down"));
        assert_eq!(records[0].response, Value::Null);
    }

    #[tokio::test]
    async fn test_sequence_record_written_after_drain() {
        let (intercepted, sink) = wrapped(|_| {
            Outcome::sequence(CallSequence::new(futures::stream::iter(vec![
                Ok(json!("a")),
                Ok(json!("b")),
                Ok(json!("c")),
            ])))
        });

        let Outcome::Sequence(mut sequence) = intercepted.invoke(vec![]) else {
            panic!("expected sequence outcome");
        };
        let mut seen = Vec::new();
        while let Some(item) = sequence.next().await {
            // Nothing written while items are still flowing.
            assert!(sink.is_empty());
            seen.push(item.unwrap());
        }
        drop(sequence);

        assert_eq!(seen, vec![json!("a"), json!("b"), json!("c")]);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response, json!(["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_abandoned_sequence_still_writes_exactly_once() {
        let (intercepted, sink) = wrapped(|_| {
            Outcome::sequence(CallSequence::new(futures::stream::iter(
                (0..100).map(|i| Ok(json!(i))).collect::<Vec<_>>(),
            )))
        });

        let Outcome::Sequence(mut sequence) = intercepted.invoke(vec![]) else {
            panic!("expected sequence outcome");
        };
        sequence.next().await;
        sequence.next().await;
        drop(sequence);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response, json!([0, 1]));
    }

    #[tokio::test]
    async fn test_deferred_sequence_taps_after_resolution() {
        let (intercepted, sink) = wrapped(|_| {
            Outcome::deferred(async {
                Ok(Resolved::Sequence(CallSequence::new(
                    futures::stream::iter(vec![Ok(json!("chunk"))]),
                )))
            })
        });

        let Outcome::Deferred(future) = intercepted.invoke(vec![]) else {
            panic!("expected deferred outcome");
        };
        let Ok(Resolved::Sequence(mut sequence)) = future.await else {
            panic!("expected resolved sequence");
        };
        assert!(sink.is_empty());
        while sequence.next().await.is_some() {}
        drop(sequence);

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].response, json!(["chunk"]));
    }

    #[test]
    fn test_function_identity_from_first_argument() {
        let sink = Arc::new(MemorySink::new());
        let f = wrap_fn(
            Some("generateText"),
            |_args| Outcome::value(json!("ok")),
            Arc::clone(&sink) as Arc<dyn Sink>,
        );

        f.invoke(vec![
            json!({"provider": "anthropic", "id": "claude-3"}),
            json!({"prompt": "hi"}),
        ]);
        let records = sink.records();
        assert_eq!(records[0].client, "anthropic/claude-3");
        assert_eq!(records[0].method, "generateText");
        // Second argument is the options object, used as the request.
        assert_eq!(records[0].request, json!({"prompt": "hi"}));
    }

    #[test]
    fn test_function_identity_fallbacks() {
        let sink = Arc::new(MemorySink::new());
        let f = wrap_fn(None, |_args| Outcome::value(json!(null)), {
            Arc::clone(&sink) as Arc<dyn Sink>
        });

        f.invoke(vec![json!("just a string")]);
        let records = sink.records();
        assert_eq!(records[0].client, "Unknown");
        assert_eq!(records[0].method, "anonymous");
        assert_eq!(records[0].request, json!({"args": ["just a string"]}));
    }

    #[test]
    fn test_function_array_second_arg_not_a_request() {
        let sink = Arc::new(MemorySink::new());
        let f = wrap_fn(Some("f"), |_args| Outcome::value(json!(null)), {
            Arc::clone(&sink) as Arc<dyn Sink>
        });

        f.invoke(vec![json!({"provider": "p", "id": "m"}), json!([1, 2])]);
        assert_eq!(
            sink.records()[0].request,
            json!({"args": [{"provider": "p", "id": "m"}, [1, 2]]})
        );
    }

    #[tokio::test]
    async fn test_intercept_patches_registered_methods() {
        let mut client = TestClient::new();
        let sink = Arc::new(MemorySink::new());
        intercept(
            &mut client,
            Arc::clone(&sink) as Arc<dyn Sink>,
            &ClientRegistry::builtin(),
            None,
        )
        .unwrap();

        let create = client
            .table
            .handler(&MethodPath::parse("messages.create").unwrap())
            .unwrap();
        let Outcome::Deferred(future) = create.invoke(vec![json!({"model": "m"})]) else {
            panic!("patched method must preserve its outcome shape");
        };
        future.await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client, "Anthropic");
        assert_eq!(records[0].method, "messages.create");
    }

    #[test]
    fn test_intercept_unknown_type_fails_before_patching() {
        struct UnknownClient {
            table: MethodTable,
        }
        impl InterceptTarget for UnknownClient {
            fn client_type(&self) -> &str {
                "MysteryClient"
            }
            fn method_table(&mut self) -> &mut MethodTable {
                &mut self.table
            }
        }

        let sink = Arc::new(MemorySink::new());
        let mut client = UnknownClient {
            table: MethodTable::new(),
        };
        let err = intercept(
            &mut client,
            Arc::clone(&sink) as Arc<dyn Sink>,
            &ClientRegistry::builtin(),
            None,
        )
        .unwrap_err();

        assert!(matches!(err, crate::utils::errors::CaptureError::ConfigError(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_intercept_bad_path_leaves_client_unpatched() {
        let mut client = TestClient::new();
        let sink = Arc::new(MemorySink::new());
        let paths = [
            MethodPath::parse("completions.create").unwrap(),
            MethodPath::parse("missing.method").unwrap(),
        ];
        let err = intercept(
            &mut client,
            Arc::clone(&sink) as Arc<dyn Sink>,
            &ClientRegistry::new(),
            Some(&paths),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::utils::errors::CaptureError::PathResolution(_)
        ));

        // The valid method still invokes the original, uncaptured.
        let original = client
            .table
            .handler(&MethodPath::parse("completions.create").unwrap())
            .unwrap();
        original.invoke(vec![]);
        assert!(sink.is_empty());
    }
}
