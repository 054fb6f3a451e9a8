// src/interception/registry.rs
//! Client registry and method path resolution
//!
//! A client exposes its callable slots through a nested [`MethodTable`];
//! dot-separated [`MethodPath`]s address slots inside it. The
//! [`ClientRegistry`] maps client type names to the paths worth
//! intercepting, supplied explicitly at configuration time with a built-in
//! table for known client types.

use crate::interception::interceptor::Interceptable;
use crate::utils::errors::{CaptureError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Parsed dot-separated method path, e.g. `"chat.completions.create"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodPath {
    segments: Vec<String>,
}

impl MethodPath {
    /// Parse a dotted path. Empty paths and empty segments are
    /// configuration errors.
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(CaptureError::PathResolution(
                "method path must not be empty".to_string(),
            ));
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(CaptureError::PathResolution(format!(
                "invalid method path '{}'",
                path
            )));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for MethodPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// One slot in a client's method table.
pub enum MethodNode {
    /// Intermediate namespace holding further slots.
    Namespace(MethodTable),

    /// Callable handler occupying this slot.
    Handler(Arc<dyn Interceptable>),
}

/// Nested table of a client's callable slots.
#[derive(Default)]
pub struct MethodTable {
    entries: HashMap<String, MethodNode>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler at `path`, creating intermediate namespaces.
    pub fn insert_handler(&mut self, path: &MethodPath, handler: Arc<dyn Interceptable>) {
        Self::insert_inner(self, path.segments(), handler);
    }

    fn insert_inner(table: &mut MethodTable, segments: &[String], handler: Arc<dyn Interceptable>) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        if rest.is_empty() {
            table
                .entries
                .insert(head.clone(), MethodNode::Handler(handler));
            return;
        }
        let node = table
            .entries
            .entry(head.clone())
            .or_insert_with(|| MethodNode::Namespace(MethodTable::new()));
        if !matches!(node, MethodNode::Namespace(_)) {
            *node = MethodNode::Namespace(MethodTable::new());
        }
        if let MethodNode::Namespace(next) = node {
            Self::insert_inner(next, rest, handler);
        }
    }

    /// Resolve the reassignable slot a path points at.
    ///
    /// Walks intermediate namespaces and returns the handler slot itself so
    /// the caller can swap the handler in place. Fails if an intermediate
    /// segment is missing or already holds a handler, or if the final node
    /// is not a handler.
    pub fn resolve_slot(&mut self, path: &MethodPath) -> Result<&mut Arc<dyn Interceptable>> {
        Self::resolve_inner(self, path.segments(), path)
    }

    fn resolve_inner<'a>(
        table: &'a mut MethodTable,
        segments: &[String],
        full: &MethodPath,
    ) -> Result<&'a mut Arc<dyn Interceptable>> {
        let Some((head, rest)) = segments.split_first() else {
            return Err(CaptureError::PathResolution(
                "method path must not be empty".to_string(),
            ));
        };
        if rest.is_empty() {
            return match table.entries.get_mut(head) {
                Some(MethodNode::Handler(handler)) => Ok(handler),
                Some(MethodNode::Namespace(_)) => Err(CaptureError::PathResolution(format!(
                    "'{}' in path '{}' is not callable",
                    head, full
                ))),
                None => Err(CaptureError::PathResolution(format!(
                    "'{}' not found in path '{}'",
                    head, full
                ))),
            };
        }
        match table.entries.get_mut(head) {
            Some(MethodNode::Namespace(next)) => Self::resolve_inner(next, rest, full),
            Some(MethodNode::Handler(_)) => Err(CaptureError::PathResolution(format!(
                "'{}' in path '{}' is not a namespace",
                head, full
            ))),
            None => Err(CaptureError::PathResolution(format!(
                "'{}' not found in path '{}'",
                head, full
            ))),
        }
    }

    /// Look up the handler a path points at, for invocation.
    pub fn handler(&self, path: &MethodPath) -> Option<Arc<dyn Interceptable>> {
        let mut table = self;
        let (last, parents) = path.segments().split_last()?;
        for segment in parents {
            match table.entries.get(segment) {
                Some(MethodNode::Namespace(next)) => table = next,
                _ => return None,
            }
        }
        match table.entries.get(last) {
            Some(MethodNode::Handler(handler)) => Some(Arc::clone(handler)),
            _ => None,
        }
    }
}

/// Explicit mapping from client type names to the method paths to
/// intercept, loaded once at configuration time.
#[derive(Default)]
pub struct ClientRegistry {
    entries: HashMap<String, Vec<MethodPath>>,
}

impl ClientRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in table of known client types.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(
            "OpenAI",
            parse_all(&[
                "chat.completions.create",
                "completions.create",
                "embeddings.create",
            ]),
        );
        registry.insert(
            "AzureOpenAI",
            parse_all(&["chat.completions.create", "embeddings.create"]),
        );
        registry.insert(
            "Anthropic",
            parse_all(&["messages.create", "messages.stream", "completions.create"]),
        );
        registry.insert("Cohere", parse_all(&["chat", "generate", "embed"]));
        registry
    }

    /// Register (or replace) the paths for a client type.
    pub fn insert(&mut self, type_name: impl Into<String>, paths: Vec<MethodPath>) {
        self.entries.insert(type_name.into(), paths);
    }

    /// Paths registered for a client type; unknown types are a
    /// configuration error.
    pub fn methods_for(&self, type_name: &str) -> Result<&[MethodPath]> {
        self.entries
            .get(type_name)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                CaptureError::ConfigError(format!(
                    "unknown client type '{}': no method paths registered and none supplied",
                    type_name
                ))
            })
    }

    /// Whether a client type is known.
    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }
}

fn parse_all(paths: &[&str]) -> Vec<MethodPath> {
    paths
        .iter()
        .filter_map(|p| MethodPath::parse(p).ok())
        .collect()
}
