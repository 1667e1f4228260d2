//! Request context
//!
//! Passed to every step of the bootstrap sequence. A context is immutable:
//! `with_value` returns a child layered on top of its parent.

use std::fmt;
use std::sync::Arc;
use tracing::Span;

/// Well-known context keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    /// Name reported by the remote server
    Server,
    /// Service the current step operates on
    Service,
    /// Resolved logical host
    Host,
}

impl ContextKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Service => "service",
            Self::Host => "host",
        }
    }
}

struct Layer {
    key: ContextKey,
    value: String,
    parent: Option<Arc<Layer>>,
}

/// Request-scoped key/value carrier
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Layer>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child context with `key` set to `value`
    pub fn with_value(&self, key: ContextKey, value: impl Into<String>) -> Self {
        Self {
            head: Some(Arc::new(Layer {
                key,
                value: value.into(),
                parent: self.head.clone(),
            })),
        }
    }

    /// Look up the innermost value for `key`
    pub fn value(&self, key: ContextKey) -> Option<&str> {
        let mut layer = self.head.as_deref();
        while let Some(l) = layer {
            if l.key == key {
                return Some(&l.value);
            }
            layer = l.parent.as_deref();
        }
        None
    }

    pub fn server(&self) -> Option<&str> {
        self.value(ContextKey::Server)
    }

    pub fn service(&self) -> Option<&str> {
        self.value(ContextKey::Service)
    }

    /// Tracing span carrying this context's fields
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "lsclient",
            server = self.server(),
            service = self.service(),
            host = self.value(ContextKey::Host),
        )
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        let mut layer = self.head.as_deref();
        while let Some(l) = layer {
            map.entry(&l.key.as_str(), &l.value);
            layer = l.parent.as_deref();
        }
        map.finish()
    }
}
