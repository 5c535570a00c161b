//! Ordered fallback chains of backends.

use std::future::Future;
use std::sync::Arc;

use crate::resilience::error::OperationKind;

/// Something the executor can try: one concrete implementation of an
/// operation kind.
pub trait Backend {
    /// Stable identifier used in logs, metrics and results.
    fn id(&self) -> &str;
}

impl<T: Backend + ?Sized> Backend for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

impl<T: Backend + ?Sized> Backend for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

/// Backends for one operation kind, in order of preference.
///
/// Immutable once built. An empty chain marks the operation as unsupported.
#[derive(Debug, Clone)]
pub struct FallbackChain<B> {
    kind: OperationKind,
    backends: Vec<B>,
}

impl<B: Backend> FallbackChain<B> {
    pub fn new(kind: OperationKind, backends: Vec<B>) -> Self {
        Self { kind, backends }
    }

    pub fn empty(kind: OperationKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Build a chain from the candidates that `detect` reports available.
    ///
    /// Detection runs once, up front; order of the survivors is preserved.
    pub async fn detected<F, Fut>(kind: OperationKind, candidates: Vec<B>, mut detect: F) -> Self
    where
        F: FnMut(&B) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut backends = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if detect(&candidate).await {
                tracing::debug!(kind = %kind, backend = candidate.id(), "Backend available");
                backends.push(candidate);
            } else {
                tracing::info!(kind = %kind, backend = candidate.id(), "Backend not available, leaving it out of the chain");
            }
        }
        Self { kind, backends }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn backends(&self) -> &[B] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.id()).collect()
    }
}
