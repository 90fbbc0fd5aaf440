//! The orchestrator boundary.
//!
//! Everything the probe needs from the cluster goes through [`Cluster`]: the
//! Kubernetes adapter in the CLI talks to a real API server, and tests use an
//! in-memory fake.

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use crate::error::FetchError;
use crate::model::{ObjectRef, OwnerRef, RuntimeUnit, WorkloadSnapshot};

/// Orchestrator API used by the probe.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Read a replica-bearing workload of the given kind.
    async fn get_workload(
        &self,
        kind: &str,
        workload: &ObjectRef,
    ) -> Result<WorkloadSnapshot, FetchError>;

    /// Write a workload back. Fails with [`FetchError::Conflict`] when the
    /// snapshot's resource version is stale.
    async fn replace_workload(
        &self,
        snapshot: &WorkloadSnapshot,
    ) -> Result<WorkloadSnapshot, FetchError>;

    /// Owner references of any supported controller kind. Read fresh on
    /// every call.
    async fn owner_references(
        &self,
        kind: &str,
        object: &ObjectRef,
    ) -> Result<Vec<OwnerRef>, FetchError>;

    async fn get_unit(&self, unit: &ObjectRef) -> Result<RuntimeUnit, FetchError>;

    async fn list_units(&self, namespace: &str) -> Result<Vec<RuntimeUnit>, FetchError>;

    /// Open a watch on the units of a namespace.
    async fn watch_units(&self, namespace: &str) -> Result<Subscription, FetchError>;
}

/// A watch event with the unit's full snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    Added(RuntimeUnit),
    Modified(RuntimeUnit),
    Deleted(RuntimeUnit),
    Bookmark,
    /// Error status delivered in-band by the server.
    Error { code: u16, message: String },
}

impl UnitEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            UnitEvent::Added(_) => "Added",
            UnitEvent::Modified(_) => "Modified",
            UnitEvent::Deleted(_) => "Deleted",
            UnitEvent::Bookmark => "Bookmark",
            UnitEvent::Error { .. } => "Error",
        }
    }
}

pub type UnitEventStream = BoxStream<'static, Result<UnitEvent, FetchError>>;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Exclusive handle on a live watch.
///
/// The release hook frees the server-side resources. It runs exactly once,
/// either from [`Subscription::release`] or when the handle is dropped.
pub struct Subscription {
    events: UnitEventStream,
    on_release: Option<ReleaseHook>,
}

impl Subscription {
    pub fn new(events: UnitEventStream) -> Self {
        Self {
            events,
            on_release: None,
        }
    }

    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Next event, or `None` once the server closes the stream.
    pub async fn next_event(&mut self) -> Option<Result<UnitEvent, FetchError>> {
        self.events.next().await
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("has_release_hook", &self.on_release.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures_util::stream;

    use super::*;

    fn counting_subscription(
        events: Vec<Result<UnitEvent, FetchError>>,
    ) -> (Subscription, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let subscription = Subscription::new(stream::iter(events).boxed())
            .with_release_hook(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        (subscription, released)
    }

    #[tokio::test]
    async fn release_runs_hook_once() {
        let (subscription, released) = counting_subscription(vec![Ok(UnitEvent::Bookmark)]);
        subscription.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_runs_hook_after_stream_ends() {
        let (mut subscription, released) = counting_subscription(vec![Ok(UnitEvent::Bookmark)]);

        assert_eq!(subscription.next_event().await, Some(Ok(UnitEvent::Bookmark)));
        assert_eq!(subscription.next_event().await, None);
        assert_eq!(released.load(Ordering::SeqCst), 0);

        drop(subscription);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_kinds() {
        assert_eq!(UnitEvent::Bookmark.kind(), "Bookmark");
        assert_eq!(
            UnitEvent::Error {
                code: 410,
                message: "too old resource version".to_string()
            }
            .kind(),
            "Error"
        );
    }
}
