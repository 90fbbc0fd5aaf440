//! Test support for scaleprobe.
//!
//! - [`FakeCluster`]: an in-memory [`Cluster`] with scripted watches and
//!   injectable failures.
//! - [`fixtures`]: builders for units and condition timestamps.

pub mod fixtures;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use scaleprobe_lifecycle::{
    Cluster, FetchError, ObjectRef, OwnerRef, RuntimeUnit, Subscription, UnitEvent,
    WorkloadSnapshot,
};

pub use fixtures::{at, unit, UnitBuilder};

/// Kind used as the key for unit lookup failures.
pub const UNIT_KIND: &str = "Pod";

type Key = (String, ObjectRef);

#[derive(Debug, Clone)]
struct WatchScript {
    events: Vec<Result<UnitEvent, FetchError>>,
    idle_after: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    workloads: BTreeMap<Key, serde_json::Value>,
    controllers: BTreeMap<Key, Vec<OwnerRef>>,
    units: BTreeMap<ObjectRef, RuntimeUnit>,
    failing: BTreeMap<Key, FetchError>,
    list_error: Option<FetchError>,
    concurrent_writes: u32,
    writes: Vec<WorkloadSnapshot>,
    owner_lookups: usize,
    listings: usize,
    watch: Option<WatchScript>,
    watch_error: Option<FetchError>,
}

/// Counters shared with every subscription handed out.
#[derive(Debug, Clone, Default)]
pub struct WatchProbes {
    opened: Arc<AtomicUsize>,
    consumed: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl WatchProbes {
    /// Watches opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Events pulled from the stream by the consumer.
    pub fn consumed(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }

    /// Subscriptions released.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// In-memory cluster.
#[derive(Debug, Default)]
pub struct FakeCluster {
    state: Mutex<FakeState>,
    probes: WatchProbes,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(kind: &str, object: &ObjectRef) -> Key {
        (kind.to_string(), object.clone())
    }

    /// Add a workload with `spec.replicas` set.
    pub fn with_workload(self, kind: &str, namespace: &str, name: &str, replicas: i64) -> Self {
        let document = serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": kind,
            "metadata": { "name": name, "namespace": namespace, "resourceVersion": "1" },
            "spec": { "replicas": replicas },
        });
        self.with_workload_document(kind, namespace, name, document)
    }

    /// Add a workload from a raw document.
    pub fn with_workload_document(
        self,
        kind: &str,
        namespace: &str,
        name: &str,
        document: serde_json::Value,
    ) -> Self {
        self.state()
            .workloads
            .insert(Self::key(kind, &ObjectRef::new(namespace, name)), document);
        self
    }

    /// Add an owning controller (ReplicaSet, Deployment, ...) and its owners.
    pub fn with_controller(
        self,
        kind: &str,
        namespace: &str,
        name: &str,
        owners: Vec<OwnerRef>,
    ) -> Self {
        self.state()
            .controllers
            .insert(Self::key(kind, &ObjectRef::new(namespace, name)), owners);
        self
    }

    pub fn with_unit(self, unit: RuntimeUnit) -> Self {
        self.state().units.insert(unit.reference.clone(), unit);
        self
    }

    /// Make reads of one object fail. Use [`UNIT_KIND`] for units.
    pub fn failing_lookup(self, kind: &str, namespace: &str, name: &str, error: FetchError) -> Self {
        self.state()
            .failing
            .insert(Self::key(kind, &ObjectRef::new(namespace, name)), error);
        self
    }

    pub fn failing_list(self, error: FetchError) -> Self {
        self.state().list_error = Some(error);
        self
    }

    /// The next `writes` workload updates race an external scaler that bumps
    /// the replica count first, so they hit a version conflict.
    pub fn with_concurrent_scaler(self, writes: u32) -> Self {
        self.state().concurrent_writes = writes;
        self
    }

    /// Events delivered by every watch, after which the stream closes.
    pub fn with_watch_script(self, events: Vec<Result<UnitEvent, FetchError>>) -> Self {
        self.state().watch = Some(WatchScript {
            events,
            idle_after: false,
        });
        self
    }

    /// Events delivered by every watch, after which the stream stays open
    /// without producing anything.
    pub fn with_watch_script_then_idle(self, events: Vec<Result<UnitEvent, FetchError>>) -> Self {
        self.state().watch = Some(WatchScript {
            events,
            idle_after: true,
        });
        self
    }

    pub fn failing_watch(self, error: FetchError) -> Self {
        self.state().watch_error = Some(error);
        self
    }

    /// Every successful workload write, in order.
    pub fn writes(&self) -> Vec<WorkloadSnapshot> {
        self.state().writes.clone()
    }

    /// Current stored replica count of a workload.
    pub fn replicas(&self, kind: &str, namespace: &str, name: &str) -> Option<i64> {
        self.state()
            .workloads
            .get(&Self::key(kind, &ObjectRef::new(namespace, name)))
            .and_then(|doc| doc.pointer("/spec/replicas"))
            .and_then(serde_json::Value::as_i64)
    }

    /// Number of owner reference reads served (including failures).
    pub fn owner_lookups(&self) -> usize {
        self.state().owner_lookups
    }

    /// Number of unit listings served (including failures).
    pub fn listings(&self) -> usize {
        self.state().listings
    }

    pub fn watch_probes(&self) -> WatchProbes {
        self.probes.clone()
    }
}

fn resource_version(document: &serde_json::Value) -> u64 {
    document
        .pointer("/metadata/resourceVersion")
        .and_then(serde_json::Value::as_str)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn set_resource_version(document: &mut serde_json::Value, version: u64) {
    if let Some(metadata) = document
        .get_mut("metadata")
        .and_then(serde_json::Value::as_object_mut)
    {
        metadata.insert(
            "resourceVersion".to_string(),
            serde_json::json!(version.to_string()),
        );
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn get_workload(
        &self,
        kind: &str,
        workload: &ObjectRef,
    ) -> Result<WorkloadSnapshot, FetchError> {
        let state = self.state();
        let key = Self::key(kind, workload);
        if let Some(err) = state.failing.get(&key) {
            return Err(err.clone());
        }
        state
            .workloads
            .get(&key)
            .map(|doc| WorkloadSnapshot::new(kind, workload.clone(), doc.clone()))
            .ok_or_else(|| FetchError::not_found(kind, &workload.name))
    }

    async fn replace_workload(
        &self,
        snapshot: &WorkloadSnapshot,
    ) -> Result<WorkloadSnapshot, FetchError> {
        let mut state = self.state();
        let key = Self::key(&snapshot.kind, &snapshot.reference);

        let racing = state.concurrent_writes > 0;
        if racing {
            state.concurrent_writes -= 1;
        }

        let stored = state
            .workloads
            .get_mut(&key)
            .ok_or_else(|| FetchError::not_found(&snapshot.kind, &snapshot.reference.name))?;

        if racing {
            let current = stored
                .pointer("/spec/replicas")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0);
            if let Some(replicas) = stored.pointer_mut("/spec/replicas") {
                *replicas = serde_json::json!(current + 1);
            }
            let version = resource_version(stored) + 1;
            set_resource_version(stored, version);
        }

        let stored_version = resource_version(stored);
        if resource_version(&snapshot.object) != stored_version {
            return Err(FetchError::conflict(
                &snapshot.kind,
                &snapshot.reference.name,
                "the object has been modified; please apply your changes to the latest version",
            ));
        }

        let mut written = snapshot.object.clone();
        set_resource_version(&mut written, stored_version + 1);
        *stored = written.clone();

        let result = WorkloadSnapshot::new(&snapshot.kind, snapshot.reference.clone(), written);
        state.writes.push(result.clone());
        Ok(result)
    }

    async fn owner_references(
        &self,
        kind: &str,
        object: &ObjectRef,
    ) -> Result<Vec<OwnerRef>, FetchError> {
        let mut state = self.state();
        state.owner_lookups += 1;

        let key = Self::key(kind, object);
        if let Some(err) = state.failing.get(&key) {
            return Err(err.clone());
        }
        state
            .controllers
            .get(&key)
            .cloned()
            .ok_or_else(|| FetchError::not_found(kind, &object.name))
    }

    async fn get_unit(&self, unit: &ObjectRef) -> Result<RuntimeUnit, FetchError> {
        let state = self.state();
        if let Some(err) = state.failing.get(&Self::key(UNIT_KIND, unit)) {
            return Err(err.clone());
        }
        state
            .units
            .get(unit)
            .cloned()
            .ok_or_else(|| FetchError::not_found(UNIT_KIND, &unit.name))
    }

    async fn list_units(&self, namespace: &str) -> Result<Vec<RuntimeUnit>, FetchError> {
        let mut state = self.state();
        state.listings += 1;
        if let Some(err) = &state.list_error {
            return Err(err.clone());
        }
        Ok(state
            .units
            .values()
            .filter(|unit| unit.reference.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn watch_units(&self, _namespace: &str) -> Result<Subscription, FetchError> {
        let script = {
            let state = self.state();
            if let Some(err) = &state.watch_error {
                return Err(err.clone());
            }
            state.watch.clone().unwrap_or(WatchScript {
                events: Vec::new(),
                idle_after: false,
            })
        };

        self.probes.opened.fetch_add(1, Ordering::SeqCst);

        let consumed = Arc::clone(&self.probes.consumed);
        let scripted = stream::iter(script.events).inspect(move |_| {
            consumed.fetch_add(1, Ordering::SeqCst);
        });
        let events = if script.idle_after {
            scripted.chain(stream::pending()).boxed()
        } else {
            scripted.boxed()
        };

        let released = Arc::clone(&self.probes.released);
        Ok(Subscription::new(events).with_release_hook(move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_write_conflicts() {
        let cluster = FakeCluster::new().with_workload("Deployment", "default", "web", 3);
        let workload = ObjectRef::new("default", "web");

        let first = cluster.get_workload("Deployment", &workload).await.unwrap();
        let stale = first.clone();

        cluster.replace_workload(&first).await.unwrap();
        let err = cluster.replace_workload(&stale).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(cluster.writes().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_scaler_bumps_replicas() {
        let cluster = FakeCluster::new()
            .with_workload("Deployment", "default", "web", 3)
            .with_concurrent_scaler(1);
        let workload = ObjectRef::new("default", "web");

        let snapshot = cluster.get_workload("Deployment", &workload).await.unwrap();
        assert!(cluster.replace_workload(&snapshot).await.is_err());
        assert_eq!(cluster.replicas("Deployment", "default", "web"), Some(4));
    }

    #[tokio::test]
    async fn watch_counts_consumption_and_release() {
        let cluster = FakeCluster::new().with_watch_script(vec![
            Ok(UnitEvent::Bookmark),
            Ok(UnitEvent::Bookmark),
        ]);
        let probes = cluster.watch_probes();

        let mut subscription = cluster.watch_units("default").await.unwrap();
        subscription.next_event().await;
        subscription.release();

        assert_eq!(probes.opened(), 1);
        assert_eq!(probes.consumed(), 1);
        assert_eq!(probes.released(), 1);
    }
}
