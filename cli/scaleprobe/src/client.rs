//! Kubernetes client for API communication.

use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ApiResource, DynamicObject, ListParams, PostParams, WatchEvent, WatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::GroupVersionKind;
use kube::error::ErrorResponse;
use scaleprobe_lifecycle::{
    Cluster, Condition, FetchError, ObjectRef, OwnerRef, RuntimeUnit, Subscription, UnitEvent,
    WorkloadSnapshot,
};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::CliError;

/// Kind name used in errors about pods.
const POD_KIND: &str = "Pod";

/// Events buffered between the watch task and the consumer.
const WATCH_BUFFER: usize = 64;

/// [`Cluster`] backed by a Kubernetes API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: kube::Client,
}

impl KubeCluster {
    /// Build a client from a kubeconfig file, optionally selecting a context.
    pub async fn connect(kubeconfig: &Path, context: Option<&str>) -> Result<Self, CliError> {
        let kubeconfig_error = |message: String| CliError::Kubeconfig {
            path: kubeconfig.to_path_buf(),
            message,
        };

        let parsed =
            Kubeconfig::read_from(kubeconfig).map_err(|e| kubeconfig_error(e.to_string()))?;
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            ..KubeConfigOptions::default()
        };
        let config = kube::Config::from_custom_kubeconfig(parsed, &options)
            .await
            .map_err(|e| kubeconfig_error(e.to_string()))?;

        debug!(
            cluster_url = %config.cluster_url,
            default_namespace = %config.default_namespace,
            "Kubeconfig loaded"
        );

        let client = kube::Client::try_from(config)
            .map_err(|e| kubeconfig_error(format!("failed to create client: {e}")))?;

        Ok(Self { client })
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn dynamic(&self, kind: &str, namespace: &str) -> Result<Api<DynamicObject>, FetchError> {
        let resource = api_resource(kind)?;
        Ok(Api::namespaced_with(self.client.clone(), namespace, &resource))
    }
}

/// API resource for the controller kinds the probe can read.
pub fn api_resource(kind: &str) -> Result<ApiResource, FetchError> {
    let (group, version) = match kind {
        "Deployment" | "ReplicaSet" | "StatefulSet" | "DaemonSet" => ("apps", "v1"),
        "Job" | "CronJob" => ("batch", "v1"),
        "ReplicationController" => ("", "v1"),
        other => return Err(FetchError::UnsupportedKind(other.to_string())),
    };
    Ok(ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, kind)))
}

/// Map a client error onto the probe's taxonomy.
pub fn fetch_error(kind: &str, name: &str, err: kube::Error) -> FetchError {
    match err {
        kube::Error::Api(response) => status_error(kind, name, &response),
        kube::Error::SerdeError(e) => FetchError::Decode(e.to_string()),
        other => FetchError::Transport(other.to_string()),
    }
}

fn status_error(kind: &str, name: &str, response: &ErrorResponse) -> FetchError {
    match response.code {
        404 => FetchError::not_found(kind, name),
        409 => FetchError::conflict(kind, name, &response.message),
        status => FetchError::Api {
            status,
            message: response.message.clone(),
        },
    }
}

/// Convert a pod into a runtime unit. `namespace` fills in when the object
/// omits it.
pub fn unit_from_pod(pod: Pod, namespace: &str) -> Result<RuntimeUnit, FetchError> {
    let metadata = pod.metadata;
    let name = metadata
        .name
        .ok_or_else(|| FetchError::Decode("pod without metadata.name".to_string()))?;
    let namespace = metadata.namespace.unwrap_or_else(|| namespace.to_string());

    let owners = metadata
        .owner_references
        .unwrap_or_default()
        .into_iter()
        .map(|owner| OwnerRef::new(owner.kind, owner.name))
        .collect();

    let (phase, conditions) = match pod.status {
        Some(status) => {
            let conditions = status
                .conditions
                .unwrap_or_default()
                .into_iter()
                .map(|condition| Condition {
                    condition_type: condition.type_,
                    last_transition_time: condition.last_transition_time.map(|time| time.0),
                })
                .collect();
            (status.phase, conditions)
        }
        None => (None, Vec::new()),
    };

    Ok(RuntimeUnit {
        reference: ObjectRef::new(namespace, name),
        labels: metadata.labels.unwrap_or_default(),
        owners,
        phase,
        conditions,
    })
}

fn unit_event(event: WatchEvent<Pod>, namespace: &str) -> Result<UnitEvent, FetchError> {
    Ok(match event {
        WatchEvent::Added(pod) => UnitEvent::Added(unit_from_pod(pod, namespace)?),
        WatchEvent::Modified(pod) => UnitEvent::Modified(unit_from_pod(pod, namespace)?),
        WatchEvent::Deleted(pod) => UnitEvent::Deleted(unit_from_pod(pod, namespace)?),
        WatchEvent::Bookmark(_) => UnitEvent::Bookmark,
        WatchEvent::Error(response) => UnitEvent::Error {
            code: response.code,
            message: response.message,
        },
    })
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn get_workload(
        &self,
        kind: &str,
        workload: &ObjectRef,
    ) -> Result<WorkloadSnapshot, FetchError> {
        let api = self.dynamic(kind, &workload.namespace)?;
        let object = api
            .get(&workload.name)
            .await
            .map_err(|e| fetch_error(kind, &workload.name, e))?;

        Ok(WorkloadSnapshot::new(
            kind,
            workload.clone(),
            serde_json::to_value(&object)?,
        ))
    }

    async fn replace_workload(
        &self,
        snapshot: &WorkloadSnapshot,
    ) -> Result<WorkloadSnapshot, FetchError> {
        let name = &snapshot.reference.name;
        let api = self.dynamic(&snapshot.kind, &snapshot.reference.namespace)?;
        let object: DynamicObject = serde_json::from_value(snapshot.object.clone())?;

        let updated = api
            .replace(name, &PostParams::default(), &object)
            .await
            .map_err(|e| fetch_error(&snapshot.kind, name, e))?;

        Ok(WorkloadSnapshot::new(
            &snapshot.kind,
            snapshot.reference.clone(),
            serde_json::to_value(&updated)?,
        ))
    }

    async fn owner_references(
        &self,
        kind: &str,
        object: &ObjectRef,
    ) -> Result<Vec<OwnerRef>, FetchError> {
        let api = self.dynamic(kind, &object.namespace)?;
        let found = api
            .get(&object.name)
            .await
            .map_err(|e| fetch_error(kind, &object.name, e))?;

        Ok(found
            .metadata
            .owner_references
            .unwrap_or_default()
            .into_iter()
            .map(|owner| OwnerRef::new(owner.kind, owner.name))
            .collect())
    }

    async fn get_unit(&self, unit: &ObjectRef) -> Result<RuntimeUnit, FetchError> {
        let pod = self
            .pods(&unit.namespace)
            .get(&unit.name)
            .await
            .map_err(|e| fetch_error(POD_KIND, &unit.name, e))?;
        unit_from_pod(pod, &unit.namespace)
    }

    async fn list_units(&self, namespace: &str) -> Result<Vec<RuntimeUnit>, FetchError> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| fetch_error(POD_KIND, namespace, e))?;

        Ok(pods
            .items
            .into_iter()
            .filter_map(|pod| match unit_from_pod(pod, namespace) {
                Ok(unit) => Some(unit),
                Err(err) => {
                    warn!(namespace, error = %err, "Skipping malformed pod in list");
                    None
                }
            })
            .collect())
    }

    async fn watch_units(&self, namespace: &str) -> Result<Subscription, FetchError> {
        let pods = self.pods(namespace);
        let namespace = namespace.to_string();
        let (event_tx, event_rx) = mpsc::channel(WATCH_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let stream = match pods.watch(&WatchParams::default(), "0").await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(fetch_error(POD_KIND, &namespace, err)));
                    return;
                }
            };
            let mut stream = std::pin::pin!(stream);

            while let Some(item) = stream.next().await {
                let event = item
                    .map_err(|e| fetch_error(POD_KIND, &namespace, e))
                    .and_then(|event| unit_event(event, &namespace));
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            debug!(namespace = %namespace, "Pod watch stream ended");
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(FetchError::Transport(
                    "watch task exited before the stream opened".to_string(),
                ))
            }
        }

        let abort = task.abort_handle();
        Ok(
            Subscription::new(ReceiverStream::new(event_rx).boxed()).with_release_hook(move || {
                abort.abort();
            }),
        )
    }
}
