//! Integration tests for the scale trigger.

use scaleprobe::scale::{RetryPolicy, ScaleError, ScaleTrigger};
use scaleprobe_lifecycle::{FetchError, ObjectRef, SchemaError};
use scaleprobe_testing::FakeCluster;

fn web() -> ObjectRef {
    ObjectRef::new("default", "web")
}

fn trigger() -> ScaleTrigger {
    ScaleTrigger::new("Deployment").with_retry(RetryPolicy::immediate(5))
}

#[tokio::test]
async fn test_scale_up_writes_one_more_replica() {
    let cluster = FakeCluster::new().with_workload("Deployment", "default", "web", 3);

    let outcome = trigger().scale_up(&cluster, &web()).await.unwrap();

    assert_eq!(outcome.previous_replicas, 3);
    assert_eq!(outcome.desired_replicas, 4);
    assert_eq!(outcome.attempts, 1);

    let writes = cluster.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].desired_replicas(), Ok(4));
    assert_eq!(cluster.replicas("Deployment", "default", "web"), Some(4));
}

#[tokio::test]
async fn test_scale_up_keeps_the_rest_of_the_object() {
    let document = serde_json::json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": "web", "namespace": "default", "resourceVersion": "7" },
        "spec": {
            "replicas": 1,
            "selector": { "matchLabels": { "app": "web" } }
        }
    });
    let cluster =
        FakeCluster::new().with_workload_document("Deployment", "default", "web", document);

    trigger().scale_up(&cluster, &web()).await.unwrap();

    let written = &cluster.writes()[0].object;
    assert_eq!(written["spec"]["selector"]["matchLabels"]["app"], "web");
    assert_eq!(written["spec"]["replicas"], 2);
}

#[tokio::test]
async fn test_conflicts_are_retried_from_a_fresh_read() {
    let cluster = FakeCluster::new()
        .with_workload("Deployment", "default", "web", 3)
        .with_concurrent_scaler(2);

    let outcome = trigger().scale_up(&cluster, &web()).await.unwrap();

    // Two external bumps landed first: 3 -> 4 -> 5, then ours: 5 -> 6.
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.previous_replicas, 5);
    assert_eq!(outcome.desired_replicas, 6);
    assert_eq!(cluster.writes().len(), 1);
    assert_eq!(cluster.replicas("Deployment", "default", "web"), Some(6));
}

#[tokio::test]
async fn test_exhausted_conflicts_are_fatal() {
    let cluster = FakeCluster::new()
        .with_workload("Deployment", "default", "web", 3)
        .with_concurrent_scaler(10);
    let trigger = ScaleTrigger::new("Deployment").with_retry(RetryPolicy::immediate(3));

    let err = trigger.scale_up(&cluster, &web()).await.unwrap_err();

    assert!(matches!(
        err,
        ScaleError::ConflictsExhausted { attempts: 3, .. }
    ));
    assert!(cluster.writes().is_empty());
}

#[tokio::test]
async fn test_missing_replica_count_is_a_schema_error() {
    let document = serde_json::json!({
        "metadata": { "name": "web", "namespace": "default", "resourceVersion": "1" },
        "spec": {}
    });
    let cluster =
        FakeCluster::new().with_workload_document("Deployment", "default", "web", document);

    let err = trigger().scale_up(&cluster, &web()).await.unwrap_err();

    assert!(matches!(
        err,
        ScaleError::Schema(SchemaError::MissingField { .. })
    ));
    assert!(cluster.writes().is_empty());
}

#[tokio::test]
async fn test_non_integer_replica_count_is_a_schema_error() {
    let document = serde_json::json!({
        "metadata": { "name": "web", "namespace": "default", "resourceVersion": "1" },
        "spec": { "replicas": "three" }
    });
    let cluster =
        FakeCluster::new().with_workload_document("Deployment", "default", "web", document);

    let err = trigger().scale_up(&cluster, &web()).await.unwrap_err();

    assert!(matches!(err, ScaleError::Schema(SchemaError::WrongType { .. })));
}

#[tokio::test]
async fn test_read_failure_is_fatal_and_names_the_workload() {
    let cluster = FakeCluster::new();

    let err = trigger().scale_up(&cluster, &web()).await.unwrap_err();

    match &err {
        ScaleError::Read {
            kind,
            workload,
            source,
        } => {
            assert_eq!(kind, "Deployment");
            assert_eq!(workload, &web());
            assert!(matches!(source, FetchError::NotFound { .. }));
        }
        other => panic!("expected a read error, got {other:?}"),
    }
    assert!(err.to_string().contains("default/web"));
}

#[tokio::test]
async fn test_configured_kind_is_used() {
    let cluster = FakeCluster::new().with_workload("StatefulSet", "db", "postgres", 1);
    let trigger = ScaleTrigger::new("StatefulSet").with_retry(RetryPolicy::immediate(1));

    let outcome = trigger
        .scale_up(&cluster, &ObjectRef::new("db", "postgres"))
        .await
        .unwrap();

    assert_eq!(outcome.kind, "StatefulSet");
    assert_eq!(cluster.replicas("StatefulSet", "db", "postgres"), Some(2));
}
