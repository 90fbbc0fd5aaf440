//! Integration tests for pod -> workload attribution.

use scaleprobe::resolve::OwnershipResolver;
use scaleprobe_lifecycle::{Attribution, FetchError, OwnerRef, OwnershipChain, UnknownOwner};
use scaleprobe_testing::{unit, FakeCluster};

fn cluster_with_chain() -> FakeCluster {
    FakeCluster::new()
        .with_controller(
            "ReplicaSet",
            "default",
            "web-7d4b9",
            vec![OwnerRef::new("Deployment", "web")],
        )
        .with_controller(
            "ReplicaSet",
            "default",
            "orphan-5c8f",
            vec![OwnerRef::new("Rollout", "orphan")],
        )
}

#[tokio::test]
async fn test_resolve_workload_follows_owner_reference() {
    let cluster = cluster_with_chain();
    let resolver = OwnershipResolver::default();

    let workload = resolver
        .resolve_workload(&cluster, "default", "web-7d4b9")
        .await
        .unwrap();
    assert_eq!(workload.as_deref(), Some("web"));
}

#[tokio::test]
async fn test_resolve_workload_without_workload_owner_is_not_found() {
    let cluster = cluster_with_chain().with_controller("ReplicaSet", "default", "bare", vec![]);
    let resolver = OwnershipResolver::default();

    assert_eq!(
        resolver
            .resolve_workload(&cluster, "default", "orphan-5c8f")
            .await,
        Ok(None)
    );
    assert_eq!(
        resolver.resolve_workload(&cluster, "default", "bare").await,
        Ok(None)
    );
}

#[tokio::test]
async fn test_resolve_workload_propagates_fetch_errors() {
    let cluster = cluster_with_chain().failing_lookup(
        "ReplicaSet",
        "default",
        "web-7d4b9",
        FetchError::Transport("connection refused".to_string()),
    );
    let resolver = OwnershipResolver::default();

    let err = resolver
        .resolve_workload(&cluster, "default", "web-7d4b9")
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Transport("connection refused".to_string()));

    // A controller that does not exist is a fetch error too, not NotFound.
    let err = resolver
        .resolve_workload(&cluster, "default", "gone")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::NotFound { .. }));
}

#[tokio::test]
async fn test_every_resolution_refetches_the_controller() {
    let cluster = cluster_with_chain();
    let resolver = OwnershipResolver::default();

    for _ in 0..3 {
        resolver
            .resolve_workload(&cluster, "default", "web-7d4b9")
            .await
            .unwrap();
    }
    assert_eq!(cluster.owner_lookups(), 3);
}

#[tokio::test]
async fn test_attribute_owned_unit() {
    let cluster = cluster_with_chain();
    let pod = unit("default", "web-7d4b9-x2k")
        .owned_by("ReplicaSet", "web-7d4b9")
        .build();

    let attribution = OwnershipResolver::default().attribute(&cluster, &pod).await;
    assert_eq!(attribution, Attribution::owned("web"));
}

#[tokio::test]
async fn test_attribute_unit_without_controller_skips_lookup() {
    let cluster = cluster_with_chain();
    let pod = unit("default", "standalone")
        .owned_by("Node", "worker-1")
        .build();

    let attribution = OwnershipResolver::default().attribute(&cluster, &pod).await;
    assert_eq!(
        attribution,
        Attribution::Unknown(UnknownOwner::NoOwner {
            object: "Pod default/standalone".to_string(),
            kind: "ReplicaSet".to_string(),
        })
    );
    assert_eq!(cluster.owner_lookups(), 0);
}

#[tokio::test]
async fn test_attribute_broken_chain_names_the_missing_kind() {
    let cluster = cluster_with_chain();
    let pod = unit("default", "orphan-5c8f-abc")
        .owned_by("ReplicaSet", "orphan-5c8f")
        .build();

    let attribution = OwnershipResolver::default().attribute(&cluster, &pod).await;
    assert_eq!(
        attribution,
        Attribution::Unknown(UnknownOwner::NoOwner {
            object: "ReplicaSet default/orphan-5c8f".to_string(),
            kind: "Deployment".to_string(),
        })
    );
}

#[tokio::test]
async fn test_attribute_lookup_failure_is_unknown_not_error() {
    let cluster = cluster_with_chain().failing_lookup(
        "ReplicaSet",
        "default",
        "web-7d4b9",
        FetchError::Api {
            status: 403,
            message: "forbidden".to_string(),
        },
    );
    let pod = unit("default", "web-7d4b9-x2k")
        .owned_by("ReplicaSet", "web-7d4b9")
        .build();

    let attribution = OwnershipResolver::default().attribute(&cluster, &pod).await;
    match attribution {
        Attribution::Unknown(UnknownOwner::LookupFailed { object, message }) => {
            assert_eq!(object, "ReplicaSet default/web-7d4b9");
            assert!(message.contains("403"));
        }
        other => panic!("expected a failed lookup, got {other:?}"),
    }
}

#[tokio::test]
async fn test_longer_chain_walks_every_hop() {
    let cluster = FakeCluster::new()
        .with_controller(
            "ReplicaSet",
            "default",
            "api-6f7",
            vec![OwnerRef::new("Deployment", "api")],
        )
        .with_controller(
            "Deployment",
            "default",
            "api",
            vec![OwnerRef::new("Application", "storefront")],
        );
    let chain = OwnershipChain::new(["ReplicaSet", "Deployment", "Application"]).unwrap();
    let resolver = OwnershipResolver::new(chain);

    let pod = unit("default", "api-6f7-qq")
        .owned_by("ReplicaSet", "api-6f7")
        .build();
    assert_eq!(
        resolver.attribute(&cluster, &pod).await,
        Attribution::owned("storefront")
    );
    assert_eq!(cluster.owner_lookups(), 2);
}
