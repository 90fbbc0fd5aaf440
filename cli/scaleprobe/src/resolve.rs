//! Pod → workload resolution by walking owner references.
//!
//! Pods name their controller, controllers name their workload. Every hop is
//! read fresh from the API server; call volume is one walk per pod, so nothing
//! is cached.

use scaleprobe_lifecycle::{
    first_owner_of_kind, Attribution, Cluster, FetchError, ObjectRef, OwnershipChain,
    RuntimeUnit, UnknownOwner,
};
use tracing::{debug, warn};

/// Where a walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChainEnd {
    Reached(String),
    Broken { object: String, missing_kind: String },
}

/// A hop that could not be read.
#[derive(Debug)]
struct HopFailure {
    object: String,
    error: FetchError,
}

/// Walks an [`OwnershipChain`] against the cluster.
#[derive(Debug, Clone, Default)]
pub struct OwnershipResolver {
    chain: OwnershipChain,
}

impl OwnershipResolver {
    pub fn new(chain: OwnershipChain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &OwnershipChain {
        &self.chain
    }

    /// Name of the workload owning `controller`.
    ///
    /// `Ok(None)` means the chain is broken (some hop has no owner of the
    /// expected kind); read failures are returned as errors.
    pub async fn resolve_workload(
        &self,
        cluster: &dyn Cluster,
        namespace: &str,
        controller: &str,
    ) -> Result<Option<String>, FetchError> {
        match self.walk(cluster, namespace, controller).await {
            Ok(ChainEnd::Reached(workload)) => Ok(Some(workload)),
            Ok(ChainEnd::Broken { .. }) => Ok(None),
            Err(failure) => Err(failure.error),
        }
    }

    /// Attribute a unit to its workload. Never fails: missing references and
    /// lookup errors become [`Attribution::Unknown`].
    pub async fn attribute(&self, cluster: &dyn Cluster, unit: &RuntimeUnit) -> Attribution {
        let controller_kind = self.chain.controller_kind();
        let Some(controller) = first_owner_of_kind(&unit.owners, controller_kind) else {
            debug!(
                unit = %unit.reference,
                kind = controller_kind,
                "Unit has no controller reference"
            );
            return Attribution::Unknown(UnknownOwner::NoOwner {
                object: format!("Pod {}", unit.reference),
                kind: controller_kind.to_string(),
            });
        };

        match self
            .walk(cluster, &unit.reference.namespace, &controller.name)
            .await
        {
            Ok(ChainEnd::Reached(workload)) => Attribution::Owned { workload },
            Ok(ChainEnd::Broken {
                object,
                missing_kind,
            }) => Attribution::Unknown(UnknownOwner::NoOwner {
                object,
                kind: missing_kind,
            }),
            Err(failure) => {
                warn!(
                    unit = %unit.reference,
                    object = %failure.object,
                    error = %failure.error,
                    "Owner lookup failed"
                );
                Attribution::Unknown(UnknownOwner::LookupFailed {
                    object: failure.object,
                    message: failure.error.to_string(),
                })
            }
        }
    }

    /// Follow the chain upward from a controller of the first hop's kind.
    async fn walk(
        &self,
        cluster: &dyn Cluster,
        namespace: &str,
        controller: &str,
    ) -> Result<ChainEnd, HopFailure> {
        let mut kind = self.chain.controller_kind();
        let mut name = controller.to_string();

        for next_kind in self.chain.hops().iter().skip(1) {
            let object = ObjectRef::new(namespace, &name);
            let owners = cluster
                .owner_references(kind, &object)
                .await
                .map_err(|error| HopFailure {
                    object: format!("{kind} {object}"),
                    error,
                })?;

            let Some(owner) = first_owner_of_kind(&owners, next_kind) else {
                return Ok(ChainEnd::Broken {
                    object: format!("{kind} {object}"),
                    missing_kind: next_kind.clone(),
                });
            };

            debug!(
                from = %object,
                kind = %next_kind,
                owner = %owner.name,
                "Followed owner reference"
            );
            kind = next_kind.as_str();
            name = owner.name.clone();
        }

        Ok(ChainEnd::Reached(name))
    }
}
