//! Batch attribution scan over every unit of a namespace.

use chrono::Utc;
use futures_util::{stream, StreamExt};
use scaleprobe_lifecycle::{Cluster, FetchError, Observation, ReadinessTimer, RuntimeUnit};
use tracing::{debug, info, instrument};

use crate::readiness::measure_unit;
use crate::resolve::OwnershipResolver;

/// Default number of units examined at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Lists units and produces one [`Observation`] per unit.
///
/// Each call is a fresh full listing. Only the listing itself can fail;
/// per-unit attribution and readiness problems end up in the record.
#[derive(Debug, Clone)]
pub struct BatchScan {
    resolver: OwnershipResolver,
    timer: ReadinessTimer,
    concurrency: usize,
}

impl BatchScan {
    pub fn new(resolver: OwnershipResolver, timer: ReadinessTimer) -> Self {
        Self {
            resolver,
            timer,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Units in flight at once. Output order always follows the listing.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[instrument(skip(self, cluster), fields(concurrency = self.concurrency))]
    pub async fn scan_all(
        &self,
        cluster: &dyn Cluster,
        namespace: &str,
    ) -> Result<Vec<Observation>, FetchError> {
        let units = cluster.list_units(namespace).await?;
        debug!(count = units.len(), "Listed units");

        let observations: Vec<Observation> = stream::iter(units)
            .map(|unit| self.observe_unit(cluster, unit))
            .buffered(self.concurrency)
            .collect()
            .await;

        let unattributed = observations
            .iter()
            .filter(|observation| observation.owner.is_unknown())
            .count();
        info!(units = observations.len(), unattributed, "Scan complete");
        Ok(observations)
    }

    async fn observe_unit(&self, cluster: &dyn Cluster, unit: RuntimeUnit) -> Observation {
        let owner = self.resolver.attribute(cluster, &unit).await;
        let readiness = measure_unit(cluster, &self.timer, &unit.reference).await;
        Observation {
            unit: unit.reference,
            owner,
            readiness,
            phase: unit.phase,
            observed_at: Utc::now(),
        }
    }
}

/// Keep only records attributed to `workload`.
pub fn only_workload(observations: Vec<Observation>, workload: &str) -> Vec<Observation> {
    observations
        .into_iter()
        .filter(|observation| observation.owner.workload() == Some(workload))
        .collect()
}
