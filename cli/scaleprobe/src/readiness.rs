//! Readiness latency of a live unit.

use scaleprobe_lifecycle::{
    Cluster, FetchError, MissingMilestone, ObjectRef, Readiness, ReadinessLatency, ReadinessTimer,
};
use tracing::warn;

/// Fetch the unit's current conditions and compute its latency.
///
/// The outer error is a read failure; the inner one a missing milestone.
pub async fn fetch_latency(
    cluster: &dyn Cluster,
    timer: &ReadinessTimer,
    unit: &ObjectRef,
) -> Result<Result<ReadinessLatency, MissingMilestone>, FetchError> {
    let current = cluster.get_unit(unit).await?;
    Ok(timer.latency(&current.conditions))
}

/// Like [`fetch_latency`], folded into a record value.
pub async fn measure_unit(
    cluster: &dyn Cluster,
    timer: &ReadinessTimer,
    unit: &ObjectRef,
) -> Readiness {
    match fetch_latency(cluster, timer, unit).await {
        Ok(latency) => latency.into(),
        Err(err) => {
            warn!(unit = %unit, error = %err, "Could not read unit conditions");
            Readiness::Unavailable {
                message: err.to_string(),
            }
        }
    }
}
