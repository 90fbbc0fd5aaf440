//! Scale trigger: add one replica to a workload.
//!
//! The update is a read-modify-write of the whole object guarded by its
//! resource version. When another writer (an autoscaler, a deploy) gets in
//! between, the API server answers 409 and the trigger re-reads and retries
//! with backoff, up to a bounded number of attempts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use scaleprobe_lifecycle::{Cluster, FetchError, ObjectRef, SchemaError};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Default attempts before giving up on conflicts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Errors from a scale-up.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("failed to read {kind} {workload}: {source}")]
    Read {
        kind: String,
        workload: ObjectRef,
        #[source]
        source: FetchError,
    },

    #[error("failed to update {kind} {workload}: {source}")]
    Write {
        kind: String,
        workload: ObjectRef,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("gave up scaling {kind} {workload} after {attempts} conflicting updates")]
    ConflictsExhausted {
        kind: String,
        workload: ObjectRef,
        attempts: u32,
    },
}

/// Retry schedule for conflicting writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Result of a successful scale-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleOutcome {
    pub kind: String,
    pub workload: ObjectRef,
    pub previous_replicas: i64,
    pub desired_replicas: i64,
    pub attempts: u32,
    pub scaled_at: DateTime<Utc>,
}

/// Increments the desired replica count of one workload kind.
#[derive(Debug, Clone)]
pub struct ScaleTrigger {
    kind: String,
    retry: RetryPolicy,
}

impl ScaleTrigger {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Add exactly one replica and return the new count.
    #[instrument(skip(self, cluster, workload), fields(kind = %self.kind, workload = %workload))]
    pub async fn scale_up(
        &self,
        cluster: &dyn Cluster,
        workload: &ObjectRef,
    ) -> Result<ScaleOutcome, ScaleError> {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let mut snapshot = cluster
                .get_workload(&self.kind, workload)
                .await
                .map_err(|source| ScaleError::Read {
                    kind: self.kind.clone(),
                    workload: workload.clone(),
                    source,
                })?;

            let previous = snapshot.desired_replicas()?;
            let desired = previous.saturating_add(1);
            snapshot.set_desired_replicas(desired)?;

            match cluster.replace_workload(&snapshot).await {
                Ok(_) => {
                    info!(previous, desired, attempt, "Increased replicas");
                    return Ok(ScaleOutcome {
                        kind: self.kind.clone(),
                        workload: workload.clone(),
                        previous_replicas: previous,
                        desired_replicas: desired,
                        attempts: attempt,
                        scaled_at: Utc::now(),
                    });
                }
                Err(err) if err.is_conflict() => {
                    warn!(attempt, max_attempts, error = %err, "Replica update conflicted");
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.delay(attempt)).await;
                    }
                }
                Err(source) => {
                    return Err(ScaleError::Write {
                        kind: self.kind.clone(),
                        workload: workload.clone(),
                        source,
                    });
                }
            }
        }

        Err(ScaleError::ConflictsExhausted {
            kind: self.kind.clone(),
            workload: workload.clone(),
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(10), Duration::from_secs(2));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn immediate_policy_never_waits() {
        assert_eq!(RetryPolicy::immediate(3).delay(2), Duration::ZERO);
    }
}
