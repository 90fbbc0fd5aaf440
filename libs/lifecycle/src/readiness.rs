//! Readiness timing from a unit's condition history.
//!
//! The latency of a unit is the time between its scheduled milestone and its
//! ready milestone. Condition timestamps carry second resolution, so the
//! latency is reported in whole seconds and nothing finer is implied.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MissingMilestone;
use crate::model::Condition;

/// Condition type recorded when the scheduler binds the unit to a node.
pub const SCHEDULED_CONDITION: &str = "PodScheduled";

/// Condition type recorded when all containers pass readiness.
pub const READY_CONDITION: &str = "Ready";

/// The two milestones a readiness latency spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Scheduled,
    Ready,
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::Scheduled => write!(f, "scheduled"),
            Milestone::Ready => write!(f, "ready"),
        }
    }
}

/// Which entry wins when a condition type appears more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep overwriting while scanning; the last entry in list order wins.
    #[default]
    LastOccurrence,
    /// Keep the first entry in list order.
    FirstOccurrence,
}

/// Milestone timestamps extracted from one condition scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Milestones {
    pub scheduled: Option<DateTime<Utc>>,
    pub ready: Option<DateTime<Utc>>,
}

/// Signed time from scheduled to ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReadinessLatency(TimeDelta);

impl ReadinessLatency {
    pub fn whole_seconds(&self) -> i64 {
        self.0.num_seconds()
    }

    /// Ready was recorded before scheduled.
    pub fn is_anomalous(&self) -> bool {
        self.0 < TimeDelta::zero()
    }
}

impl fmt::Display for ReadinessLatency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.whole_seconds())
    }
}

/// Extracts milestones and computes readiness latency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessTimer {
    pub scheduled_condition: String,
    pub ready_condition: String,
    pub duplicates: DuplicatePolicy,
}

impl Default for ReadinessTimer {
    fn default() -> Self {
        Self {
            scheduled_condition: SCHEDULED_CONDITION.to_string(),
            ready_condition: READY_CONDITION.to_string(),
            duplicates: DuplicatePolicy::default(),
        }
    }
}

impl ReadinessTimer {
    pub fn with_duplicates(mut self, duplicates: DuplicatePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }

    /// Single pass over the conditions. Entries without a timestamp are
    /// ignored.
    pub fn milestones(&self, conditions: &[Condition]) -> Milestones {
        let mut found = Milestones::default();

        for condition in conditions {
            let Some(at) = condition.last_transition_time else {
                continue;
            };

            let slot = if condition.condition_type == self.scheduled_condition {
                &mut found.scheduled
            } else if condition.condition_type == self.ready_condition {
                &mut found.ready
            } else {
                continue;
            };

            match self.duplicates {
                DuplicatePolicy::LastOccurrence => *slot = Some(at),
                DuplicatePolicy::FirstOccurrence => {
                    slot.get_or_insert(at);
                }
            }
        }

        found
    }

    /// `ready - scheduled`. Negative results are returned as computed.
    ///
    /// When both milestones are absent the scheduled one is reported.
    pub fn latency(&self, conditions: &[Condition]) -> Result<ReadinessLatency, MissingMilestone> {
        let found = self.milestones(conditions);

        let scheduled = found
            .scheduled
            .ok_or(MissingMilestone(Milestone::Scheduled))?;
        let ready = found.ready.ok_or(MissingMilestone(Milestone::Ready))?;

        Ok(ReadinessLatency(ready - scheduled))
    }
}
