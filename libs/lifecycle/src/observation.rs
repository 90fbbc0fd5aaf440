//! Observation records: what was seen about one unit at one moment.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MissingMilestone;
use crate::model::ObjectRef;
use crate::owners::Attribution;
use crate::readiness::{Milestone, ReadinessLatency};

/// Readiness latency of a unit, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Readiness {
    Measured {
        seconds: i64,
        /// Ready precedes scheduled.
        anomalous: bool,
    },
    MissingMilestone {
        milestone: Milestone,
    },
    /// The unit could not be read.
    Unavailable {
        message: String,
    },
}

impl From<Result<ReadinessLatency, MissingMilestone>> for Readiness {
    fn from(result: Result<ReadinessLatency, MissingMilestone>) -> Self {
        match result {
            Ok(latency) => Readiness::Measured {
                seconds: latency.whole_seconds(),
                anomalous: latency.is_anomalous(),
            },
            Err(MissingMilestone(milestone)) => Readiness::MissingMilestone { milestone },
        }
    }
}

impl Readiness {
    pub fn seconds(&self) -> Option<i64> {
        match self {
            Readiness::Measured { seconds, .. } => Some(*seconds),
            _ => None,
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Measured {
                seconds,
                anomalous: false,
            } => write!(f, "{seconds}s"),
            Readiness::Measured {
                seconds,
                anomalous: true,
            } => write!(f, "{seconds}s (ready before scheduled)"),
            Readiness::MissingMilestone { milestone } => write!(f, "no {milestone} condition"),
            Readiness::Unavailable { message } => write!(f, "unavailable: {message}"),
        }
    }
}

/// One derived, never-persisted record about a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub unit: ObjectRef,
    pub owner: Attribution,
    pub readiness: Readiness,
    #[serde(default)]
    pub phase: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    /// Workload name, or `unknown`.
    pub fn owner_label(&self) -> &str {
        self.owner.workload().unwrap_or("unknown")
    }

    pub fn phase_label(&self) -> &str {
        self.phase.as_deref().unwrap_or("-")
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unit={} workload={} phase={} readiness={} at={}",
            self.unit,
            self.owner_label(),
            self.phase_label(),
            self.readiness,
            self.observed_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        )
    }
}
