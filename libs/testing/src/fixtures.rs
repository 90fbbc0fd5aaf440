//! Fixture builders.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use scaleprobe_lifecycle::{Condition, ObjectRef, OwnerRef, RuntimeUnit};

/// A fixed instant plus `secs` seconds.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
        + TimeDelta::seconds(secs)
}

/// Start building a unit.
pub fn unit(namespace: &str, name: &str) -> UnitBuilder {
    UnitBuilder {
        unit: RuntimeUnit::new(ObjectRef::new(namespace, name)),
    }
}

#[derive(Debug, Clone)]
pub struct UnitBuilder {
    unit: RuntimeUnit,
}

impl UnitBuilder {
    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.unit.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn owned_by(mut self, kind: &str, name: &str) -> Self {
        self.unit.owners.push(OwnerRef::new(kind, name));
        self
    }

    pub fn phase(mut self, phase: &str) -> Self {
        self.unit.phase = Some(phase.to_string());
        self
    }

    /// Condition that last transitioned `secs` after [`at`]`(0)`.
    pub fn condition(mut self, condition_type: &str, secs: i64) -> Self {
        self.unit
            .conditions
            .push(Condition::new(condition_type, at(secs)));
        self
    }

    /// `PodScheduled` at `scheduled`, `Ready` at `ready`.
    pub fn ready_after(self, scheduled: i64, ready: i64) -> Self {
        self.condition("PodScheduled", scheduled)
            .condition("Ready", ready)
    }

    pub fn build(self) -> RuntimeUnit {
        self.unit
    }
}
