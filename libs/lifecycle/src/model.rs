//! Snapshots of cluster objects as seen by the probe.
//!
//! These are deliberately narrow: a runtime unit carries only what ownership
//! resolution, readiness timing and the watch filter read, and a workload is
//! kept as its full JSON document so it can be written back unchanged apart
//! from the replica count.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Path of the desired replica count inside a workload document.
pub const REPLICAS_POINTER: &str = "/spec/replicas";

/// Path of the resource version inside any object document.
pub const RESOURCE_VERSION_POINTER: &str = "/metadata/resourceVersion";

/// Namespaced identity of a cluster object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Back-pointer from a child object to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

impl OwnerRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// A lifecycle condition and when it last changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,

    /// Second resolution, as recorded by the API server.
    #[serde(default)]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new(condition_type: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            condition_type: condition_type.into(),
            last_transition_time: Some(at),
        }
    }
}

/// Current state of a runtime unit (pod).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeUnit {
    pub reference: ObjectRef,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub owners: Vec<OwnerRef>,

    /// Status phase (Pending, Running, Succeeded, ...), absent before the
    /// kubelet reports one.
    #[serde(default)]
    pub phase: Option<String>,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl RuntimeUnit {
    pub fn new(reference: ObjectRef) -> Self {
        Self {
            reference,
            labels: BTreeMap::new(),
            owners: Vec::new(),
            phase: None,
            conditions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    /// True when the unit carries `key=value` among its labels.
    pub fn has_label(&self, key: &str, value: &str) -> bool {
        self.labels.get(key).map(String::as_str) == Some(value)
    }
}

/// Full document of a replica-bearing workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSnapshot {
    pub kind: String,
    pub reference: ObjectRef,
    pub object: serde_json::Value,
}

impl WorkloadSnapshot {
    pub fn new(kind: impl Into<String>, reference: ObjectRef, object: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            reference,
            object,
        }
    }

    fn describe(&self) -> String {
        format!("{} {}", self.kind, self.reference)
    }

    /// Resource version the document was read at, if the server supplied one.
    pub fn resource_version(&self) -> Option<&str> {
        self.object
            .pointer(RESOURCE_VERSION_POINTER)
            .and_then(serde_json::Value::as_str)
    }

    /// Read `spec.replicas`.
    pub fn desired_replicas(&self) -> Result<i64, SchemaError> {
        let value =
            self.object
                .pointer(REPLICAS_POINTER)
                .ok_or_else(|| SchemaError::MissingField {
                    object: self.describe(),
                    field: "spec.replicas".to_string(),
                })?;

        let replicas = value.as_i64().ok_or_else(|| SchemaError::WrongType {
            object: self.describe(),
            field: "spec.replicas".to_string(),
            expected: "an integer",
        })?;

        if replicas < 0 {
            return Err(SchemaError::OutOfRange {
                object: self.describe(),
                field: "spec.replicas".to_string(),
                value: replicas,
            });
        }

        Ok(replicas)
    }

    /// Overwrite `spec.replicas`, leaving every other field untouched.
    pub fn set_desired_replicas(&mut self, replicas: i64) -> Result<(), SchemaError> {
        // Kubernetes stores the field as int32.
        if replicas < 0 || replicas > i64::from(i32::MAX) {
            return Err(SchemaError::OutOfRange {
                object: self.describe(),
                field: "spec.replicas".to_string(),
                value: replicas,
            });
        }

        let object = self.describe();
        let spec = self
            .object
            .get_mut("spec")
            .and_then(serde_json::Value::as_object_mut)
            .ok_or_else(|| SchemaError::MissingField {
                object,
                field: "spec".to_string(),
            })?;
        spec.insert("replicas".to_string(), serde_json::json!(replicas));
        Ok(())
    }
}
