//! Lifecycle model for scaled workloads.
//!
//! This library holds the parts of the probe that do not need a live
//! cluster:
//!
//! - **Model**: runtime units, owner references, conditions and workload
//!   documents as read from the API server.
//! - **Readiness**: the scheduled -> ready latency of a unit.
//! - **Owners**: owner reference matching and the ownership chain walked to
//!   attribute a unit to its workload.
//! - **Observation**: the record reported for every unit seen.
//! - **Cluster**: the async port the CLI implements against Kubernetes.
//!
//! # Invariants
//!
//! - Attribution and readiness failures are values, never errors that abort
//!   a scan or a watch.
//! - Latency resolution is whole seconds, matching the condition timestamps.

pub mod cluster;
pub mod error;
pub mod model;
pub mod observation;
pub mod owners;
pub mod readiness;

pub use cluster::{Cluster, Subscription, UnitEvent, UnitEventStream};
pub use error::{FetchError, MissingMilestone, SchemaError};
pub use model::{Condition, ObjectRef, OwnerRef, RuntimeUnit, WorkloadSnapshot};
pub use observation::{Observation, Readiness};
pub use owners::{first_owner_of_kind, Attribution, ChainError, OwnershipChain, UnknownOwner};
pub use readiness::{DuplicatePolicy, Milestone, Milestones, ReadinessLatency, ReadinessTimer};
