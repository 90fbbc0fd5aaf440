//! scaleprobe: scale a Kubernetes workload and measure how fast its pods
//! become ready.
//!
//! The probe adds one replica to a workload, then either scans the namespace
//! once or follows pod events:
//!
//! - [`scale`]: replica increment with optimistic-concurrency retry.
//! - [`resolve`]: pod -> ReplicaSet -> Deployment attribution.
//! - [`readiness`]: scheduled -> ready latency of a live pod.
//! - [`scan`]: one observation per listed pod, failures isolated per pod.
//! - [`watch`]: event loop that stops at the first terminal phase.
//!
//! [`client::KubeCluster`] implements the [`scaleprobe_lifecycle::Cluster`]
//! port against a real API server.

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod readiness;
pub mod resolve;
pub mod scale;
pub mod scan;
pub mod watch;
