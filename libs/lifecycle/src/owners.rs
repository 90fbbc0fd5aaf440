//! Owner reference matching and the ownership chain.
//!
//! A unit is attributed to a workload by following owner references upward,
//! one kind per hop: Pod -> ReplicaSet -> Deployment by default. The walk
//! itself needs the cluster and lives with the callers; this module holds the
//! pure pieces.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::OwnerRef;

/// Kind that directly owns runtime units.
pub const CONTROLLER_KIND: &str = "ReplicaSet";

/// Kind at the top of the default chain.
pub const WORKLOAD_KIND: &str = "Deployment";

/// Upper bound on hops in a chain.
pub const MAX_CHAIN_DEPTH: usize = 8;

/// First owner reference of exactly `kind` (case-sensitive).
pub fn first_owner_of_kind<'a>(owners: &'a [OwnerRef], kind: &str) -> Option<&'a OwnerRef> {
    owners.iter().find(|owner| owner.kind == kind)
}

/// Owner kinds from the unit's direct owner up to the workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct OwnershipChain {
    hops: Vec<String>,
}

/// Rejected chain definitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("ownership chain must name at least one kind")]
    Empty,

    #[error("ownership chain has {0} hops, at most {MAX_CHAIN_DEPTH} are allowed")]
    TooDeep(usize),

    #[error("ownership chain contains an empty kind")]
    BlankKind,
}

impl OwnershipChain {
    pub fn new<I, S>(hops: I) -> Result<Self, ChainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hops: Vec<String> = hops.into_iter().map(Into::into).collect();
        if hops.is_empty() {
            return Err(ChainError::Empty);
        }
        if hops.len() > MAX_CHAIN_DEPTH {
            return Err(ChainError::TooDeep(hops.len()));
        }
        if hops.iter().any(|kind| kind.trim().is_empty()) {
            return Err(ChainError::BlankKind);
        }
        Ok(Self { hops })
    }

    pub fn hops(&self) -> &[String] {
        &self.hops
    }

    /// Kind of the unit's direct owner.
    pub fn controller_kind(&self) -> &str {
        &self.hops[0]
    }

    /// Kind at the top of the chain.
    pub fn workload_kind(&self) -> &str {
        &self.hops[self.hops.len() - 1]
    }
}

impl Default for OwnershipChain {
    fn default() -> Self {
        Self {
            hops: vec![CONTROLLER_KIND.to_string(), WORKLOAD_KIND.to_string()],
        }
    }
}

impl TryFrom<Vec<String>> for OwnershipChain {
    type Error = ChainError;

    fn try_from(hops: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(hops)
    }
}

impl From<OwnershipChain> for Vec<String> {
    fn from(chain: OwnershipChain) -> Self {
        chain.hops
    }
}

/// Why a unit could not be attributed. Never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnknownOwner {
    /// The object has no owner reference of the expected kind.
    #[error("{object} has no {kind} owner")]
    NoOwner { object: String, kind: String },

    /// An intermediate object could not be read.
    #[error("lookup of {object} failed: {message}")]
    LookupFailed { object: String, message: String },
}

/// Outcome of attributing a unit to its workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Attribution {
    Owned { workload: String },
    Unknown(UnknownOwner),
}

impl Attribution {
    pub fn owned(workload: impl Into<String>) -> Self {
        Self::Owned {
            workload: workload.into(),
        }
    }

    pub fn workload(&self) -> Option<&str> {
        match self {
            Self::Owned { workload } => Some(workload),
            Self::Unknown(_) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}
