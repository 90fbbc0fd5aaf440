//! Configuration file handling.
//!
//! Handles:
//! - Cluster access (kubeconfig path, context)
//! - Default target (namespace, workload)
//! - Probe tuning (ownership chain, milestones, watch policy, retries)
//!
//! Flags and `SCALEPROBE_*` environment variables override every value here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use scaleprobe_lifecycle::{OwnershipChain, ReadinessTimer};
use serde::{Deserialize, Serialize};

use crate::scale::DEFAULT_MAX_ATTEMPTS;
use crate::scan::DEFAULT_CONCURRENCY;
use crate::watch::{DEFAULT_LABEL_KEY, DEFAULT_TERMINAL_PHASE};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Get the config directory path.
fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("dev", "scaleprobe", "scaleprobe")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// `~/.kube/config`, if a home directory is known.
pub fn default_kubeconfig() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".kube").join("config"))
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Kubeconfig path. Defaults to `~/.kube/config`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context. Defaults to the current context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    pub namespace: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload: Option<String>,

    /// Owner kinds from the unit's controller up to the scaled workload.
    pub ownership_chain: OwnershipChain,

    pub readiness: ReadinessTimer,

    pub label_key: String,

    pub terminal_phases: Vec<String>,

    pub scale_max_attempts: u32,

    pub scan_concurrency: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_deadline_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            namespace: "default".to_string(),
            workload: None,
            ownership_chain: OwnershipChain::default(),
            readiness: ReadinessTimer::default(),
            label_key: DEFAULT_LABEL_KEY.to_string(),
            terminal_phases: vec![DEFAULT_TERMINAL_PHASE.to_string()],
            scale_max_attempts: DEFAULT_MAX_ATTEMPTS,
            scan_concurrency: DEFAULT_CONCURRENCY,
            watch_deadline_secs: None,
        }
    }
}

impl Config {
    /// Load config from the user config directory, or return default.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join(CONFIG_FILE))
    }

    /// Load config from `path`, or return default when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Kind of the workload the probe scales.
    pub fn workload_kind(&self) -> &str {
        self.ownership_chain.workload_kind()
    }
}
