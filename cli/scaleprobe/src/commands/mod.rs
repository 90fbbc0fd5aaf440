//! CLI commands.

mod run;
mod scale;
mod scan;
mod watch;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::client::KubeCluster;
use crate::config::{default_kubeconfig, Config};
use crate::error::CliError;
use crate::logging::{self, LogFormat};
use crate::output::OutputFormat;
use crate::resolve::OwnershipResolver;
use crate::scale::{RetryPolicy, ScaleTrigger};
use crate::scan::BatchScan;

/// scaleprobe - scale a workload and watch its new pods become ready.
#[derive(Debug, Parser)]
#[command(name = "scaleprobe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Path to the kubeconfig file (default: ~/.kube/config).
    #[arg(long, global = true, env = "SCALEPROBE_KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one.
    #[arg(long, global = true, env = "SCALEPROBE_CONTEXT")]
    context: Option<String>,

    /// Namespace of the workload and its pods.
    #[arg(short, long, global = true, env = "SCALEPROBE_NAMESPACE")]
    namespace: Option<String>,

    /// Name of the workload to scale and observe.
    #[arg(short, long, global = true, env = "SCALEPROBE_WORKLOAD")]
    workload: Option<String>,

    /// Config file (default: the user config directory).
    #[arg(long, global = true, env = "SCALEPROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Log line format on stderr.
    #[arg(
        long,
        global = true,
        value_enum,
        env = "SCALEPROBE_LOG_FORMAT",
        default_value_t = LogFormat::Text
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Add one replica to the workload.
    Scale(scale::ScaleCommand),

    /// Attribute every pod in the namespace and report its readiness latency.
    Scan(scan::ScanCommand),

    /// Follow pod events for the workload until one reaches a terminal phase.
    Watch(watch::WatchCommand),

    /// Scale up, then scan or watch.
    Run(run::RunCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        logging::init(self.log_format);

        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };

        let ctx = CommandContext {
            config,
            format: self.format,
            kubeconfig: self.kubeconfig,
            context: self.context,
            namespace: self.namespace,
            workload: self.workload,
        };

        match self.command {
            Commands::Scale(cmd) => cmd.run(ctx).await,
            Commands::Scan(cmd) => cmd.run(ctx).await,
            Commands::Watch(cmd) => cmd.run(ctx).await,
            Commands::Run(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("scaleprobe {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub workload: Option<String>,
}

impl CommandContext {
    /// Resolve the namespace, preferring flag over config.
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(&self.config.namespace)
    }

    /// Resolve the workload, preferring flag over config.
    pub fn resolve_workload(&self) -> Option<&str> {
        self.workload.as_deref().or(self.config.workload.as_deref())
    }

    /// Require a workload to be specified.
    pub fn require_workload(&self) -> Result<&str, CliError> {
        self.resolve_workload().ok_or(CliError::NoWorkload)
    }

    fn kubeconfig_path(&self) -> Result<PathBuf> {
        self.kubeconfig
            .clone()
            .or_else(|| self.config.kubeconfig.clone())
            .or_else(default_kubeconfig)
            .ok_or_else(|| anyhow::anyhow!("Could not locate a kubeconfig. Use --kubeconfig."))
    }

    /// Connect to the cluster named by the kubeconfig.
    pub async fn cluster(&self) -> Result<KubeCluster> {
        let path = self.kubeconfig_path()?;
        let context = self.context.as_deref().or(self.config.context.as_deref());
        Ok(KubeCluster::connect(&path, context).await?)
    }

    pub fn resolver(&self) -> OwnershipResolver {
        OwnershipResolver::new(self.config.ownership_chain.clone())
    }

    pub fn scale_trigger(&self) -> ScaleTrigger {
        ScaleTrigger::new(self.config.workload_kind()).with_retry(RetryPolicy {
            max_attempts: self.config.scale_max_attempts,
            ..RetryPolicy::default()
        })
    }

    pub fn batch_scan(&self, concurrency: Option<usize>) -> BatchScan {
        BatchScan::new(self.resolver(), self.config.readiness.clone())
            .with_concurrency(concurrency.unwrap_or(self.config.scan_concurrency))
    }

    pub fn watch_deadline(&self, override_secs: Option<u64>) -> Option<Duration> {
        override_secs
            .or(self.config.watch_deadline_secs)
            .map(Duration::from_secs)
    }
}

/// Receiver flipped to `true` on Ctrl+C.
pub fn shutdown_on_ctrl_c() -> tokio::sync::watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });
    shutdown_rx
}
