//! Scan command (attribute and time every pod in the namespace).

use anyhow::{Context, Result};
use clap::Args;
use scaleprobe_lifecycle::Cluster;

use crate::output::print_observations;
use crate::scan::only_workload;

use super::CommandContext;

/// Scan command - one record per pod currently listed.
#[derive(Debug, Args)]
pub struct ScanCommand {
    #[command(flatten)]
    args: ScanArgs,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ScanArgs {
    /// Only report pods owned by the target workload.
    #[arg(long)]
    only_workload: bool,

    /// Pods examined at once.
    #[arg(long)]
    concurrency: Option<usize>,
}

impl ScanCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let cluster = ctx.cluster().await?;
        scan_and_print(&ctx, &cluster, &self.args).await
    }
}

pub(super) async fn scan_and_print(
    ctx: &CommandContext,
    cluster: &dyn Cluster,
    args: &ScanArgs,
) -> Result<()> {
    let namespace = ctx.namespace();
    let mut observations = ctx
        .batch_scan(args.concurrency)
        .scan_all(cluster, namespace)
        .await
        .with_context(|| format!("Failed to list pods in namespace {namespace}"))?;

    if args.only_workload {
        observations = only_workload(observations, ctx.require_workload()?);
    }

    print_observations(&observations, ctx.format);
    Ok(())
}
