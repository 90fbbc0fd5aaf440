//! Run command (scale up, then observe).

use anyhow::Result;
use clap::{Args, ValueEnum};
use scaleprobe_lifecycle::Cluster;
use tracing::warn;

use crate::output::print_warning;

use super::scale::{print_scale_outcome, scale_once};
use super::scan::{scan_and_print, ScanArgs};
use super::watch::{watch_and_print, WatchArgs};
use super::CommandContext;

/// How to observe after scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// List pods once and report their readiness.
    #[default]
    Scan,
    /// Follow pod events until a terminal phase.
    Watch,
}

/// Run command - the end-to-end probe.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Observation mode after scaling.
    #[arg(long, value_enum, default_value_t = Mode::Scan)]
    mode: Mode,

    /// Observe even when the scale-up fails.
    #[arg(long)]
    continue_on_scale_failure: bool,

    #[command(flatten)]
    scan: ScanArgs,

    #[command(flatten)]
    watch: WatchArgs,
}

impl RunCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let cluster = ctx.cluster().await?;
        self.run_with(&ctx, &cluster).await
    }

    /// Scale first, then observe through the given cluster.
    async fn run_with(&self, ctx: &CommandContext, cluster: &dyn Cluster) -> Result<()> {
        match scale_once(ctx, cluster).await {
            Ok(outcome) => print_scale_outcome(&outcome, ctx.format),
            Err(err) if self.continue_on_scale_failure => {
                warn!(error = %format!("{err:#}"), "Scale attempt failed, continuing without it");
                print_warning(&format!("Scale attempt failed: {err:#}"));
            }
            Err(err) => return Err(err),
        }

        match self.mode {
            Mode::Scan => scan_and_print(ctx, cluster, &self.scan).await,
            Mode::Watch => watch_and_print(ctx, cluster, &self.watch).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use scaleprobe_testing::{unit, FakeCluster};

    use crate::config::Config;
    use crate::output::OutputFormat;
    use crate::scale::ScaleError;

    use super::*;

    fn context() -> CommandContext {
        CommandContext {
            config: Config::default(),
            format: OutputFormat::Json,
            kubeconfig: None,
            context: None,
            namespace: Some("default".to_string()),
            workload: Some("web".to_string()),
        }
    }

    fn command(mode: Mode, continue_on_scale_failure: bool) -> RunCommand {
        RunCommand {
            mode,
            continue_on_scale_failure,
            scan: ScanArgs::default(),
            watch: WatchArgs::default(),
        }
    }

    fn web_pod() -> scaleprobe_lifecycle::RuntimeUnit {
        unit("default", "web-1")
            .label("app", "web")
            .phase("Running")
            .build()
    }

    #[tokio::test]
    async fn scales_then_scans() {
        let cluster = FakeCluster::new()
            .with_workload("Deployment", "default", "web", 3)
            .with_unit(web_pod());

        command(Mode::Scan, false)
            .run_with(&context(), &cluster)
            .await
            .unwrap();

        assert_eq!(cluster.replicas("Deployment", "default", "web"), Some(4));
        assert_eq!(cluster.listings(), 1);
    }

    #[tokio::test]
    async fn failed_scale_aborts_before_observing() {
        let cluster = FakeCluster::new().with_unit(web_pod());
        let probes = cluster.watch_probes();

        for mode in [Mode::Scan, Mode::Watch] {
            let err = command(mode, false)
                .run_with(&context(), &cluster)
                .await
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ScaleError>(),
                Some(ScaleError::Read { .. })
            ));
        }

        assert_eq!(cluster.listings(), 0);
        assert_eq!(probes.opened(), 0);
    }

    #[tokio::test]
    async fn failed_scale_can_continue_to_scan() {
        let cluster = FakeCluster::new().with_unit(web_pod());

        command(Mode::Scan, true)
            .run_with(&context(), &cluster)
            .await
            .unwrap();

        assert!(cluster.writes().is_empty());
        assert_eq!(cluster.listings(), 1);
    }

    #[tokio::test]
    async fn failed_scale_can_continue_to_watch() {
        let cluster = FakeCluster::new().with_watch_script(vec![Ok(
            scaleprobe_lifecycle::UnitEvent::Added(web_pod()),
        )]);
        let probes = cluster.watch_probes();

        command(Mode::Watch, true)
            .run_with(&context(), &cluster)
            .await
            .unwrap();

        assert_eq!(probes.opened(), 1);
        assert_eq!(probes.consumed(), 1);
        assert_eq!(probes.released(), 1);
    }
}
