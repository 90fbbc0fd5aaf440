//! Watch command (follow pod events until a terminal phase).

use anyhow::{Context, Result};
use clap::Args;
use scaleprobe_lifecycle::Cluster;

use crate::output::{print_info, print_observation_line, print_warning, OutputFormat};
use crate::watch::{UnitWatch, WatchOptions, WatchOutcome};

use super::{shutdown_on_ctrl_c, CommandContext};

/// Watch command - stream pod observations for the workload.
#[derive(Debug, Args)]
pub struct WatchCommand {
    #[command(flatten)]
    args: WatchArgs,
}

#[derive(Debug, Clone, Default, Args)]
pub struct WatchArgs {
    /// Phase that ends the watch. Can be specified multiple times.
    #[arg(long = "terminal-phase")]
    terminal_phases: Vec<String>,

    /// Label key identifying the workload's pods.
    #[arg(long)]
    label_key: Option<String>,

    /// Label value identifying the workload's pods (default: workload name).
    #[arg(long)]
    label_value: Option<String>,

    /// Stop after this many seconds.
    #[arg(long)]
    deadline_secs: Option<u64>,
}

impl WatchCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let cluster = ctx.cluster().await?;
        watch_and_print(&ctx, &cluster, &self.args).await
    }
}

fn watch_options(ctx: &CommandContext, args: &WatchArgs) -> Result<WatchOptions> {
    let mut options = WatchOptions::new(ctx.namespace(), ctx.require_workload()?);
    options.label_key = args
        .label_key
        .clone()
        .unwrap_or_else(|| ctx.config.label_key.clone());
    if let Some(value) = &args.label_value {
        options.label_value = value.clone();
    }
    options.terminal_phases = if args.terminal_phases.is_empty() {
        ctx.config.terminal_phases.clone()
    } else {
        args.terminal_phases.clone()
    };
    options.deadline = ctx.watch_deadline(args.deadline_secs);
    options.timer = ctx.config.readiness.clone();
    Ok(options)
}

pub(super) async fn watch_and_print(
    ctx: &CommandContext,
    cluster: &dyn Cluster,
    args: &WatchArgs,
) -> Result<()> {
    let options = watch_options(ctx, args)?;
    let namespace = options.namespace.clone();

    let mut watch = UnitWatch::start(cluster, options)
        .await
        .with_context(|| format!("Failed to watch pods in namespace {namespace}"))?
        .with_shutdown(shutdown_on_ctrl_c());

    while let Some(observation) = watch.next().await {
        print_observation_line(&observation, ctx.format);
    }

    match (watch.outcome(), ctx.format) {
        (WatchOutcome::StreamFailed { .. } | WatchOutcome::DeadlineElapsed, _) => {
            print_warning(&format!("Watch ended: {}", watch.outcome()));
        }
        (outcome, OutputFormat::Table) => print_info(&format!("Watch ended: {outcome}")),
        (_, OutputFormat::Json) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::Config;

    use super::*;

    fn context(config: Config) -> CommandContext {
        CommandContext {
            config,
            format: OutputFormat::Table,
            kubeconfig: None,
            context: None,
            namespace: Some("shop".to_string()),
            workload: Some("checkout".to_string()),
        }
    }

    #[test]
    fn options_default_to_config() {
        let config = Config {
            label_key: "app.kubernetes.io/name".to_string(),
            watch_deadline_secs: Some(30),
            ..Config::default()
        };
        let options = watch_options(&context(config), &WatchArgs::default()).unwrap();

        assert_eq!(options.namespace, "shop");
        assert_eq!(options.label_key, "app.kubernetes.io/name");
        assert_eq!(options.label_value, "checkout");
        assert_eq!(options.terminal_phases, ["Succeeded"]);
        assert_eq!(options.deadline, Some(std::time::Duration::from_secs(30)));
    }

    #[test]
    fn flags_override_options() {
        let args = WatchArgs {
            terminal_phases: vec!["Failed".to_string(), "Succeeded".to_string()],
            label_key: Some("tier".to_string()),
            label_value: Some("frontend".to_string()),
            deadline_secs: Some(5),
        };
        let options = watch_options(&context(Config::default()), &args).unwrap();

        assert_eq!(options.workload, "checkout");
        assert_eq!(options.label_key, "tier");
        assert_eq!(options.label_value, "frontend");
        assert!(options.is_terminal("Failed"));
        assert_eq!(options.deadline, Some(std::time::Duration::from_secs(5)));
    }
}
