//! Scale command (add one replica).

use anyhow::Result;
use clap::Args;
use scaleprobe_lifecycle::{Cluster, ObjectRef};

use crate::output::{print_json, print_success, OutputFormat};
use crate::scale::ScaleOutcome;

use super::CommandContext;

/// Scale command - increase the workload's desired replicas by one.
#[derive(Debug, Args)]
pub struct ScaleCommand {
    /// Attempts before giving up when the replica count keeps changing.
    #[arg(long)]
    max_attempts: Option<u32>,
}

impl ScaleCommand {
    pub async fn run(self, mut ctx: CommandContext) -> Result<()> {
        if let Some(max_attempts) = self.max_attempts {
            ctx.config.scale_max_attempts = max_attempts;
        }
        let cluster = ctx.cluster().await?;
        let outcome = scale_once(&ctx, &cluster).await?;
        print_scale_outcome(&outcome, ctx.format);
        Ok(())
    }
}

/// Run the scale trigger against the context's workload.
pub(super) async fn scale_once(
    ctx: &CommandContext,
    cluster: &dyn Cluster,
) -> Result<ScaleOutcome> {
    let workload = ObjectRef::new(ctx.namespace(), ctx.require_workload()?);
    Ok(ctx.scale_trigger().scale_up(cluster, &workload).await?)
}

pub(super) fn print_scale_outcome(outcome: &ScaleOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(outcome),
        OutputFormat::Table => print_success(&scale_line(outcome)),
    }
}

/// Human summary of a scale-up, stamped with when it landed.
fn scale_line(outcome: &ScaleOutcome) -> String {
    let attempts = match outcome.attempts {
        1 => String::new(),
        n => format!(" after {n} attempts"),
    };
    format!(
        "Scaled {} {} from {} to {} replicas at {}{}",
        outcome.kind,
        outcome.workload,
        outcome.previous_replicas,
        outcome.desired_replicas,
        outcome
            .scaled_at
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        attempts
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn outcome(attempts: u32) -> ScaleOutcome {
        ScaleOutcome {
            kind: "Deployment".to_string(),
            workload: ObjectRef::new("default", "web"),
            previous_replicas: 3,
            desired_replicas: 4,
            attempts,
            scaled_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 7).unwrap(),
        }
    }

    #[test]
    fn scale_line_carries_the_scale_time() {
        assert_eq!(
            scale_line(&outcome(1)),
            "Scaled Deployment default/web from 3 to 4 replicas at 2024-03-01T12:00:07Z"
        );
    }

    #[test]
    fn scale_line_mentions_retries() {
        assert!(scale_line(&outcome(3)).ends_with("at 2024-03-01T12:00:07Z after 3 attempts"));
    }
}
