//! Error handling and display for the CLI.

use std::path::PathBuf;

use colored::Colorize;
use scaleprobe_lifecycle::FetchError;
use thiserror::Error;

use crate::scale::ScaleError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("No workload specified. Use --workload or set `workload` in the config file.")]
    NoWorkload,

    #[error("Could not load kubeconfig {}: {message}", path.display())]
    Kubeconfig { path: PathBuf, message: String },
}

/// Hint for the first recognisable error in the chain.
fn hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return match cli_err {
                CliError::NoWorkload => Some("Pass -w <name> or set SCALEPROBE_WORKLOAD."),
                CliError::Kubeconfig { .. } => {
                    Some("Check --kubeconfig / SCALEPROBE_KUBECONFIG and the selected context.")
                }
            };
        }
        if let Some(ScaleError::ConflictsExhausted { .. }) = cause.downcast_ref::<ScaleError>() {
            return Some(
                "Another controller (an autoscaler?) keeps changing the replica count. Retry later.",
            );
        }
        cause.downcast_ref::<FetchError>().and_then(fetch_hint)
    })
}

fn fetch_hint(err: &FetchError) -> Option<&'static str> {
    match err {
        FetchError::Api { status: 401, .. } => {
            Some("Your credentials may have expired. Refresh the kubeconfig.")
        }
        FetchError::Api { status: 403, .. } => {
            Some("You may not have permission for this operation in this namespace.")
        }
        FetchError::NotFound { .. } => Some("Check the --namespace and --workload values."),
        FetchError::Conflict { .. } => Some("The object changed while updating it. Retry."),
        FetchError::Transport(_) => {
            Some("Check your network connection and the cluster endpoint in the kubeconfig.")
        }
        FetchError::UnsupportedKind(_) => Some(
            "Supported kinds: Deployment, ReplicaSet, StatefulSet, DaemonSet, Job, CronJob, ReplicationController.",
        ),
        _ => None,
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(hint) = hint(err) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use scaleprobe_lifecycle::ObjectRef;

    use super::*;

    #[test]
    fn hint_found_through_context() {
        let err = Err::<(), _>(FetchError::Api {
            status: 403,
            message: "forbidden".to_string(),
        })
        .context("listing pods")
        .unwrap_err();
        assert_eq!(
            hint(&err),
            Some("You may not have permission for this operation in this namespace.")
        );
    }

    #[test]
    fn hint_for_nested_scale_error() {
        let scale = ScaleError::Read {
            kind: "Deployment".to_string(),
            workload: ObjectRef::new("default", "web"),
            source: FetchError::not_found("Deployment", "web"),
        };
        let err = Err::<(), _>(scale)
            .context("Failed to scale the workload")
            .unwrap_err();
        assert_eq!(hint(&err), Some("Check the --namespace and --workload values."));
    }

    #[test]
    fn hint_for_missing_workload() {
        let err = anyhow::Error::new(CliError::NoWorkload);
        assert!(hint(&err).is_some_and(|hint| hint.contains("SCALEPROBE_WORKLOAD")));
    }

    #[test]
    fn exhausted_conflicts_hint() {
        let err = anyhow::Error::new(ScaleError::ConflictsExhausted {
            kind: "Deployment".to_string(),
            workload: ObjectRef::new("default", "web"),
            attempts: 5,
        });
        assert!(hint(&err).is_some_and(|hint| hint.contains("autoscaler")));
    }

    #[test]
    fn decode_errors_have_no_hint() {
        let err = anyhow::Error::new(FetchError::Decode("bad".to_string()));
        assert_eq!(hint(&err), None);
    }
}
