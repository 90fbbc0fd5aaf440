//! Event watch loop.
//!
//! Follows unit events for one workload and yields an [`Observation`] for
//! every Added/Modified event of an affiliated unit that reports a phase. The
//! loop is one-shot: the first unit reaching a terminal phase ends it.
//!
//! The subscription is released exactly once on every exit path. Terminal
//! phase, server close, stream failure, deadline and shutdown release it
//! explicitly. Dropping a [`UnitWatch`] mid-stream releases it through the
//! subscription's own drop.

use std::future;
use std::time::Duration;

use chrono::Utc;
use scaleprobe_lifecycle::{
    Attribution, Cluster, FetchError, ObjectRef, Observation, ReadinessTimer, RuntimeUnit,
    Subscription, UnitEvent,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default label carrying the workload name.
pub const DEFAULT_LABEL_KEY: &str = "app";

/// Default phase that ends the watch.
pub const DEFAULT_TERMINAL_PHASE: &str = "Succeeded";

/// What to watch and when to stop.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub namespace: String,
    /// Reported as the owner of every matching unit.
    pub workload: String,
    pub label_key: String,
    pub label_value: String,
    pub terminal_phases: Vec<String>,
    pub deadline: Option<Duration>,
    pub timer: ReadinessTimer,
}

impl WatchOptions {
    /// Units labelled `app=<workload>`, stopping at `Succeeded`.
    pub fn new(namespace: impl Into<String>, workload: impl Into<String>) -> Self {
        let workload = workload.into();
        Self {
            namespace: namespace.into(),
            label_key: DEFAULT_LABEL_KEY.to_string(),
            label_value: workload.clone(),
            workload,
            terminal_phases: vec![DEFAULT_TERMINAL_PHASE.to_string()],
            deadline: None,
            timer: ReadinessTimer::default(),
        }
    }

    pub fn is_terminal(&self, phase: &str) -> bool {
        self.terminal_phases.iter().any(|terminal| terminal == phase)
    }
}

/// Why the loop stopped, or that it has not yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WatchOutcome {
    Watching,
    TerminalPhase { unit: ObjectRef, phase: String },
    StreamClosed,
    StreamFailed { message: String },
    DeadlineElapsed,
    Cancelled,
}

impl WatchOutcome {
    /// Whether the watch achieved what it was waiting for.
    pub fn is_terminal_phase(&self) -> bool {
        matches!(self, WatchOutcome::TerminalPhase { .. })
    }
}

impl std::fmt::Display for WatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchOutcome::Watching => write!(f, "watching"),
            WatchOutcome::TerminalPhase { unit, phase } => {
                write!(f, "unit {unit} reached phase {phase}")
            }
            WatchOutcome::StreamClosed => write!(f, "event stream closed by server"),
            WatchOutcome::StreamFailed { message } => write!(f, "event stream failed: {message}"),
            WatchOutcome::DeadlineElapsed => write!(f, "deadline elapsed"),
            WatchOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

enum Step {
    Event(Option<Result<UnitEvent, FetchError>>),
    Stop(WatchOutcome),
}

/// A live watch. Pull records with [`UnitWatch::next`].
#[derive(Debug)]
pub struct UnitWatch {
    options: WatchOptions,
    subscription: Option<Subscription>,
    deadline: Option<Instant>,
    shutdown: Option<watch::Receiver<bool>>,
    outcome: WatchOutcome,
}

impl UnitWatch {
    /// Open the subscription. Setup failure is returned here.
    pub async fn start(cluster: &dyn Cluster, options: WatchOptions) -> Result<Self, FetchError> {
        let subscription = cluster.watch_units(&options.namespace).await?;
        info!(
            namespace = %options.namespace,
            label = %format!("{}={}", options.label_key, options.label_value),
            terminal = ?options.terminal_phases,
            "Watching units"
        );
        Ok(Self {
            deadline: options.deadline.map(|after| Instant::now() + after),
            options,
            subscription: Some(subscription),
            shutdown: None,
            outcome: WatchOutcome::Watching,
        })
    }

    /// Stop once the receiver observes `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn outcome(&self) -> &WatchOutcome {
        &self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.subscription.is_none()
    }

    /// Next record, or `None` once the loop has ended.
    pub async fn next(&mut self) -> Option<Observation> {
        loop {
            let step = {
                let subscription = self.subscription.as_mut()?;
                tokio::select! {
                    biased;
                    _ = shutdown_requested(self.shutdown.as_mut()) => {
                        Step::Stop(WatchOutcome::Cancelled)
                    }
                    _ = deadline_reached(self.deadline) => Step::Stop(WatchOutcome::DeadlineElapsed),
                    event = subscription.next_event() => Step::Event(event),
                }
            };

            match step {
                Step::Stop(outcome) => {
                    self.finish(outcome);
                    return None;
                }
                Step::Event(None) => {
                    self.finish(WatchOutcome::StreamClosed);
                    return None;
                }
                Step::Event(Some(Err(err))) if err.is_decode() => {
                    warn!(error = %err, "Skipping undecodable event");
                }
                Step::Event(Some(Err(err))) => {
                    self.finish(WatchOutcome::StreamFailed {
                        message: err.to_string(),
                    });
                    return None;
                }
                Step::Event(Some(Ok(UnitEvent::Added(unit) | UnitEvent::Modified(unit)))) => {
                    if let Some(observation) = self.observe(unit) {
                        return Some(observation);
                    }
                }
                Step::Event(Some(Ok(UnitEvent::Error { code, message }))) => {
                    warn!(code, %message, "Server reported a watch error");
                }
                Step::Event(Some(Ok(event))) => {
                    debug!(kind = event.kind(), "Ignoring event");
                }
            }
        }
    }

    fn observe(&mut self, unit: RuntimeUnit) -> Option<Observation> {
        if !unit.has_label(&self.options.label_key, &self.options.label_value) {
            return None;
        }
        let Some(phase) = unit.phase.clone() else {
            debug!(unit = %unit.reference, "Unit has no phase yet");
            return None;
        };

        let observation = Observation {
            owner: Attribution::owned(self.options.workload.clone()),
            readiness: self.options.timer.latency(&unit.conditions).into(),
            phase: Some(phase.clone()),
            observed_at: Utc::now(),
            unit: unit.reference,
        };

        if self.options.is_terminal(&phase) {
            self.finish(WatchOutcome::TerminalPhase {
                unit: observation.unit.clone(),
                phase,
            });
        }
        Some(observation)
    }

    fn finish(&mut self, outcome: WatchOutcome) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        info!(%outcome, "Watch finished");
        self.outcome = outcome;
    }
}

async fn shutdown_requested(shutdown: Option<&mut watch::Receiver<bool>>) {
    match shutdown {
        // Sender gone: no shutdown can arrive.
        Some(receiver) => {
            if receiver.wait_for(|stop| *stop).await.is_err() {
                future::pending::<()>().await;
            }
        }
        None => future::pending().await,
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => future::pending().await,
    }
}
