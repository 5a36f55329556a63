//! Progress tasks that put the workstation under load.
//!
//! A running task holds a [`LoadGuard`](crate::telemetry::LoadGuard) at its
//! elevated load for as long as it runs, so the telemetry simulator drifts
//! harder until the task finishes or is cancelled.

use crate::error::{Error, Result};
use crate::telemetry::{LoadFactor, MIN_TICK, TelemetryHub};
use crate::types::LogKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Workflow,
    Synthesis,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Workflow => "Workflow execution",
            TaskKind::Synthesis => "3D synthesis",
        }
    }

    pub fn default_profile(&self) -> TaskProfile {
        match self {
            TaskKind::Workflow => TaskProfile {
                load: 2.5,
                period: Duration::from_millis(400),
                step: (4, 12),
            },
            TaskKind::Synthesis => TaskProfile {
                load: 4.0,
                period: Duration::from_millis(250),
                step: (1, 6),
            },
        }
    }
}

/// Load, cadence and per-tick progress range of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProfile {
    pub load: f64,
    pub period: Duration,
    /// Inclusive progress increment range per tick.
    pub step: (u8, u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum TaskState {
    Idle,
    Running(u8),
    Completed,
    Failed(String),
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        matches!(self, TaskState::Running(_))
    }

    /// Progress percentage, 100 once completed.
    pub fn progress(&self) -> u8 {
        match self {
            TaskState::Running(p) => *p,
            TaskState::Completed => 100,
            TaskState::Idle | TaskState::Failed(_) => 0,
        }
    }
}

/// Marks the task failed if `run` is dropped before it finishes.
struct RunningGuard<'a>(&'a watch::Sender<TaskState>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|state| {
            if !state.is_running() {
                return false;
            }
            *state = TaskState::Failed("interrupted".to_string());
            true
        });
    }
}

pub struct ProgressTask {
    kind: TaskKind,
    profile: TaskProfile,
    hub: Arc<TelemetryHub>,
    load: LoadFactor,
    state_tx: watch::Sender<TaskState>,
}

impl ProgressTask {
    pub fn new(kind: TaskKind, hub: Arc<TelemetryHub>, load: LoadFactor) -> Self {
        let (state_tx, _) = watch::channel(TaskState::Idle);
        Self {
            kind,
            profile: kind.default_profile(),
            hub,
            load,
            state_tx,
        }
    }

    /// Replace the profile. A period below [`MIN_TICK`] is raised to it.
    pub fn with_profile(mut self, profile: TaskProfile) -> Self {
        self.profile = TaskProfile {
            period: profile.period.max(MIN_TICK),
            ..profile
        };
        self
    }

    /// Override only the elevated load.
    pub fn with_load(mut self, load: f64) -> Self {
        self.profile.load = load;
        self
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn profile(&self) -> &TaskProfile {
        &self.profile
    }

    pub fn state(&self) -> TaskState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state_tx.subscribe()
    }

    /// Run to completion or until `cancel` fires.
    ///
    /// Returns [`Error::Busy`] if the task is already running.
    pub async fn run(&self, cancel: CancellationToken) -> Result<TaskState> {
        let started = self.state_tx.send_if_modified(|state| {
            if state.is_running() {
                return false;
            }
            *state = TaskState::Running(0);
            true
        });
        if !started {
            return Err(Error::Busy);
        }
        let _running = RunningGuard(&self.state_tx);

        let guard = self.load.acquire(self.profile.load);
        self.hub
            .add_log(format!("{} started", self.kind.label()), LogKind::Info);
        info!(kind = ?self.kind, load = self.profile.load, "Task started");

        let mut rng = StdRng::from_entropy();
        let (lo, hi) = self.profile.step;
        let mut ticker = interval_at(Instant::now() + self.profile.period, self.profile.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut progress: u8 = 0;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break TaskState::Failed("cancelled".to_string()),
                _ = ticker.tick() => {
                    let step = rng.gen_range(lo.min(hi)..=hi.max(lo));
                    progress = progress.saturating_add(step).min(100);
                    debug!(kind = ?self.kind, progress, "Task progress");
                    if progress >= 100 {
                        break TaskState::Completed;
                    }
                    self.state_tx.send_replace(TaskState::Running(progress));
                }
            }
        };

        let restored = guard.release();
        debug!(kind = ?self.kind, restored, "Task load released");

        match &outcome {
            TaskState::Completed => {
                self.hub
                    .add_log(format!("{} complete", self.kind.label()), LogKind::Info);
                info!(kind = ?self.kind, "Task complete");
            }
            TaskState::Failed(reason) => {
                self.hub.add_log(
                    format!("{} aborted: {}", self.kind.label(), reason),
                    LogKind::Warn,
                );
                info!(kind = ?self.kind, reason = %reason, "Task aborted");
            }
            TaskState::Idle | TaskState::Running(_) => {}
        }

        self.state_tx.send_replace(outcome.clone());
        Ok(outcome)
    }
}
