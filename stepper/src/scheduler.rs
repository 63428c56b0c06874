//! The task-stepping loop and its control surface.
//!
//! One [`Scheduler`] runs per process. Each tick it snapshots the control
//! values and, when enabled, advances every active task by exactly one step,
//! in executor listing order, one task at a time. Control changes made through
//! [`SchedulerControl`] are picked up by the next snapshot.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::registry::RegistrySnapshot;
use crate::core::settings::{FailurePolicy, RunState, SchedulerSettings, Toggle, validate_interval};
use crate::error::StepperError;
use crate::events::{EventBus, SchedulerEvent};
use crate::executor::StepExecutor;

/// Shared, guarded accessor for the scheduler's control values.
///
/// Setters replace one field and return immediately; they never wait for the
/// loop.
#[derive(Clone)]
pub struct SchedulerControl {
    settings: Arc<watch::Sender<SchedulerSettings>>,
    events: EventBus,
}

impl SchedulerControl {
    pub fn new(initial: SchedulerSettings, events: EventBus) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            settings: Arc::new(tx),
            events,
        }
    }

    /// Current values of all fields.
    pub fn snapshot(&self) -> SchedulerSettings {
        *self.settings.borrow()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn set_running(&self, state: RunState) -> bool {
        let enabled = state.is_running();
        self.settings.send_modify(|s| s.enabled = enabled);
        info!(enabled, "run state changed");
        self.events.publish(SchedulerEvent::ControlChanged);
        enabled
    }

    pub fn running(&self) -> bool {
        self.settings.borrow().enabled
    }

    pub fn set_stepwise(&self, toggle: Toggle) -> bool {
        let stepwise = toggle.is_on();
        self.settings.send_modify(|s| s.stepwise = stepwise);
        info!(stepwise, "stepwise mode changed");
        self.events.publish(SchedulerEvent::ControlChanged);
        stepwise
    }

    pub fn stepwise(&self) -> bool {
        self.settings.borrow().stepwise
    }

    /// Set the tick interval. Rejects non-positive values without changing
    /// anything.
    pub fn set_interval(&self, secs: i64) -> Result<u64, StepperError> {
        let interval_secs = validate_interval(secs)?;
        self.settings.send_modify(|s| s.interval_secs = interval_secs);
        info!(interval_secs, "step interval changed");
        self.events.publish(SchedulerEvent::ControlChanged);
        Ok(interval_secs)
    }

    pub fn interval_secs(&self) -> u64 {
        self.settings.borrow().interval_secs
    }

    /// End-of-tick stepwise check: disable the loop if stepwise is on now.
    fn pause_if_stepwise(&self) -> bool {
        let mut paused = false;
        self.settings.send_if_modified(|s| {
            paused = s.stepwise && s.enabled;
            if paused {
                s.enabled = false;
            }
            paused
        });
        if paused {
            info!("stepwise tick finished, pausing");
            self.events.publish(SchedulerEvent::ControlChanged);
        }
        paused
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// False when the loop was disabled and the tick was a no-op.
    pub ran: bool,
    /// Task ids whose step succeeded, and was finalized if last, in visit order.
    pub stepped: Vec<String>,
    /// Task ids finalized this tick.
    pub completed: Vec<String>,
    /// Task ids whose step (or finalization) failed.
    pub failed: Vec<String>,
    /// Stepwise mode disabled the loop at the end of this tick.
    pub paused: bool,
}

pub struct Scheduler {
    executor: Arc<dyn StepExecutor>,
    control: SchedulerControl,
}

impl Scheduler {
    pub fn new(executor: Arc<dyn StepExecutor>, control: SchedulerControl) -> Self {
        Self { executor, control }
    }

    pub fn control(&self) -> &SchedulerControl {
        &self.control
    }

    /// Run one tick without sleeping.
    ///
    /// Failures never escape: they are logged, broadcast and recorded in the
    /// report, and the next tick starts as usual.
    pub async fn tick(&self) -> TickReport {
        let settings = self.control.snapshot();
        if !settings.enabled {
            return TickReport::default();
        }

        let mut report = TickReport {
            ran: true,
            ..TickReport::default()
        };
        match RegistrySnapshot::capture(&*self.executor) {
            Ok(snapshot) => {
                debug!(
                    active = snapshot.active().count(),
                    completed = snapshot.completed_count(),
                    "tick"
                );
                self.advance_all(&snapshot, settings.failure_policy, &mut report)
                    .await;
            }
            Err(err) => warn!(error = %err, "failed to list tasks, skipping tick"),
        }

        report.paused = self.control.pause_if_stepwise();
        report
    }

    async fn advance_all(
        &self,
        snapshot: &RegistrySnapshot,
        policy: FailurePolicy,
        report: &mut TickReport,
    ) {
        let events = self.control.events();
        for task_id in snapshot.active_ids() {
            let result = match self.executor.advance_one_step(&task_id).await {
                Ok(output) => {
                    events.publish(SchedulerEvent::StepCompleted {
                        task_id: task_id.clone(),
                        step: output.task_step.index,
                        is_last: output.is_last,
                    });
                    let finalized = if output.is_last {
                        self.executor.finalize(&task_id, &output)
                    } else {
                        Ok(())
                    };
                    finalized.map(|()| output.is_last)
                }
                Err(err) => Err(err),
            };

            match result {
                Ok(true) => {
                    info!(task_id = %task_id, "task completed");
                    report.stepped.push(task_id.clone());
                    report.completed.push(task_id.clone());
                    events.publish(SchedulerEvent::TaskCompleted { task_id });
                }
                Ok(false) => report.stepped.push(task_id),
                Err(err) => {
                    warn!(task_id = %task_id, error = %err, "step failed");
                    report.failed.push(task_id.clone());
                    events.publish(SchedulerEvent::StepFailed {
                        task_id,
                        error: err.to_string(),
                    });
                    if policy == FailurePolicy::HaltTick {
                        break;
                    }
                }
            }
        }
    }

    /// Tick, sleep for the current interval, repeat until `cancel` fires.
    ///
    /// Cancellation interrupts the sleep but lets an in-flight tick finish.
    /// An interval change applies to the next sleep, not the current one.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.control.interval_secs(), "scheduler started");
        while !cancel.is_cancelled() {
            let report = self.tick().await;
            if report.ran {
                debug!(
                    stepped = report.stepped.len(),
                    completed = report.completed.len(),
                    failed = report.failed.len(),
                    paused = report.paused,
                    "tick finished"
                );
            }

            let interval = self.control.snapshot().interval();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("scheduler stopped");
    }

    /// Start the loop on the runtime. Consumes the scheduler so it can only be
    /// started once.
    pub fn spawn(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(self.run(cancel.clone()));
        SchedulerHandle { cancel, join }
    }
}

/// Owner of a running scheduler loop.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.join.await.context("join scheduler task")
    }
}
