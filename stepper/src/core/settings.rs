//! Scheduler control values and their validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StepperError;

pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// What the loop does when a task's step fails mid-tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop visiting tasks for the rest of the tick.
    #[default]
    HaltTick,
    /// Log the failure and move on to the next task.
    SkipTask,
}

/// Snapshot of the scheduler's control values.
///
/// The loop reads one snapshot at the start of each tick. Each field is
/// replaced whole by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Whether ticks advance tasks.
    pub enabled: bool,
    /// Disable `enabled` after each completed tick.
    pub stepwise: bool,
    /// Sleep between ticks, and idle poll period while disabled.
    pub interval_secs: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            stepwise: false,
            interval_secs: DEFAULT_INTERVAL_SECS,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Requested run state for `POST /running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Stopped,
}

impl RunState {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

/// Requested stepwise mode for `POST /stepwise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// Accept a tick interval in whole seconds; it must be positive.
pub fn validate_interval(secs: i64) -> Result<u64, StepperError> {
    if secs <= 0 {
        return Err(StepperError::InvalidInput(format!(
            "interval must be a positive number of seconds, got {secs}"
        )));
    }
    Ok(secs as u64)
}
