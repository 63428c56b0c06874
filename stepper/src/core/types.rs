//! Shared types for tasks, steps and chat history.
//!
//! These are the response shapes of the query surface as well as the records
//! the executor keeps, so they serialize directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of agent work. `task_id` is assigned by the executor at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub input: String,
}

/// One increment of reasoning work queued for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStep {
    pub task_id: String,
    pub step_id: String,
    /// Zero-based position of the step within its task.
    pub index: u32,
    /// User input carried by the step. Only the first step has one.
    pub input: Option<String>,
}

/// Result of executing a [`TaskStep`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    pub output: String,
    pub is_last: bool,
    pub task_step: TaskStep,
}

/// Everything the executor tracks for a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    pub task: Task,
    pub upcoming_steps: Vec<TaskStep>,
    pub completed_steps: Vec<StepOutput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
