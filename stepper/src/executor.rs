//! Step executor abstraction.
//!
//! The [`StepExecutor`] trait decouples the scheduler and the HTTP surface from
//! whatever owns task state and computes reasoning steps. [`crate::agent`]
//! provides the in-memory implementation; tests swap in scripted reasoners
//! underneath it.

use async_trait::async_trait;

use crate::core::types::{ChatMessage, StepOutput, Task, TaskState, TaskStep};
use crate::error::StepperError;

/// Owner of task, step and chat state.
///
/// Only [`StepExecutor::advance_one_step`] suspends. Every other method is
/// immediate and must not hold locks beyond its own call.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Register a new task and queue its first step.
    fn create_task(&self, input: &str) -> Result<Task, StepperError>;

    /// All tasks, active and completed, in creation order.
    fn list_tasks(&self) -> Result<Vec<Task>, StepperError>;

    /// Tasks that have been finalized.
    fn list_completed_tasks(&self) -> Result<Vec<Task>, StepperError>;

    fn task_state(&self, task_id: &str) -> Result<TaskState, StepperError>;

    /// Compute the next step for `task_id`.
    async fn advance_one_step(&self, task_id: &str) -> Result<StepOutput, StepperError>;

    /// Mark `task_id` completed with its final step. Idempotent.
    fn finalize(&self, task_id: &str, step: &StepOutput) -> Result<(), StepperError>;

    /// Latest step output for `task_id` (the final one once completed).
    fn get_output(&self, task_id: &str) -> Result<StepOutput, StepperError>;

    fn list_upcoming_steps(&self, task_id: &str) -> Result<Vec<TaskStep>, StepperError>;

    fn list_completed_steps(&self, task_id: &str) -> Result<Vec<StepOutput>, StepperError>;

    fn chat_history(&self) -> Result<Vec<ChatMessage>, StepperError>;

    /// Drop every task and the chat history.
    fn reset(&self) -> Result<(), StepperError>;
}
