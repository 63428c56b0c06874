//! Read-only projections of executor state for the HTTP surface.
//!
//! Nothing here mutates the executor. Lookups of unknown task ids fail with
//! [`StepperError::NotFound`].

use std::sync::Arc;

use serde::Serialize;

use crate::core::registry::RegistrySnapshot;
use crate::core::types::{ChatMessage, StepOutput, Task, TaskState, TaskStep};
use crate::error::StepperError;
use crate::executor::StepExecutor;

/// Task state plus its registry membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStateView {
    #[serde(flatten)]
    pub state: TaskState,
    pub completed: bool,
}

#[derive(Clone)]
pub struct QuerySurface {
    executor: Arc<dyn StepExecutor>,
}

impl QuerySurface {
    pub fn new(executor: Arc<dyn StepExecutor>) -> Self {
        Self { executor }
    }

    /// Every task, active or completed.
    pub fn tasks(&self) -> Result<Vec<Task>, StepperError> {
        self.executor.list_tasks()
    }

    pub fn active_tasks(&self) -> Result<Vec<Task>, StepperError> {
        let snapshot = RegistrySnapshot::capture(&*self.executor)?;
        Ok(snapshot.active().cloned().collect())
    }

    pub fn completed_tasks(&self) -> Result<Vec<Task>, StepperError> {
        self.executor.list_completed_tasks()
    }

    pub fn task_state(&self, task_id: &str) -> Result<TaskStateView, StepperError> {
        let state = self.executor.task_state(task_id)?;
        let snapshot = RegistrySnapshot::capture(&*self.executor)?;
        Ok(TaskStateView {
            completed: snapshot.is_completed(task_id),
            state,
        })
    }

    pub fn output(&self, task_id: &str) -> Result<StepOutput, StepperError> {
        self.executor.get_output(task_id)
    }

    pub fn upcoming_steps(&self, task_id: &str) -> Result<Vec<TaskStep>, StepperError> {
        self.executor.list_upcoming_steps(task_id)
    }

    pub fn completed_steps(&self, task_id: &str) -> Result<Vec<StepOutput>, StepperError> {
        self.executor.list_completed_steps(task_id)
    }

    pub fn messages(&self) -> Result<Vec<ChatMessage>, StepperError> {
        self.executor.chat_history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRunner;
    use crate::error::ErrorCode;
    use crate::test_support::{ScriptedReasoner, finish};

    #[tokio::test]
    async fn task_state_reports_completion() {
        let agent = Arc::new(AgentRunner::new(Arc::new(ScriptedReasoner::new(vec![
            finish("done"),
        ]))));
        let query = QuerySurface::new(agent.clone());
        let task = agent.create_task("a").expect("create");

        let view = query.task_state(&task.task_id).expect("state");
        assert!(!view.completed);
        assert_eq!(query.active_tasks().expect("active"), vec![task.clone()]);

        let output = agent.advance_one_step(&task.task_id).await.expect("step");
        agent.finalize(&task.task_id, &output).expect("finalize");

        let view = query.task_state(&task.task_id).expect("state");
        assert!(view.completed);
        assert_eq!(view.state.completed_steps.len(), 1);
        assert!(query.active_tasks().expect("active").is_empty());
        assert_eq!(query.tasks().expect("all"), vec![task]);
    }

    #[test]
    fn unknown_task_state_is_not_found_and_changes_nothing() {
        let agent = Arc::new(AgentRunner::new(Arc::new(ScriptedReasoner::default())));
        let query = QuerySurface::new(agent.clone());
        agent.create_task("a").expect("create");

        let err = query.task_state("missing").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(query.tasks().expect("all").len(), 1);
        assert!(query.completed_tasks().expect("completed").is_empty());
    }

    #[test]
    fn state_view_flattens_task_state() {
        let agent = Arc::new(AgentRunner::new(Arc::new(ScriptedReasoner::default())));
        let query = QuerySurface::new(agent.clone());
        let task = agent.create_task("a").expect("create");

        let value = serde_json::to_value(query.task_state(&task.task_id).expect("state"))
            .expect("serialize");
        assert_eq!(value["task"]["task_id"], task.task_id);
        assert_eq!(value["upcoming_steps"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["completed"], false);
    }
}
