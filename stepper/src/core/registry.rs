//! Read-only partition of the executor's tasks into active and completed.

use std::collections::HashSet;

use crate::core::types::Task;
use crate::error::StepperError;
use crate::executor::StepExecutor;

/// Point-in-time view of the task listing and the completed set.
///
/// Membership is by task id. A task listed by the executor but absent from
/// the completed set is active.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    tasks: Vec<Task>,
    completed_ids: HashSet<String>,
}

impl RegistrySnapshot {
    pub fn new(tasks: Vec<Task>, completed: &[Task]) -> Self {
        Self {
            tasks,
            completed_ids: completed.iter().map(|t| t.task_id.clone()).collect(),
        }
    }

    /// Take both listings from the executor, tasks first.
    pub fn capture(executor: &dyn StepExecutor) -> Result<Self, StepperError> {
        let tasks = executor.list_tasks()?;
        let completed = executor.list_completed_tasks()?;
        Ok(Self::new(tasks, &completed))
    }

    pub fn is_completed(&self, task_id: &str) -> bool {
        self.completed_ids.contains(task_id)
    }

    /// Active tasks in executor listing order.
    pub fn active(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !self.is_completed(&t.task_id))
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.active().map(|t| t.task_id.clone()).collect()
    }

    pub fn completed_count(&self) -> usize {
        self.completed_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> Task {
        Task {
            task_id: id.to_string(),
            input: format!("{id} input"),
        }
    }

    #[test]
    fn active_preserves_listing_order_and_skips_completed() {
        let snapshot = RegistrySnapshot::new(
            vec![task("c"), task("a"), task("b")],
            &[task("a")],
        );
        assert_eq!(snapshot.active_ids(), vec!["c", "b"]);
        assert!(snapshot.is_completed("a"));
        assert_eq!(snapshot.completed_count(), 1);
    }

    #[test]
    fn completed_ids_missing_from_listing_are_ignored() {
        let snapshot = RegistrySnapshot::new(vec![task("a")], &[task("ghost")]);
        assert_eq!(snapshot.active_ids(), vec!["a"]);
    }
}
