//! In-memory agent runner: the default [`StepExecutor`].
//!
//! Keeps tasks, their step queues and the chat history in process memory and
//! delegates the actual reasoning of each step to a [`Reasoner`]. Nothing
//! survives a restart.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::core::types::{ChatMessage, Role, StepOutput, Task, TaskState, TaskStep};
use crate::error::StepperError;
use crate::executor::StepExecutor;
use crate::io::config::AgentConfig;
use crate::io::reasoner::{ReasonRequest, Reasoner};

/// Steps after which a task is finished even if the reasoner wants more.
pub const DEFAULT_MAX_STEPS: u32 = 10;

struct TaskRecord {
    state: TaskState,
    completed: bool,
    /// A step is being reasoned about; a second one must not start.
    in_flight: bool,
}

#[derive(Default)]
struct AgentState {
    /// Task ids in creation order.
    order: Vec<String>,
    tasks: HashMap<String, TaskRecord>,
    chat_history: Vec<ChatMessage>,
}

impl AgentState {
    fn record(&self, task_id: &str) -> Result<&TaskRecord, StepperError> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| StepperError::task_not_found(task_id))
    }

    fn record_mut(&mut self, task_id: &str) -> Result<&mut TaskRecord, StepperError> {
        self.tasks
            .get_mut(task_id)
            .ok_or_else(|| StepperError::task_not_found(task_id))
    }

    fn tasks_where(&self, keep: impl Fn(&TaskRecord) -> bool) -> Vec<Task> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|record| keep(record))
            .map(|record| record.state.task.clone())
            .collect()
    }
}

pub struct AgentRunner {
    reasoner: Arc<dyn Reasoner>,
    system_prompt: Option<String>,
    max_steps: u32,
    state: RwLock<AgentState>,
}

impl AgentRunner {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            reasoner,
            system_prompt: None,
            max_steps: DEFAULT_MAX_STEPS,
            state: RwLock::new(AgentState::default()),
        }
    }

    pub fn from_config(reasoner: Arc<dyn Reasoner>, cfg: &AgentConfig) -> Self {
        let mut runner = Self::new(reasoner).with_max_steps(cfg.max_steps);
        if let Some(prompt) = &cfg.system_prompt {
            runner = runner.with_system_prompt(prompt);
        }
        runner
    }

    /// Set the system prompt, replacing any earlier one at the head of the
    /// chat history. Tasks already created are kept.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = Some(prompt.to_string());
        let message = ChatMessage::new(Role::System, prompt);
        let history = &mut self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .chat_history;
        match history.first_mut() {
            Some(first) if first.role == Role::System => *first = message,
            _ => history.insert(0, message),
        }
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    fn fresh_state(&self) -> AgentState {
        let mut state = AgentState::default();
        if let Some(prompt) = &self.system_prompt {
            state
                .chat_history
                .push(ChatMessage::new(Role::System, prompt.clone()));
        }
        state
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, AgentState>, StepperError> {
        self.state
            .read()
            .map_err(|e| StepperError::Internal(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, AgentState>, StepperError> {
        self.state
            .write()
            .map_err(|e| StepperError::Internal(e.to_string()))
    }

    /// Claim the next upcoming step of `task_id` and build its reasoning request.
    fn begin_step(&self, task_id: &str) -> Result<ReasonRequest, StepperError> {
        let mut state = self.write()?;
        let record = state.record_mut(task_id)?;
        if record.completed {
            return Err(StepperError::step_failed(task_id, "task already completed"));
        }
        if record.in_flight {
            return Err(StepperError::step_failed(task_id, "a step is already running"));
        }
        let step = record
            .state
            .upcoming_steps
            .first()
            .cloned()
            .ok_or_else(|| StepperError::step_failed(task_id, "no upcoming step"))?;
        record.in_flight = true;
        Ok(ReasonRequest {
            task: record.state.task.clone(),
            step,
            previous: record.state.completed_steps.clone(),
            system_prompt: self.system_prompt.clone(),
        })
    }
}

#[async_trait]
impl StepExecutor for AgentRunner {
    fn create_task(&self, input: &str) -> Result<Task, StepperError> {
        if input.trim().is_empty() {
            return Err(StepperError::InvalidInput(
                "task input must not be empty".to_string(),
            ));
        }
        let task = Task {
            task_id: Uuid::new_v4().to_string(),
            input: input.to_string(),
        };
        let first_step = TaskStep {
            task_id: task.task_id.clone(),
            step_id: Uuid::new_v4().to_string(),
            index: 0,
            input: Some(input.to_string()),
        };

        let mut state = self.write()?;
        state.order.push(task.task_id.clone());
        state.tasks.insert(
            task.task_id.clone(),
            TaskRecord {
                state: TaskState {
                    task: task.clone(),
                    upcoming_steps: vec![first_step],
                    completed_steps: Vec::new(),
                },
                completed: false,
                in_flight: false,
            },
        );
        state.chat_history.push(ChatMessage::new(Role::User, input));
        info!(task_id = %task.task_id, "task created");
        Ok(task)
    }

    fn list_tasks(&self) -> Result<Vec<Task>, StepperError> {
        Ok(self.read()?.tasks_where(|_| true))
    }

    fn list_completed_tasks(&self) -> Result<Vec<Task>, StepperError> {
        Ok(self.read()?.tasks_where(|record| record.completed))
    }

    fn task_state(&self, task_id: &str) -> Result<TaskState, StepperError> {
        Ok(self.read()?.record(task_id)?.state.clone())
    }

    #[instrument(skip(self))]
    async fn advance_one_step(&self, task_id: &str) -> Result<StepOutput, StepperError> {
        let request = self.begin_step(task_id)?;
        let step = request.step.clone();
        debug!(step = step.index, "reasoning");

        // No lock is held while the reasoner runs.
        let reasoning = self.reasoner.reason(&request).await;

        let mut state = self.write()?;
        let Ok(record) = state.record_mut(task_id) else {
            return Err(StepperError::step_failed(
                task_id,
                "task was reset while its step was running",
            ));
        };
        record.in_flight = false;
        let reasoning = reasoning.map_err(|err| StepperError::step_failed(task_id, err))?;

        record.state.upcoming_steps.retain(|s| s.step_id != step.step_id);
        let forced = !reasoning.is_last && step.index + 1 >= self.max_steps;
        if forced {
            info!(max_steps = self.max_steps, "step limit reached, finishing task");
        }
        let output = StepOutput {
            output: reasoning.output,
            is_last: reasoning.is_last || forced,
            task_step: step.clone(),
        };
        record.state.completed_steps.push(output.clone());
        if !output.is_last {
            record.state.upcoming_steps.push(TaskStep {
                task_id: task_id.to_string(),
                step_id: Uuid::new_v4().to_string(),
                index: step.index + 1,
                input: None,
            });
        }
        state
            .chat_history
            .push(ChatMessage::new(Role::Assistant, output.output.clone()));
        Ok(output)
    }

    fn finalize(&self, task_id: &str, step: &StepOutput) -> Result<(), StepperError> {
        let mut state = self.write()?;
        let record = state.record_mut(task_id)?;
        if record.completed {
            return Ok(());
        }
        record.completed = true;
        record.state.upcoming_steps.clear();
        info!(task_id, steps = step.task_step.index + 1, "task finalized");
        Ok(())
    }

    fn get_output(&self, task_id: &str) -> Result<StepOutput, StepperError> {
        let state = self.read()?;
        state
            .record(task_id)?
            .state
            .completed_steps
            .last()
            .cloned()
            .ok_or_else(|| StepperError::NotFound(format!("output for task {task_id}")))
    }

    fn list_upcoming_steps(&self, task_id: &str) -> Result<Vec<TaskStep>, StepperError> {
        Ok(self.read()?.record(task_id)?.state.upcoming_steps.clone())
    }

    fn list_completed_steps(&self, task_id: &str) -> Result<Vec<StepOutput>, StepperError> {
        Ok(self.read()?.record(task_id)?.state.completed_steps.clone())
    }

    fn chat_history(&self) -> Result<Vec<ChatMessage>, StepperError> {
        Ok(self.read()?.chat_history.clone())
    }

    fn reset(&self) -> Result<(), StepperError> {
        let fresh = self.fresh_state();
        *self.write()? = fresh;
        info!("agent reset");
        Ok(())
    }
}
