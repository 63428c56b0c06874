//! Typed errors surfaced by the executor, control surface and query surface.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    InvalidInput,
    StepExecution,
    Internal,
}

impl ErrorCode {
    /// Stable snake_case identifier used in API error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidInput => "invalid_input",
            Self::StepExecution => "step_execution",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum StepperError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("step failed for task {task_id}: {message}")]
    StepExecution { task_id: String, message: String },
    #[error("internal: {0}")]
    Internal(String),
}

impl StepperError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::StepExecution { .. } => ErrorCode::StepExecution,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    pub(crate) fn task_not_found(task_id: &str) -> Self {
        Self::NotFound(format!("task {task_id}"))
    }

    pub(crate) fn step_failed(task_id: &str, err: impl std::fmt::Display) -> Self {
        Self::StepExecution {
            task_id: task_id.to_string(),
            message: format!("{err:#}"),
        }
    }
}
