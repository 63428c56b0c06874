//! HTTP route handlers for tasks, steps, chat history and scheduler control.

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use stepper::core::settings::{RunState, Toggle};
use stepper::core::types::{ChatMessage, StepOutput, Task, TaskStep};
use stepper::events::SchedulerEvent;
use stepper::query::TaskStateView;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/active", get(list_active_tasks))
        .route("/tasks/completed", get(list_completed_tasks))
        .route("/tasks/state/{task_id}", get(get_task_state))
        .route("/tasks/{task_id}/output", get(get_task_output))
        .route("/tasks/{task_id}/upcoming_steps", get(get_upcoming_steps))
        .route("/tasks/{task_id}/completed_steps", get(get_completed_steps))
        .route("/messages", get(get_messages))
        .route("/running", get(get_running).post(set_running))
        .route("/stepwise", get(get_stepwise).post(set_stepwise))
        .route("/step_interval", get(get_step_interval).post(set_step_interval))
        .route("/reset", post(reset_agent))
}

async fn health() -> &'static str {
    "ok"
}

/// Body of POST /tasks: a bare JSON string or `{"input": "..."}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CreateTaskRequest {
    Input(String),
    Object { input: String },
}

impl CreateTaskRequest {
    fn into_input(self) -> String {
        match self {
            Self::Input(input) | Self::Object { input } => input,
        }
    }
}

/// POST /tasks - create a task; the scheduler picks it up on its next tick.
async fn create_task(
    State(state): State<AppState>,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<Task> {
    let Json(request) = body?;
    let task = state.executor.create_task(&request.into_input())?;
    state.events().publish(SchedulerEvent::TaskCreated {
        task_id: task.task_id.clone(),
    });
    Ok(Json(task))
}

/// GET /tasks - every task, active or completed.
async fn list_tasks(State(state): State<AppState>) -> ApiResult<Vec<Task>> {
    Ok(Json(state.query.tasks()?))
}

async fn list_active_tasks(State(state): State<AppState>) -> ApiResult<Vec<Task>> {
    Ok(Json(state.query.active_tasks()?))
}

async fn list_completed_tasks(State(state): State<AppState>) -> ApiResult<Vec<Task>> {
    Ok(Json(state.query.completed_tasks()?))
}

/// GET /tasks/state/{task_id} - 404 for unknown ids.
async fn get_task_state(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<TaskStateView> {
    Ok(Json(state.query.task_state(&task_id)?))
}

/// GET /tasks/{task_id}/output - latest step output (final once completed).
async fn get_task_output(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<StepOutput> {
    Ok(Json(state.query.output(&task_id)?))
}

async fn get_upcoming_steps(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Vec<TaskStep>> {
    Ok(Json(state.query.upcoming_steps(&task_id)?))
}

async fn get_completed_steps(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Vec<StepOutput>> {
    Ok(Json(state.query.completed_steps(&task_id)?))
}

/// GET /messages - full chat history, oldest first.
async fn get_messages(State(state): State<AppState>) -> ApiResult<Vec<ChatMessage>> {
    Ok(Json(state.query.messages()?))
}

#[derive(Serialize)]
struct RunningResponse {
    enabled: bool,
}

#[derive(Serialize)]
struct StepwiseResponse {
    stepwise: bool,
}

#[derive(Serialize)]
struct IntervalResponse {
    interval: u64,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// POST /running - body `"running"` or `"stopped"`.
async fn set_running(
    State(state): State<AppState>,
    body: Result<Json<RunState>, JsonRejection>,
) -> ApiResult<RunningResponse> {
    let Json(run_state) = body?;
    let enabled = state.control.set_running(run_state);
    Ok(Json(RunningResponse { enabled }))
}

async fn get_running(State(state): State<AppState>) -> Json<RunningResponse> {
    Json(RunningResponse {
        enabled: state.control.running(),
    })
}

/// POST /stepwise - body `"on"` or `"off"`.
async fn set_stepwise(
    State(state): State<AppState>,
    body: Result<Json<Toggle>, JsonRejection>,
) -> ApiResult<StepwiseResponse> {
    let Json(toggle) = body?;
    let stepwise = state.control.set_stepwise(toggle);
    Ok(Json(StepwiseResponse { stepwise }))
}

async fn get_stepwise(State(state): State<AppState>) -> Json<StepwiseResponse> {
    Json(StepwiseResponse {
        stepwise: state.control.stepwise(),
    })
}

/// POST /step_interval - body is a positive integer number of seconds.
async fn set_step_interval(
    State(state): State<AppState>,
    body: Result<Json<i64>, JsonRejection>,
) -> ApiResult<IntervalResponse> {
    let Json(secs) = body?;
    let interval = state.control.set_interval(secs)?;
    Ok(Json(IntervalResponse { interval }))
}

async fn get_step_interval(State(state): State<AppState>) -> Json<IntervalResponse> {
    Json(IntervalResponse {
        interval: state.control.interval_secs(),
    })
}

/// POST /reset - drop all tasks and chat history.
async fn reset_agent(State(state): State<AppState>) -> ApiResult<MessageResponse> {
    state.executor.reset()?;
    state.events().publish(SchedulerEvent::Reset);
    info!("agent reset via api");
    Ok(Json(MessageResponse {
        message: "Agent reset".to_string(),
    }))
}
