//! Server-Sent Events stream of scheduler progress.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use stepper::events::SchedulerEvent;
use tokio::sync::broadcast;
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
struct SsePayload {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_last: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SsePayload {
    fn bare(event_type: &'static str) -> Self {
        Self {
            event_type,
            task_id: None,
            step: None,
            is_last: None,
            error: None,
        }
    }

    fn for_task(event_type: &'static str, task_id: &str) -> Self {
        Self {
            task_id: Some(task_id.to_string()),
            ..Self::bare(event_type)
        }
    }
}

impl From<&SchedulerEvent> for SsePayload {
    fn from(event: &SchedulerEvent) -> Self {
        match event {
            SchedulerEvent::TaskCreated { task_id } => Self::for_task("task_created", task_id),
            SchedulerEvent::StepCompleted {
                task_id,
                step,
                is_last,
            } => Self {
                step: Some(*step),
                is_last: Some(*is_last),
                ..Self::for_task("step_completed", task_id)
            },
            SchedulerEvent::TaskCompleted { task_id } => Self::for_task("task_completed", task_id),
            SchedulerEvent::StepFailed { task_id, error } => Self {
                error: Some(error.clone()),
                ..Self::for_task("step_failed", task_id)
            },
            SchedulerEvent::ControlChanged => Self::bare("control_changed"),
            SchedulerEvent::Reset => Self::bare("reset"),
        }
    }
}

/// SSE endpoint handler.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events().subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let payload = SsePayload::from(&event);
                    if let Ok(json) = serde_json::to_string(&payload) {
                        yield Ok(Event::default().event("change").data(json));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_completed_carries_step_fields() {
        let payload = SsePayload::from(&SchedulerEvent::StepCompleted {
            task_id: "t-1".to_string(),
            step: 2,
            is_last: true,
        });
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "type": "step_completed",
                "task_id": "t-1",
                "step": 2,
                "is_last": true,
            })
        );
    }

    #[test]
    fn control_changed_has_only_type() {
        let payload = SsePayload::from(&SchedulerEvent::ControlChanged);
        let json = serde_json::to_string(&payload).expect("serialize");
        assert_eq!(json, r#"{"type":"control_changed"}"#);
    }

    #[test]
    fn step_failed_includes_error() {
        let payload = SsePayload::from(&SchedulerEvent::StepFailed {
            task_id: "t-2".to_string(),
            error: "model offline".to_string(),
        });
        assert_eq!(payload.error.as_deref(), Some("model offline"));
        assert_eq!(payload.event_type, "step_failed");
    }
}
