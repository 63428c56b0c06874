//! Progress events broadcast to observers (the server's SSE stream).

use tokio::sync::broadcast;

/// Something observable happened to a task or to the scheduler controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    TaskCreated {
        task_id: String,
    },
    StepCompleted {
        task_id: String,
        step: u32,
        is_last: bool,
    },
    TaskCompleted {
        task_id: String,
    },
    StepFailed {
        task_id: String,
        error: String,
    },
    /// `enabled`, `stepwise` or `interval` changed.
    ControlChanged,
    Reset,
}

/// Cloneable broadcast sender. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SchedulerEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
