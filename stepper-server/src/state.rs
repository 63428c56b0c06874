//! Shared application state for the HTTP server.

use std::sync::Arc;

use stepper::events::EventBus;
use stepper::executor::StepExecutor;
use stepper::query::QuerySurface;
use stepper::scheduler::SchedulerControl;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Owner of task state; used directly for create and reset.
    pub executor: Arc<dyn StepExecutor>,
    /// Read-only projections of executor state.
    pub query: QuerySurface,
    /// Scheduler control values, shared with the running loop.
    pub control: SchedulerControl,
}

impl AppState {
    pub fn new(executor: Arc<dyn StepExecutor>, control: SchedulerControl) -> Self {
        Self {
            query: QuerySurface::new(executor.clone()),
            executor,
            control,
        }
    }

    pub fn events(&self) -> &EventBus {
        self.control.events()
    }
}
