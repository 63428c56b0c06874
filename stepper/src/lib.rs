//! Cooperative task-stepping scheduler for a conversational agent.
//!
//! Tasks are advanced one reasoning step per tick by a single polling loop.
//! The crate is split along the same seams the loop relies on:
//!
//! - **[`core`]**: Pure data types and projections (tasks, steps, settings,
//!   registry snapshots). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config files, reasoning commands).
//!
//! [`executor`] defines the step-executor seam, [`agent`] is the in-memory
//! implementation, and [`scheduler`] drives it. [`query`] projects executor
//! state for read endpoints.

pub mod agent;
pub mod core;
pub mod error;
pub mod events;
pub mod executor;
pub mod io;
pub mod logging;
pub mod query;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
