//! Pure data and projections shared by the scheduler and query surface.
//!
//! Core modules never mutate executor state and perform no I/O. They operate
//! on in-memory data and return deterministic outputs suitable for tests.

pub mod registry;
pub mod settings;
pub mod types;
