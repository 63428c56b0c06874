//! I/O helpers: configuration files and the external reasoning command.

pub mod config;
pub mod reasoner;
