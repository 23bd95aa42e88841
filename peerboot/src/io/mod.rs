//! I/O helpers: configuration, worker processes, and run reports.

pub mod aggregate;
pub mod config;
pub mod process;
pub mod report;
