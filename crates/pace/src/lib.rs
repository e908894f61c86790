//! Application workflow core for the Pace student-recruitment platform.
//!
//! The crate owns the application lifecycle: status transitions with an
//! append-only history, round-robin assignment of application managers, and
//! the dashboard counters pushed to connected clients.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
