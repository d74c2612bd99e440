//! # DAQ Monitoring
//!
//! Polling-based monitoring for the DAQ supervisor.
//!
//! This crate provides:
//! - The readiness prober that gates the boot sequence on a usable
//!   graphical session
//! - The liveness monitor that periodically reports whether supervised
//!   processes are still running
//!
//! Both are bounded-interval polling loops. Neither takes corrective
//! action: the monitor observes and logs, restarts belong to the operator.

pub mod liveness;
pub mod readiness;

pub use liveness::*;
pub use readiness::*;
