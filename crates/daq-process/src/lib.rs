//! # DAQ Process
//!
//! Low-level process operations for the DAQ supervisor.
//!
//! This crate provides the Linux primitives the supervisor is built on:
//! - Process lookup by command-line pattern
//! - Process existence checks
//! - Termination signals
//! - Detached process spawning
//! - Launch script validation and execute-permission repair

pub mod check;
pub mod execute;
pub mod terminate;
pub mod validation;

// Re-export main types
pub use check::*;
pub use execute::*;
pub use terminate::*;
pub use validation::*;
