//! # DAQ Logs
//!
//! Everything about the supervisor's plain-text log files:
//! - the on-disk line format (`YYYY-MM-DD HH:MM:SS - LEVEL - message`)
//! - `tracing` subscriber setup for console and file output
//! - [`LogStream`], a read-only view used for tailing, searching and
//!   statistics
//!
//! Log files are only ever opened in append mode for writing; readers never
//! truncate or rotate them.

pub mod output;
pub mod stream;
pub mod types;

pub use output::{init_logging, open_append, LogLineFormat, LoggingOptions};
pub use stream::LogStream;
pub use types::{is_severity_line, LogStats, SEVERITY_KEYWORDS};
