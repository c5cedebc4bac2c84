//! Logging setup and machine-readable summaries.

mod format;

pub use format::StructuredLogger;
