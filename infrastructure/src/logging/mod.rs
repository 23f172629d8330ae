//! Logging infrastructure: structured per-query audit log.
//!
//! Provides [`JsonlQueryLogger`], a JSONL file writer that implements the
//! [`QueryLogger`](ensemble_application::QueryLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlQueryLogger;
