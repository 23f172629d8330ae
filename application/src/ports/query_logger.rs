//! Port for structured per-request audit logging.
//!
//! Defines the [`QueryLogger`] trait for recording what each request did
//! (routing decisions, ensemble results, time-travel outcomes, failed calls)
//! to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures one
//! machine-readable record per event (JSONL).

use serde_json::Value;

/// A structured query event for logging.
pub struct QueryEvent {
    /// Event type identifier (e.g., "ensemble_completed", "route_decided").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl QueryEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging query events.
///
/// `log` is synchronous and non-fallible so logging never disrupts a request;
/// implementations swallow their own I/O errors.
pub trait QueryLogger: Send + Sync {
    fn log(&self, event: QueryEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoQueryLogger;

impl QueryLogger for NoQueryLogger {
    fn log(&self, _event: QueryEvent) {}
}
