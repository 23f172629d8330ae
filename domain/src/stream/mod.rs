//! Incremental events emitted while a time-travel request runs.

pub mod event;
