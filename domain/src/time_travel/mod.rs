//! Time-travel: how an answer would have looked at past dates.
//!
//! This module holds the pure parts of the pipeline: deciding whether a
//! question is worth time-travelling, which dates to snapshot, the stage
//! state machine, and parsers for the key-changes and narrative replies.

pub mod entities;
pub mod parsing;
pub mod sensitivity;
pub mod time_point;
