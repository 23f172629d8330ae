//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod classify_query;
pub mod route_and_answer;
pub mod run_ensemble;
pub mod run_time_travel;
pub(crate) mod shared;
pub mod stream_time_travel;
