//! Ensemble value objects: per-model call results and the merged result of
//! one fan-out.

pub mod value_objects;
