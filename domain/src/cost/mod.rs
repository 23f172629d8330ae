//! Cost accounting: per-model pricing, token usage, and savings estimates.

pub mod estimate;
pub mod pricing;
