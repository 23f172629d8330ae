//! Routing: turn a [`Classification`](crate::Classification) into the set of
//! models to call and whether to synthesize their answers.

pub mod decision;
pub mod policy;
