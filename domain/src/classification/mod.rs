//! Query classification: structural labels for a question, the lenient
//! parser for model-produced classifications, and the keyword/year
//! heuristic that spots time-sensitive questions.

pub mod entities;
pub mod parsing;
pub mod temporal;
