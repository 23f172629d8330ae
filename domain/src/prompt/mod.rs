//! Prompt domain
//!
//! Templates for every model call the ensemble makes.

mod template;

pub use template::{KEY_CHANGES_EXCERPT_CHARS, NARRATIVE_EXCERPT_CHARS, PromptTemplate};
