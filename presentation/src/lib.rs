//! Presentation layer for llm-ensemble
//!
//! This crate contains CLI definitions, the HTTP API, output formatters
//! and progress reporters.

pub mod cli;
pub mod http;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{AskArgs, Cli, Command, OutputFormat, ServeArgs, TimeTravelArgs};
pub use http::{ApiError, create_router};
pub use output::console::ConsoleFormatter;
pub use progress::reporter::{AskSpinner, StreamReporter};
