//! OpenAI-compatible chat completions adapter
//!
//! Implements [`ModelGateway`](ensemble_application::ModelGateway) over
//! `POST {base_url}/chat/completions`.

pub mod error;
pub mod gateway;
pub mod protocol;
