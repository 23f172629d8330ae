//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`]: the catalogue of hosted models the ensemble can call
//! - [`question::Question`]: a validated user question with its cache key
//! - [`error::DomainError`]: domain-level validation errors

pub mod error;
pub mod model;
pub mod question;
pub mod string;
