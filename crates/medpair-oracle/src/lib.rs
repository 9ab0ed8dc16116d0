//! Oracle adapter for pairwise medication interaction assessment.
//!
//! Wraps a chat-style AI service (an Ollama-compatible HTTP endpoint)
//! behind the `InteractionOracle` contract from `medpair-core`: prompt
//! construction, a blocking HTTP client with transport/protocol error
//! triage, and strict response parsing.

pub mod client;
pub mod parse;
pub mod prompts;

pub use client::*;
pub use parse::*;
pub use prompts::*;
