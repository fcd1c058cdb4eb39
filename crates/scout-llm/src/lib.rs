//! LLM backend contract for the Scout agent.
//!
//! The agent core talks to a [`Backend`] trait object and never to HTTP
//! directly. [`AnthropicBackend`] is the production adapter for the
//! Anthropic Messages API; tests substitute scripted backends.

pub mod client;
pub mod errors;
pub mod types;

pub use client::*;
pub use errors::*;
pub use types::*;
