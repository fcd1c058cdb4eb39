//! Core agent loop library for Scout.
//!
//! The crate provides the orchestration loop that drives a conversation with
//! an LLM backend, the validated tool contract every external action goes
//! through, the event bus front ends subscribe to, and the long-lived shell
//! session used by the `bash` tool. Concrete tools live under [`tools`].

pub mod agent;
pub mod config;
pub mod errors;
pub mod events;
pub mod shell;
pub mod todo;
pub mod tools;
pub mod workspace;

pub use agent::*;
pub use config::*;
pub use errors::*;
pub use events::*;
pub use shell::*;
pub use todo::*;
pub use tools::*;
pub use workspace::*;
