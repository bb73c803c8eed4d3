//! Core logic including the agent loop, tool registry, and conversation.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, DEFAULT_STEP_BUDGET, RunError, RunHandle, RunOutcome,
};
pub use conversation::TranscriptSource;

/// Re-exports of the model protocol crate.
pub mod model {
    pub use research_agent_model::*;
}
