//! A research assistant agent: a model, a handful of built-in tools, and a
//! notebook the tools use as working memory.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring agent functionality into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod expr;
pub mod notes;
mod session;
pub mod tools;

pub use session::{Session, SessionBuilder};

/// Re-exports of [`research_agent_core`] crate.
pub mod core {
    pub use research_agent_core::*;
}
