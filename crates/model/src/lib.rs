//! An abstraction layer for the models that drive the agent.
//!
//! This crate establishes the protocol between the agent loop and a model
//! provider: what a request carries (conversation, tool schemas, remaining
//! budget), how a response is streamed back, and the [`Decision`] the loop
//! derives from a complete response.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. Wire formats of
//! concrete inference services live in their own crates.

#![deny(missing_docs)]

mod decision;
mod error;
mod provider;
mod request;
mod response;

pub use decision::*;
pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
