//! Core domain model types for frameflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - The flow value a stage hands back to its caller
//! - The lifecycle states of a concurrent group invocation

mod flow;
mod state;

pub use flow::Flow;
pub use state::GroupState;
