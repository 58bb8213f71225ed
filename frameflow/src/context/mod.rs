//! Request context types.
//!
//! This module provides:
//! - The immutable, shared frame context threaded through a pipeline
//! - Partial contexts describing one stage's additions
//! - Field capability sets stages declare for topology audits

mod fields;
mod frame_context;
mod partial;

pub use fields::FieldSet;
pub use frame_context::FrameContext;
pub use partial::PartialContext;
