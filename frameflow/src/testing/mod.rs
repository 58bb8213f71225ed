//! Testing utilities for frameflow pipelines.
//!
//! This module provides:
//! - Mock stages that extend, short-circuit, fail, or record
//! - Assertions over frame contexts

mod assertions;
mod mocks;

pub use assertions::{assert_field, assert_fields, assert_missing_field};
pub use mocks::{
    CallCounter, CompletionLog, ExtendStage, FailingStage, RecordingStage, ShortCircuitStage,
};
