//! Stage composition and the pipeline driver.
//!
//! This module provides:
//! - Sequential composition, where each stage controls whether the next runs
//! - Concurrent groups, whose members run against one shared input and whose
//!   additions are merged in declaration order
//! - The [`Pipeline`] driver and its builder
//! - Topology descriptions and field audits

mod concurrent;
mod config;
mod driver;
mod sequential;
mod topology;

#[cfg(test)]
mod integration_tests;

pub use concurrent::{compose_concurrent, compose_concurrent_with, ConcurrentGroup};
pub use config::{Dispatch, GroupConfig, PipelineConfig};
pub use driver::{Pipeline, PipelineBuilder, Terminal};
pub use sequential::{compose_sequential, Sequence};
pub use topology::{audit, FieldIssue, Topology};
