//! # Frameflow
//!
//! A middleware composition engine for frame request pipelines.
//!
//! Each inbound frame request is threaded through a pipeline of stages. A
//! stage receives the request context and a continuation, and either passes
//! control on (possibly with additional context fields), answers the request
//! itself, or fails. Stages compose:
//!
//! - **Sequentially**: each stage decides whether the next one runs
//! - **Concurrently**: independent stages run against the same input and
//!   their additions are merged in declaration order
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use frameflow::prelude::*;
//!
//! let pipeline = PipelineBuilder::new("frame")
//!     .stage(ValidateFrameMessage::new(verifier))
//!     .concurrent(vec![profile_lookup, casts_lookup])?
//!     .stage(ReduceFrameState::new(FrameState::new(), reducer))
//!     .build(render)?;
//!
//! let params = parse_frame_params(&search_params)?;
//! let response = pipeline
//!     .handle(create_frame_context(params, headers, &url)?)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

#[cfg(feature = "frames")]
pub mod frames;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{FieldSet, FrameContext, PartialContext};
    pub use crate::core::{Flow, GroupState};
    pub use crate::errors::{
        CompositionKind, ContractErrorInfo, EmptyCompositionError, FrameflowError,
        FrameflowResult,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        compose_concurrent, compose_concurrent_with, compose_sequential, Dispatch, GroupConfig,
        Pipeline, PipelineBuilder, PipelineConfig, Terminal, Topology,
    };
    pub use crate::stages::{FnStage, Next, PassThroughStage, SharedStage, Stage};

    #[cfg(feature = "frames")]
    pub use crate::frames::{
        create_frame_context, parse_frame_params, FrameActionPayload, FrameFields, FrameState,
        ReduceFrameState, SignatureVerifier, ValidateFrameMessage,
    };
}
