//! Frame request support.
//!
//! Builds the initial [`FrameContext`](crate::context::FrameContext) from an
//! inbound frame request and provides the stages most frame pipelines start
//! with: signature validation and state reduction.

mod params;
mod payload;
mod reducer;
mod validation;

pub use params::{create_frame_context, parse_frame_params, FrameFields, FrameParams, FrameState};
pub use payload::{CastId, FrameActionPayload, TrustedData, UntrustedData};
pub use reducer::{reduce_frame_state, ReduceFrameState};
pub use validation::{SignatureVerifier, ValidateFrameMessage};

/// Well-known frame context field names.
pub mod fields {
    /// The inbound user action, or null.
    pub const FRAME_ACTION_RECEIVED: &str = "frame_action_received";
    /// State carried over from the previous round trip, or null.
    pub const FRAME_PREV_STATE: &str = "frame_prev_state";
    /// Path of the frame route.
    pub const PATHNAME: &str = "pathname";
    /// Request url.
    pub const URL: &str = "url";
    /// Request headers with lower-cased names.
    pub const HEADERS: &str = "headers";
    /// Set once the inbound action passed verification.
    pub const FRAME_MESSAGE_VALID: &str = "frame_message_valid";
    /// State produced by the reducer for this round trip.
    pub const FRAME_STATE: &str = "frame_state";
}
