//! Signature validation of inbound frame actions.

use super::fields;
use super::params::FrameFields;
use super::payload::FrameActionPayload;
use crate::context::{FieldSet, FrameContext, PartialContext};
use crate::core::Flow;
use crate::errors::{FrameflowError, FrameflowResult};
use crate::stages::{Next, Stage};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Checks an action's signed message, typically against a hub.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Returns whether the payload's signature is valid.
    async fn verify(&self, payload: &FrameActionPayload) -> anyhow::Result<bool>;
}

/// Rejects requests whose action fails verification.
///
/// Requests without an action pass through untouched. Verified requests
/// continue with `frame_message_valid` set.
pub struct ValidateFrameMessage {
    name: String,
    verifier: Arc<dyn SignatureVerifier>,
}

impl ValidateFrameMessage {
    /// Creates the stage.
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            name: "validate_frame_message".to_string(),
            verifier,
        }
    }

    /// Overrides the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl fmt::Debug for ValidateFrameMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidateFrameMessage")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R: Send + 'static> Stage<R> for ValidateFrameMessage {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> FieldSet {
        FieldSet::new()
            .requires([fields::FRAME_ACTION_RECEIVED])
            .provides([fields::FRAME_MESSAGE_VALID])
    }

    async fn call(&self, ctx: FrameContext, next: Next<R>) -> FrameflowResult<Flow<R>> {
        let Some(action) = ctx.action()? else {
            debug!(stage = %self.name, "No frame action to validate");
            return next.proceed().await;
        };

        let valid = self
            .verifier
            .verify(&action)
            .await
            .map_err(|e| FrameflowError::stage(self.name.clone(), e))?;

        if !valid {
            warn!(
                stage = %self.name,
                fid = action.untrusted_data.fid,
                "Frame message failed verification"
            );
            return Err(FrameflowError::SignatureInvalid);
        }

        next.run(PartialContext::new().with(fields::FRAME_MESSAGE_VALID, true))
            .await
    }
}
