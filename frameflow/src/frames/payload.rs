//! The signed action a client posts back when a frame button is pressed.

use crate::errors::{FrameflowError, FrameflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inbound frame action, as posted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameActionPayload {
    /// Client-reported fields. Only trustworthy once the signed message has
    /// been verified.
    pub untrusted_data: UntrustedData,
    /// The signed message.
    pub trusted_data: TrustedData,
}

/// Client-reported action fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UntrustedData {
    /// Farcaster id of the acting user.
    pub fid: u64,
    /// Url of the frame the action was taken on.
    pub url: String,
    /// Hash of the signed message.
    pub message_hash: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Farcaster network id.
    pub network: u32,
    /// Which button was pressed, 1 through 4.
    pub button_index: u8,
    /// Text entered into the frame input, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,
    /// The cast hosting the frame.
    pub cast_id: CastId,
}

/// The cast the frame was embedded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastId {
    /// Author of the cast.
    pub fid: u64,
    /// Cast hash.
    pub hash: String,
}

/// The signed part of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedData {
    /// Hex-encoded signed message.
    pub message_bytes: String,
}

impl FrameActionPayload {
    /// Decodes the signed message bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` if `messageBytes` is not valid hex.
    pub fn trusted_message_bytes(&self) -> FrameflowResult<Vec<u8>> {
        let encoded = self.trusted_data.message_bytes.as_str();
        let encoded = encoded.strip_prefix("0x").unwrap_or(encoded);
        hex::decode(encoded)
            .map_err(|e| FrameflowError::invalid_field("trustedData.messageBytes", e.to_string()))
    }

    /// Returns the client-reported action time, if it is representable.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.untrusted_data.timestamp)
    }

    /// Returns true if the pressed button index is one a frame can render.
    #[must_use]
    pub fn has_valid_button_index(&self) -> bool {
        (1..=4).contains(&self.untrusted_data.button_index)
    }
}
