//! Parsing frame request parameters into an initial context.

use super::fields;
use super::payload::FrameActionPayload;
use crate::context::{FrameContext, PartialContext};
use crate::errors::{FrameflowError, FrameflowResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use tracing::debug;

/// State a frame carries from one round trip to the next.
pub type FrameState = BTreeMap<String, String>;

/// The frame-specific query parameters of an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameParams {
    /// The posted action, if this request answers a button press.
    pub frame_action_received: Option<FrameActionPayload>,
    /// State from the previous round trip.
    pub frame_prev_state: Option<FrameState>,
    /// Path of the frame route.
    pub pathname: Option<String>,
}

/// Parses frame parameters from a request's query string values.
///
/// `frame_action_received` and `frame_prev_state` hold JSON. Absent, empty,
/// and `null` values all parse as `None`.
///
/// # Errors
///
/// Returns `InvalidParams` naming the parameter that holds malformed JSON.
pub fn parse_frame_params<S: BuildHasher>(
    search_params: &HashMap<String, String, S>,
) -> FrameflowResult<FrameParams> {
    let params = FrameParams {
        frame_action_received: json_param(search_params, fields::FRAME_ACTION_RECEIVED)?,
        frame_prev_state: json_param(search_params, fields::FRAME_PREV_STATE)?,
        pathname: search_params.get(fields::PATHNAME).cloned(),
    };

    debug!(
        has_action = params.frame_action_received.is_some(),
        has_prev_state = params.frame_prev_state.is_some(),
        pathname = ?params.pathname,
        "Parsed frame params"
    );

    Ok(params)
}

fn json_param<T: DeserializeOwned, S: BuildHasher>(
    search_params: &HashMap<String, String, S>,
    name: &str,
) -> FrameflowResult<Option<T>> {
    match search_params.get(name).map(String::as_str) {
        None | Some("") => Ok(None),
        Some(raw) => serde_json::from_str::<Option<T>>(raw).map_err(|e| {
            FrameflowError::InvalidParams {
                param: name.to_string(),
                reason: e.to_string(),
            }
        }),
    }
}

/// Builds the initial context for one frame request.
///
/// Header names are lower-cased. The action and previous state are always
/// present, as `null` when absent; `pathname` only when known.
///
/// # Errors
///
/// Returns a serialization error if the parameters cannot be encoded.
pub fn create_frame_context<I, K, V>(
    params: FrameParams,
    headers: I,
    url: &str,
) -> FrameflowResult<FrameContext>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let headers: Map<String, Value> = headers
        .into_iter()
        .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), Value::String(value.into())))
        .collect();

    let mut initial = PartialContext::new()
        .with_serialized(fields::FRAME_ACTION_RECEIVED, &params.frame_action_received)?
        .with_serialized(fields::FRAME_PREV_STATE, &params.frame_prev_state)?
        .with(fields::URL, url)
        .with(fields::HEADERS, Value::Object(headers));
    if let Some(pathname) = params.pathname {
        initial.insert(fields::PATHNAME, pathname);
    }

    Ok(FrameContext::new().merge(&initial))
}

/// Typed access to the well-known frame fields of a context.
pub trait FrameFields {
    /// The inbound action, if any.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` if the field does not hold an action payload.
    fn action(&self) -> FrameflowResult<Option<FrameActionPayload>>;

    /// The state from the previous round trip, if any.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` if the field is not a string map.
    fn prev_state(&self) -> FrameflowResult<Option<FrameState>>;

    /// The frame route path.
    fn pathname(&self) -> Option<&str>;

    /// A request header by case-insensitive name.
    fn header(&self, name: &str) -> Option<&str>;

    /// True once the inbound action passed verification.
    fn message_valid(&self) -> bool;
}

impl FrameFields for FrameContext {
    fn action(&self) -> FrameflowResult<Option<FrameActionPayload>> {
        self.get_as(fields::FRAME_ACTION_RECEIVED)
    }

    fn prev_state(&self) -> FrameflowResult<Option<FrameState>> {
        self.get_as(fields::FRAME_PREV_STATE)
    }

    fn pathname(&self) -> Option<&str> {
        self.get(fields::PATHNAME).and_then(Value::as_str)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.get(fields::HEADERS)?
            .get(name.to_ascii_lowercase())
            .and_then(Value::as_str)
    }

    fn message_valid(&self) -> bool {
        self.get(fields::FRAME_MESSAGE_VALID)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
