//! CDP envelope codec.
//!
//! Inbound frames are UTF-8 JSON of the shape
//! `{ id, method, params?, view_id? }`. Outbound traffic is either a
//! response `{ id, result, view_id? }` or a notification
//! `{ method, params, view_id? }`. The inbound `id` is preserved
//! verbatim in the response.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Failure to decode an inbound frame. Such frames carry no usable `id`,
/// so they are logged and dropped; no response is possible.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is missing required key `{0}`")]
    MissingKey(&'static str),
}

/// A decoded inbound CDP request.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    /// Request id, echoed verbatim in the response.
    pub id: i64,
    /// Qualified method name, e.g. `"Debugger.setBreakpointByUrl"`.
    pub method: String,
    /// Method parameters. Absent params are treated as `{}` downstream.
    #[serde(default)]
    pub params: Option<JsonValue>,
    /// Originating view for multi-session hosts.
    #[serde(default)]
    pub view_id: Option<u32>,
}

impl InboundFrame {
    /// The domain part of the method name (`"Debugger"` for
    /// `"Debugger.resume"`). Empty when the method has no dot.
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or("")
    }

    /// Parameters as an owned JSON value, defaulting to `{}`.
    pub fn params_or_empty(&self) -> JsonValue {
        self.params
            .clone()
            .unwrap_or_else(|| JsonValue::Object(Default::default()))
    }
}

/// Decode one inbound frame.
///
/// Fails when the input is not valid JSON or lacks `id`/`method`; the
/// caller logs and discards such frames.
pub fn decode_frame(raw: &str) -> Result<InboundFrame, DecodeError> {
    let value: JsonValue = serde_json::from_str(raw)?;
    let obj = value
        .as_object()
        .ok_or(DecodeError::MissingKey("id"))?;
    if !obj.contains_key("id") {
        return Err(DecodeError::MissingKey("id"));
    }
    if !obj.contains_key("method") {
        return Err(DecodeError::MissingKey("method"));
    }
    Ok(serde_json::from_value(value)?)
}

#[derive(Serialize)]
struct ResponseFrame<'a> {
    id: i64,
    result: &'a JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    view_id: Option<u32>,
}

#[derive(Serialize)]
struct NotificationFrame<'a> {
    method: &'a str,
    params: &'a JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    view_id: Option<u32>,
}

/// Frame a response for `id` with the given result body.
pub fn response(id: i64, result: &JsonValue, view_id: Option<u32>) -> String {
    let frame = ResponseFrame { id, result, view_id };
    // Serializing a tree we built cannot fail.
    serde_json::to_string(&frame).unwrap_or_default()
}

/// Frame a notification for `method` with the given params body.
pub fn notification(method: &str, params: &JsonValue, view_id: Option<u32>) -> String {
    let frame = NotificationFrame {
        method,
        params,
        view_id,
    };
    serde_json::to_string(&frame).unwrap_or_default()
}
