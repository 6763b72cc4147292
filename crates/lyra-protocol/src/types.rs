//! CDP payload types.
//!
//! Everything here is a plain serde mirror of the protocol JSON: the
//! object/preview model emitted by the mirror builder, the call-frame
//! and scope shapes for `Debugger.paused`, the event payloads, and the
//! request parameter structs for inbound methods. All field names are
//! camelCase on the wire; optional fields are omitted when `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ---------------------------------------------------------------------------
// Mirror object model
// ---------------------------------------------------------------------------

/// Mirror of an engine value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// One of `undefined`, `null`, `boolean`, `number`, `bigint`,
    /// `string`, `symbol`, `object`, `function`, `exception`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<ObjectPreview>,
}

impl RemoteObject {
    /// A bare mirror with only `type` set.
    pub fn of_kind(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Default::default()
        }
    }
}

/// Shallow preview of an object's own enumerable state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPreview {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// True when the property cap truncated the preview.
    pub overflow: bool,
    pub properties: Vec<PropertyPreview>,
    /// Map/Set entry previews.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<EntryPreview>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPreview {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPreview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<ObjectPreview>,
    pub value: ObjectPreview,
}

/// One own property in a `Runtime.getProperties` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<RemoteObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writable: Option<bool>,
    pub configurable: bool,
    pub enumerable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_thrown: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_own: Option<bool>,
}

/// One `[[Slot]]`-style internal property.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalPropertyDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<RemoteObject>,
}

// ---------------------------------------------------------------------------
// Locations, frames, scopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub script_id: String,
    pub line_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
}

/// A location candidate from `Debugger.getPossibleBreakpoints`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakLocation {
    pub script_id: String,
    pub line_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// `global`, `local`, or `closure`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Synthetic mirror addressable by a `scope:N` object id.
    pub object: RemoteObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    /// Frame index stringified; `"0"` is the top frame.
    pub call_frame_id: String,
    pub function_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_location: Option<Location>,
    pub location: Location,
    pub url: String,
    pub scope_chain: Vec<Scope>,
    pub this: RemoteObject,
}

/// One frame of a `Runtime.StackTrace` (console call sites).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub function_name: String,
    pub script_id: String,
    pub url: String,
    pub line_number: u32,
    pub column_number: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub call_frames: Vec<StackFrame>,
}

// ---------------------------------------------------------------------------
// Errors surfaced through results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub exception_id: u32,
    /// Always `"Uncaught"` for engine exceptions captured during eval.
    pub text: String,
    pub line_number: u32,
    pub column_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteObject>,
}

/// Result body shared by the evaluate-family methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    pub result: RemoteObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_details: Option<ExceptionDetails>,
}

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedEvent {
    pub script_id: String,
    pub url: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub execution_context_id: u32,
    pub hash: String,
    #[serde(rename = "sourceMapURL", skip_serializing_if = "Option::is_none")]
    pub source_map_url: Option<String>,
    pub length: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedEvent {
    pub call_frames: Vec<CallFrame>,
    /// `other`, `exception`, `debugCommand`, …
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_breakpoints: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleApiCalledEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub args: Vec<RemoteObject>,
    pub execution_context_id: u32,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<StackTrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContextDescription {
    pub id: u32,
    pub origin: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContextCreatedEvent {
    pub context: ExecutionContextDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapSnapshotChunkEvent {
    pub chunk: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapSnapshotProgressEvent {
    pub done: u32,
    pub total: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
}

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------
//
// Every struct tolerates absent optional fields; handlers treat a missing
// `params` object as `{}`.

/// A value passed into `callFunctionOn`/`setVariableValue`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlParams {
    pub line_number: u32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub script_hash: Option<String>,
    #[serde(default)]
    pub column_number: Option<u32>,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointParams {
    pub location: Location,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBreakpointParams {
    pub breakpoint_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsActiveParams {
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueToLocationParams {
    pub location: Location,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPossibleBreakpointsParams {
    pub start: Location,
    #[serde(default)]
    pub end: Option<Location>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceParams {
    pub script_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPauseOnExceptionsParams {
    /// `none`, `uncaught`, or `all`.
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSkipAllPausesParams {
    pub skip: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOnCallFrameParams {
    pub call_frame_id: String,
    pub expression: String,
    #[serde(default)]
    pub object_group: Option<String>,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub return_by_value: bool,
    #[serde(default)]
    pub generate_preview: bool,
    #[serde(default)]
    pub throw_on_side_effect: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariableValueParams {
    pub scope_number: u32,
    pub variable_name: String,
    pub new_value: CallArgument,
    pub call_frame_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseOnNextStatementParams {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    pub expression: String,
    #[serde(default)]
    pub object_group: Option<String>,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub context_id: Option<u32>,
    #[serde(default)]
    pub return_by_value: bool,
    #[serde(default)]
    pub generate_preview: bool,
    #[serde(default)]
    pub throw_on_side_effect: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionOnParams {
    pub function_declaration: String,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub arguments: Vec<CallArgument>,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub return_by_value: bool,
    #[serde(default)]
    pub generate_preview: bool,
    #[serde(default)]
    pub object_group: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertiesParams {
    pub object_id: String,
    #[serde(default)]
    pub own_properties: bool,
    #[serde(default)]
    pub accessor_properties_only: bool,
    #[serde(default)]
    pub generate_preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileScriptParams {
    pub expression: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub persist_script: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunScriptParams {
    pub script_id: String,
    #[serde(default)]
    pub object_group: Option<String>,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub return_by_value: bool,
    #[serde(default)]
    pub generate_preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseObjectParams {
    pub object_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseObjectGroupParams {
    pub object_group: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSamplingIntervalParams {
    /// Sampling period in microseconds.
    pub interval: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeHeapSnapshotParams {
    #[serde(default)]
    pub report_progress: bool,
}
