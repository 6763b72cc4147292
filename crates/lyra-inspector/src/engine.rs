//! Engine and host collaborator contracts.
//!
//! The inspector mutates no engine state directly; everything it needs
//! from the mutator goes through [`Engine`], and everything it emits
//! goes through [`Transport`]. Both are implemented by the embedder.
//! Handles ([`Value`], [`BytecodeRef`]) are opaque: for heap-allocated
//! values the `Value` payload is the object address, which is also the
//! basis for mirror object ids.

use bitflags::bitflags;
use serde_json::Value as JsonValue;

/// Opaque engine value handle.
///
/// For heap values the payload is the heap pointer; primitives carry an
/// engine-chosen encoding. The inspector never interprets the bits, it
/// only round-trips them and stringifies the payload for object ids.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Value(pub u64);

impl Value {
    /// The raw payload, used for mirror object ids and heap dedup.
    pub fn addr(self) -> u64 {
        self.0
    }
}

/// Foreign pointer to engine-owned function bytecode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BytecodeRef(pub u64);

/// A resolved program counter: bytecode container plus offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PcRef {
    pub bytecode: BytecodeRef,
    pub pc: u32,
}

/// Shallow description of an engine value.
#[derive(Debug, Clone)]
pub enum ValueInfo {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    /// Decimal digits without the `n` suffix.
    BigInt(String),
    String(String),
    Symbol(Option<String>),
    Function(FunctionInfo),
    Object(ObjectInfo),
}

impl ValueInfo {
    /// True for values mirrored by value rather than by reference.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, ValueInfo::Function(_) | ValueInfo::Object(_))
    }
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    /// Where the function was defined, when known.
    pub location: Option<FunctionLocation>,
    pub is_generator: bool,
    pub is_async: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FunctionLocation {
    pub script_id: u32,
    pub line: u32,
    pub column: u32,
}

bitflags! {
    /// Classification facts about an object, tested by the mirror
    /// builder in a fixed priority order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ObjectTraits: u16 {
        const ARRAY        = 1 << 0;
        const PROXY        = 1 << 1;
        const TYPED_ARRAY  = 1 << 2;
        const ERROR        = 1 << 3;
        const DATA_VIEW    = 1 << 4;
        const DATE         = 1 << 5;
        const MAP          = 1 << 6;
        const SET          = 1 << 7;
        const WEAK_MAP     = 1 << 8;
        const WEAK_SET     = 1 << 9;
        const GENERATOR    = 1 << 10;
        const PROMISE      = 1 << 11;
        const REGEXP       = 1 << 12;
        const ARRAY_BUFFER = 1 << 13;
    }
}

#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Constructor name, e.g. `"Object"`, `"Uint8Array"`.
    pub class_name: String,
    pub traits: ObjectTraits,
    /// Element/entry/byte count for containers, when applicable.
    pub size: Option<u32>,
}

/// One own property of an object. `value` is `Err(thrown)` when the
/// property is an accessor whose getter threw.
#[derive(Debug, Clone)]
pub struct PropertySlot {
    pub name: String,
    pub value: Result<Value, Value>,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

/// One Map/Set entry; `key` is `None` for Set-like containers.
#[derive(Debug, Clone, Copy)]
pub struct ContainerEntry {
    pub key: Option<Value>,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Suspended,
    Running,
    Closed,
}

impl GeneratorState {
    pub fn as_str(self) -> &'static str {
        match self {
            GeneratorState::Suspended => "suspended",
            GeneratorState::Running => "running",
            GeneratorState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PromiseParts {
    /// `pending`, `fulfilled`, or `rejected`.
    pub state: &'static str,
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProxyParts {
    pub target: Value,
    pub handler: Value,
    pub is_revoked: bool,
}

/// A call-stack frame as the engine reports it. Index 0 is the top.
#[derive(Debug, Clone)]
pub struct FrameInfo {
    pub function_name: String,
    /// `None` for native frames.
    pub bytecode: Option<BytecodeRef>,
    pub pc: u32,
    pub this: Value,
    /// Number of closure scopes between this frame's locals and the
    /// global record.
    pub closure_depth: u32,
}

/// Inspector-visible slice of a function bytecode.
#[derive(Debug, Clone)]
pub struct BytecodeInfo {
    pub script_id: u32,
    pub function_name: String,
    /// Function start as a packed line/column word (see
    /// [`crate::debugger::location::unpack_line_col`]).
    pub start_pos: u64,
    /// The encoded pc→line table, in the record format decoded by
    /// [`crate::debugger::location`].
    pub pc_to_line: Vec<u8>,
}

/// Root slots for heap snapshot traversal, grouped by subroot.
#[derive(Debug, Clone, Default)]
pub struct HeapRoots {
    pub handle_scope: Vec<Value>,
    pub stack: Vec<Value>,
    pub global_handles: Vec<Value>,
    pub contexts: Vec<Value>,
}

/// Heap snapshot node classification, mirroring the `.heapsnapshot`
/// `node_types` enum order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapNodeKind {
    Hidden,
    Array,
    String,
    Object,
    Code,
    Closure,
    Regexp,
    Number,
    Native,
    Synthetic,
    ConsString,
    SlicedString,
    Symbol,
    Bigint,
    ObjectShape,
}

impl HeapNodeKind {
    /// Index into the serialized `node_types` enum.
    pub fn type_index(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone)]
pub struct HeapNodeInfo {
    pub kind: HeapNodeKind,
    pub name: String,
    /// Engine-reported allocation size; for strings, UTF-8 length plus
    /// header.
    pub self_size: u64,
}

/// Heap snapshot edge classification, mirroring `edge_types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapEdgeKind {
    Context,
    Element,
    Property,
    Internal,
    Hidden,
    Shortcut,
    Weak,
}

impl HeapEdgeKind {
    /// Index into the serialized `edge_types` enum.
    pub fn type_index(self) -> u32 {
        self as u32
    }
}

/// Edge label: named property or numeric index.
#[derive(Debug, Clone)]
pub enum EdgeLabel {
    Name(String),
    Index(u32),
}

/// One structural reference out of a heap thing.
#[derive(Debug, Clone)]
pub struct HeapChild {
    pub kind: HeapEdgeKind,
    pub label: EdgeLabel,
    pub to: Value,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeapUsage {
    pub used_size: f64,
    pub total_size: f64,
}

/// Everything the inspector needs from the mutator. All calls happen on
/// the mutator thread, from within the engine hooks on
/// [`crate::Inspector`].
pub trait Engine {
    // ── value introspection ────────────────────────────────────────────

    fn describe(&self, value: Value) -> ValueInfo;

    /// Engine-side rendering: function source for functions, ISO string
    /// for dates, `toString()` for regexps and errors.
    fn to_display_string(&mut self, value: Value) -> String;

    /// Own properties in definition order, including non-enumerable
    /// ones; the caller filters.
    fn own_properties(&mut self, value: Value) -> Vec<PropertySlot>;

    /// Up to `limit` entries of a Map/Set-like container.
    fn container_entries(&mut self, value: Value, limit: usize) -> Vec<ContainerEntry>;

    fn generator_state(&self, value: Value) -> Option<GeneratorState>;

    /// The generator function a generator object was created from.
    fn generator_function(&self, value: Value) -> Option<Value>;

    fn promise_parts(&self, value: Value) -> Option<PromiseParts>;

    fn proxy_parts(&self, value: Value) -> Option<ProxyParts>;

    /// JSON projection of a value for `returnByValue`. `Err(thrown)`
    /// when the value does not serialize (cycles, symbols).
    fn serialize_json(&mut self, value: Value) -> Result<JsonValue, Value>;

    /// Materialize a JSON literal as an engine value
    /// (`callFunctionOn` arguments passed by value).
    fn value_from_json(&mut self, json: &JsonValue) -> Value;

    /// The `undefined` handle.
    fn undefined(&self) -> Value;

    // ── mirror pinning ────────────────────────────────────────────────

    /// Treat `value` as a GC root until the matching [`Engine::unpin`].
    fn pin(&mut self, value: Value);

    fn unpin(&mut self, value: Value);

    // ── call stack ────────────────────────────────────────────────────

    fn stack_depth(&self) -> u32;

    fn frame(&self, index: u32) -> Option<FrameInfo>;

    /// Argument and variable slots of a frame, via the function's
    /// vardef table.
    fn frame_locals(&mut self, index: u32) -> Vec<(String, Value)>;

    /// Closure var table `hops` levels up the frame's cur_func chain.
    fn frame_closure_vars(&mut self, index: u32, hops: u32) -> Vec<(String, Value)>;

    fn global_object(&self) -> Value;

    fn global_lexical_bindings(&mut self) -> Vec<(String, Value)>;

    fn global_lexical_names(&self) -> Vec<String>;

    // ── scripts and bytecode ──────────────────────────────────────────

    /// Every function bytecode belonging to a compiled script.
    fn script_bytecodes(&self, script_id: u32) -> Vec<BytecodeRef>;

    fn bytecode_info(&self, bytecode: BytecodeRef) -> Option<BytecodeInfo>;

    // ── evaluation ────────────────────────────────────────────────────

    /// Run `expression` with the frame's `this` and lexical scope
    /// chain. `Err(thrown)` carries the exception value.
    fn evaluate_on_frame(&mut self, frame: u32, expression: &str) -> Result<Value, Value>;

    /// Run `expression` at global scope in the active context.
    fn evaluate_global(&mut self, expression: &str) -> Result<Value, Value>;

    /// Compile `declaration` as a compile-only function value without
    /// running it.
    fn compile_function(&mut self, declaration: &str) -> Result<Value, Value>;

    /// Compile `source` as a top-level script without running it.
    fn compile_script(&mut self, source: &str, url: &str) -> Result<Value, Value>;

    fn call_function(&mut self, function: Value, this: Value, args: &[Value])
        -> Result<Value, Value>;

    // ── heap graph ────────────────────────────────────────────────────

    fn heap_roots(&mut self) -> HeapRoots;

    fn heap_node(&self, value: Value) -> HeapNodeInfo;

    fn heap_children(&mut self, value: Value) -> Vec<HeapChild>;

    /// Scoped flag the engine must honor for snapshot duration.
    fn set_gc_suppressed(&mut self, suppressed: bool);

    fn heap_usage(&self) -> HeapUsage;

    // ── CPU sampler collaborator ──────────────────────────────────────

    fn start_sampler(&mut self, interval_us: u64);

    /// Stop the sampler and return the V8-format profile JSON.
    fn stop_sampler(&mut self) -> String;
}

/// Host-supplied outbound path. `view_id` is `None` for single-session
/// hosts and selects the per-view send variants otherwise.
pub trait Transport {
    fn send_response(&mut self, view_id: Option<u32>, call_id: i64, frame: String);

    fn send_notification(&mut self, view_id: Option<u32>, frame: String);
}
