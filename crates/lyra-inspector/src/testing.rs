//! Test support: a scripted fake engine and a capturing transport.
//!
//! Embedder integration is driven entirely through the [`Engine`] and
//! [`Transport`] traits, so a deterministic in-memory implementation is
//! enough to exercise every inspector path without a real VM. Used by
//! this crate's own tests; exported for embedder test suites.

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::{
    BytecodeInfo, BytecodeRef, ContainerEntry, Engine, FrameInfo, GeneratorState, HeapChild,
    HeapNodeInfo, HeapNodeKind, HeapRoots, HeapUsage, ObjectInfo, ObjectTraits, PromiseParts,
    PropertySlot, ProxyParts, Transport, Value, ValueInfo,
};

/// Scripted description of one fake value.
#[derive(Debug, Clone)]
pub struct FakeValue {
    pub info: ValueInfo,
    pub display: String,
    pub props: Vec<PropertySlot>,
    pub entries: Vec<ContainerEntry>,
    pub generator_state: Option<GeneratorState>,
    pub generator_function: Option<Value>,
    pub promise: Option<PromiseParts>,
    pub proxy: Option<ProxyParts>,
    pub json: Option<JsonValue>,
    pub heap: Option<HeapNodeInfo>,
    pub heap_children: Vec<HeapChild>,
}

impl FakeValue {
    fn new(info: ValueInfo) -> Self {
        Self {
            info,
            display: String::new(),
            props: Vec::new(),
            entries: Vec::new(),
            generator_state: None,
            generator_function: None,
            promise: None,
            proxy: None,
            json: None,
            heap: None,
            heap_children: Vec::new(),
        }
    }
}

/// Deterministic in-memory [`Engine`].
///
/// Values live in an address-keyed table; evaluation is scripted by
/// expression string. Addresses start high enough to read like heap
/// pointers in object ids.
pub struct FakeEngine {
    values: FxHashMap<u64, FakeValue>,
    next_addr: u64,
    undefined: Value,
    bytecodes: FxHashMap<BytecodeRef, BytecodeInfo>,
    script_functions: FxHashMap<u32, Vec<BytecodeRef>>,
    pub frames: Vec<FrameInfo>,
    pub frame_locals: Vec<Vec<(String, Value)>>,
    pub frame_closures: Vec<Vec<Vec<(String, Value)>>>,
    global: Value,
    pub lexical: Vec<(String, Value)>,
    eval_results: FxHashMap<String, Result<Value, Value>>,
    call_results: FxHashMap<u64, Result<Value, Value>>,
    pub eval_log: Rc<RefCell<Vec<String>>>,
    pinned: FxHashSet<u64>,
    pub gc_suppressed: bool,
    pub sampler_interval: Option<u64>,
    pub sampler_profile: String,
    pub roots: HeapRoots,
    pub usage: HeapUsage,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        let mut values = FxHashMap::default();
        let undefined = Value(8);
        values.insert(undefined.0, FakeValue::new(ValueInfo::Undefined));
        let global = Value(16);
        values.insert(
            global.0,
            FakeValue::new(ValueInfo::Object(ObjectInfo {
                class_name: "global".into(),
                traits: ObjectTraits::empty(),
                size: None,
            })),
        );
        Self {
            values,
            next_addr: 0x1000,
            undefined,
            bytecodes: FxHashMap::default(),
            script_functions: FxHashMap::default(),
            frames: Vec::new(),
            frame_locals: Vec::new(),
            frame_closures: Vec::new(),
            global,
            lexical: Vec::new(),
            eval_results: FxHashMap::default(),
            call_results: FxHashMap::default(),
            eval_log: Rc::new(RefCell::new(Vec::new())),
            pinned: FxHashSet::default(),
            gc_suppressed: false,
            sampler_interval: None,
            sampler_profile: r#"{"nodes":[],"startTime":0,"endTime":0,"samples":[],"timeDeltas":[]}"#.into(),
            roots: HeapRoots::default(),
            usage: HeapUsage {
                used_size: 1024.0,
                total_size: 4096.0,
            },
        }
    }

    fn alloc(&mut self, value: FakeValue) -> Value {
        let addr = self.next_addr;
        self.next_addr += 16;
        self.values.insert(addr, value);
        Value(addr)
    }

    pub fn undefined_value(&self) -> Value {
        self.undefined
    }

    pub fn global_value(&self) -> Value {
        self.global
    }

    pub fn add_number(&mut self, n: f64) -> Value {
        self.alloc(FakeValue::new(ValueInfo::Number(n)))
    }

    pub fn add_string(&mut self, s: &str) -> Value {
        self.alloc(FakeValue::new(ValueInfo::String(s.into())))
    }

    pub fn add_bool(&mut self, b: bool) -> Value {
        self.alloc(FakeValue::new(ValueInfo::Bool(b)))
    }

    pub fn add_null(&mut self) -> Value {
        self.alloc(FakeValue::new(ValueInfo::Null))
    }

    pub fn add_value(&mut self, value: FakeValue) -> Value {
        self.alloc(value)
    }

    pub fn add_object(&mut self, class_name: &str, traits: ObjectTraits, size: Option<u32>) -> Value {
        self.alloc(FakeValue::new(ValueInfo::Object(ObjectInfo {
            class_name: class_name.into(),
            traits,
            size,
        })))
    }

    pub fn value_mut(&mut self, value: Value) -> &mut FakeValue {
        self.values.get_mut(&value.0).expect("unknown fake value")
    }

    pub fn add_bytecode(&mut self, raw: u64, info: BytecodeInfo) -> BytecodeRef {
        let bytecode = BytecodeRef(raw);
        self.script_functions
            .entry(info.script_id)
            .or_default()
            .push(bytecode);
        self.bytecodes.insert(bytecode, info);
        bytecode
    }

    /// Script an evaluation result for an exact expression string.
    pub fn script_eval(&mut self, expression: &str, result: Result<Value, Value>) {
        self.eval_results.insert(expression.to_string(), result);
    }

    /// Script the result of calling a compiled function value.
    pub fn script_call(&mut self, function: Value, result: Result<Value, Value>) {
        self.call_results.insert(function.0, result);
    }

    pub fn push_frame(&mut self, frame: FrameInfo) {
        self.frames.push(frame);
        self.frame_locals.push(Vec::new());
        self.frame_closures.push(Vec::new());
    }

    pub fn pinned_count(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_pinned(&self, value: Value) -> bool {
        self.pinned.contains(&value.0)
    }
}

impl Engine for FakeEngine {
    fn describe(&self, value: Value) -> ValueInfo {
        self.values
            .get(&value.0)
            .map(|v| v.info.clone())
            .unwrap_or(ValueInfo::Undefined)
    }

    fn to_display_string(&mut self, value: Value) -> String {
        match self.values.get(&value.0) {
            Some(v) if !v.display.is_empty() => v.display.clone(),
            Some(v) => match &v.info {
                ValueInfo::Number(n) => n.to_string(),
                ValueInfo::String(s) => s.clone(),
                ValueInfo::Object(o) => o.class_name.clone(),
                ValueInfo::Function(f) => format!("function {}() {{ }}", f.name),
                _ => String::new(),
            },
            None => String::new(),
        }
    }

    fn own_properties(&mut self, value: Value) -> Vec<PropertySlot> {
        self.values
            .get(&value.0)
            .map(|v| v.props.clone())
            .unwrap_or_default()
    }

    fn container_entries(&mut self, value: Value, limit: usize) -> Vec<ContainerEntry> {
        self.values
            .get(&value.0)
            .map(|v| v.entries.iter().take(limit).copied().collect())
            .unwrap_or_default()
    }

    fn generator_state(&self, value: Value) -> Option<GeneratorState> {
        self.values.get(&value.0).and_then(|v| v.generator_state)
    }

    fn generator_function(&self, value: Value) -> Option<Value> {
        self.values.get(&value.0).and_then(|v| v.generator_function)
    }

    fn promise_parts(&self, value: Value) -> Option<PromiseParts> {
        self.values.get(&value.0).and_then(|v| v.promise)
    }

    fn proxy_parts(&self, value: Value) -> Option<ProxyParts> {
        self.values.get(&value.0).and_then(|v| v.proxy)
    }

    fn serialize_json(&mut self, value: Value) -> Result<JsonValue, Value> {
        match self.values.get(&value.0) {
            Some(v) => {
                if let Some(json) = &v.json {
                    return Ok(json.clone());
                }
                match &v.info {
                    ValueInfo::Undefined => Ok(JsonValue::Null),
                    ValueInfo::Null => Ok(JsonValue::Null),
                    ValueInfo::Bool(b) => Ok(JsonValue::Bool(*b)),
                    ValueInfo::Number(n) => Ok(serde_json::json!(n)),
                    ValueInfo::String(s) => Ok(JsonValue::String(s.clone())),
                    _ => Ok(JsonValue::Null),
                }
            }
            None => Ok(JsonValue::Null),
        }
    }

    fn value_from_json(&mut self, json: &JsonValue) -> Value {
        let info = match json {
            JsonValue::Null => ValueInfo::Null,
            JsonValue::Bool(b) => ValueInfo::Bool(*b),
            JsonValue::Number(n) => ValueInfo::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => ValueInfo::String(s.clone()),
            _ => ValueInfo::Object(ObjectInfo {
                class_name: "Object".into(),
                traits: ObjectTraits::empty(),
                size: None,
            }),
        };
        let mut fake = FakeValue::new(info);
        fake.json = Some(json.clone());
        self.alloc(fake)
    }

    fn undefined(&self) -> Value {
        self.undefined
    }

    fn pin(&mut self, value: Value) {
        self.pinned.insert(value.0);
    }

    fn unpin(&mut self, value: Value) {
        self.pinned.remove(&value.0);
    }

    fn stack_depth(&self) -> u32 {
        self.frames.len() as u32
    }

    fn frame(&self, index: u32) -> Option<FrameInfo> {
        self.frames.get(index as usize).cloned()
    }

    fn frame_locals(&mut self, index: u32) -> Vec<(String, Value)> {
        self.frame_locals
            .get(index as usize)
            .cloned()
            .unwrap_or_default()
    }

    fn frame_closure_vars(&mut self, index: u32, hops: u32) -> Vec<(String, Value)> {
        self.frame_closures
            .get(index as usize)
            .and_then(|c| c.get(hops as usize))
            .cloned()
            .unwrap_or_default()
    }

    fn global_object(&self) -> Value {
        self.global
    }

    fn global_lexical_bindings(&mut self) -> Vec<(String, Value)> {
        self.lexical.clone()
    }

    fn global_lexical_names(&self) -> Vec<String> {
        self.lexical.iter().map(|(name, _)| name.clone()).collect()
    }

    fn script_bytecodes(&self, script_id: u32) -> Vec<BytecodeRef> {
        self.script_functions
            .get(&script_id)
            .cloned()
            .unwrap_or_default()
    }

    fn bytecode_info(&self, bytecode: BytecodeRef) -> Option<BytecodeInfo> {
        self.bytecodes.get(&bytecode).cloned()
    }

    fn evaluate_on_frame(&mut self, frame: u32, expression: &str) -> Result<Value, Value> {
        self.eval_log
            .borrow_mut()
            .push(format!("frame:{}:{}", frame, expression));
        self.eval_results
            .get(expression)
            .copied()
            .unwrap_or(Ok(self.undefined))
    }

    fn evaluate_global(&mut self, expression: &str) -> Result<Value, Value> {
        self.eval_log
            .borrow_mut()
            .push(format!("global:{}", expression));
        self.eval_results
            .get(expression)
            .copied()
            .unwrap_or(Ok(self.undefined))
    }

    fn compile_function(&mut self, declaration: &str) -> Result<Value, Value> {
        if let Some(result) = self.eval_results.get(declaration) {
            return *result;
        }
        let f = self.alloc(FakeValue::new(ValueInfo::Function(
            crate::engine::FunctionInfo {
                name: "anonymous".into(),
                location: None,
                is_generator: false,
                is_async: false,
            },
        )));
        Ok(f)
    }

    fn compile_script(&mut self, source: &str, _url: &str) -> Result<Value, Value> {
        self.compile_function(source)
    }

    fn call_function(
        &mut self,
        function: Value,
        _this: Value,
        _args: &[Value],
    ) -> Result<Value, Value> {
        self.call_results
            .get(&function.0)
            .copied()
            .unwrap_or(Ok(self.undefined))
    }

    fn heap_roots(&mut self) -> HeapRoots {
        self.roots.clone()
    }

    fn heap_node(&self, value: Value) -> HeapNodeInfo {
        self.values
            .get(&value.0)
            .and_then(|v| v.heap.clone())
            .unwrap_or_else(|| {
                let (kind, name) = match self.values.get(&value.0).map(|v| &v.info) {
                    Some(ValueInfo::String(s)) => (HeapNodeKind::String, s.clone()),
                    Some(ValueInfo::Number(_)) => (HeapNodeKind::Number, "number".into()),
                    Some(ValueInfo::Object(o)) => (HeapNodeKind::Object, o.class_name.clone()),
                    Some(ValueInfo::Function(f)) => (HeapNodeKind::Closure, f.name.clone()),
                    _ => (HeapNodeKind::Hidden, String::new()),
                };
                HeapNodeInfo {
                    kind,
                    name,
                    self_size: 32,
                }
            })
    }

    fn heap_children(&mut self, value: Value) -> Vec<HeapChild> {
        self.values
            .get(&value.0)
            .map(|v| v.heap_children.clone())
            .unwrap_or_default()
    }

    fn set_gc_suppressed(&mut self, suppressed: bool) {
        self.gc_suppressed = suppressed;
    }

    fn heap_usage(&self) -> HeapUsage {
        self.usage
    }

    fn start_sampler(&mut self, interval_us: u64) {
        self.sampler_interval = Some(interval_us);
    }

    fn stop_sampler(&mut self) -> String {
        self.sampler_interval = None;
        self.sampler_profile.clone()
    }
}

/// One captured outbound frame.
#[derive(Debug, Clone)]
pub struct SentFrame {
    pub view_id: Option<u32>,
    /// `Some` for responses, `None` for notifications.
    pub call_id: Option<i64>,
    pub body: JsonValue,
}

/// Transport that records everything it is handed.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    frames: Rc<RefCell<Vec<SentFrame>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<SentFrame> {
        self.frames.borrow().clone()
    }

    pub fn clear(&self) {
        self.frames.borrow_mut().clear();
    }

    /// All captured responses for `id`, in send order.
    pub fn responses_for(&self, id: i64) -> Vec<JsonValue> {
        self.frames
            .borrow()
            .iter()
            .filter(|f| f.call_id == Some(id))
            .map(|f| f.body.clone())
            .collect()
    }

    /// All captured notifications for `method`, in send order.
    pub fn notifications(&self, method: &str) -> Vec<JsonValue> {
        self.frames
            .borrow()
            .iter()
            .filter(|f| f.call_id.is_none() && f.body["method"] == method)
            .map(|f| f.body.clone())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send_response(&mut self, view_id: Option<u32>, call_id: i64, frame: String) {
        let body: JsonValue = serde_json::from_str(&frame).unwrap_or(JsonValue::Null);
        self.frames.borrow_mut().push(SentFrame {
            view_id,
            call_id: Some(call_id),
            body,
        });
    }

    fn send_notification(&mut self, view_id: Option<u32>, frame: String) {
        let body: JsonValue = serde_json::from_str(&frame).unwrap_or(JsonValue::Null);
        self.frames.borrow_mut().push(SentFrame {
            view_id,
            call_id: None,
            body,
        });
    }
}
