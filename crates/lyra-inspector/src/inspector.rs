//! The per-engine inspector value.
//!
//! Owns every piece of mutable inspector state (sessions, scripts,
//! breakpoints, pause state, mirrors, console, profiler glue) and wires
//! the engine hooks to the dispatcher. All methods run on the mutator
//! thread; the only suspension point is the pause loop, which blocks
//! draining the message queue until a handler resumes execution.

use serde_json::{json, Value as JsonValue};
use std::time::Duration;

use lyra_protocol::envelope;
use lyra_protocol::types::{
    BreakLocation, CallArgument, CallFrame, ConsoleApiCalledEvent, EvaluateResult,
    ExceptionDetails, ExecutionContextCreatedEvent, ExecutionContextDescription,
    HeapSnapshotChunkEvent, HeapSnapshotProgressEvent, Location, PausedEvent, PropertyDescriptor,
    RemoteObject, ScriptParsedEvent, StackFrame, StackTrace,
};

use crate::console::{self, ConsoleEntry, ConsoleLog, RoutingTag};
use crate::debugger::location as loc;
use crate::debugger::stepping::{ExceptionMode, ExecMode, PauseState, StepKind, StepOrigin};
use crate::debugger::{BreakpointStore, Locator};
use crate::dispatch::{self, Method};
use crate::engine::{Engine, PcRef, Transport, Value, ValueInfo};
use crate::heap;
use crate::mirror::remote_object::{self, BuildOptions};
use crate::mirror::{scope, MirrorRegistry, ObjectId, PinScope};
use crate::profiler::ProfilerGlue;
use crate::queue::{MessageQueue, MessageSender};
use crate::scripts::ScriptRegistry;
use crate::session::{Domain, SessionRegistry};
use rustc_hash::FxHashMap;

/// The single execution context id reported to front ends.
const CONTEXT_ID: u32 = 1;

/// Pause-loop poll period; resume is re-checked at this cadence.
const PAUSE_POLL: Duration = Duration::from_millis(50);

/// Expression answered with a canned side-effect error under
/// `throwOnSideEffect` instead of being executed.
const SIDE_EFFECT_PROBE: &str = "(async function(){ await 1; })()";

/// Request context: the inbound id and the view it arrived from.
#[derive(Debug, Copy, Clone)]
struct Ctx {
    id: i64,
    view: Option<u32>,
}

pub struct Inspector {
    transport: Box<dyn Transport>,
    queue: MessageQueue,
    sessions: SessionRegistry,
    scripts: ScriptRegistry,
    breakpoints: BreakpointStore,
    pause: PauseState,
    mirrors: MirrorRegistry,
    console: ConsoleLog,
    profiler: ProfilerGlue,
    /// Scripts persisted by `Runtime.compileScript`.
    compiled: FxHashMap<u32, Value>,
    next_compiled_id: u32,
    next_exception_id: u32,
    /// Statement-start counter advanced by the engine's statement
    /// marker; drives same-line step-over.
    stmt_counter: u64,
    break_at_entry: bool,
    current_pc: Option<PcRef>,
    last_pause_event: Option<JsonValue>,
    pause_on_next_deferred: bool,
    in_dispatch: bool,
    async_stack_depth: u32,
    snapshot_chunk_bytes: usize,
}

impl Inspector {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            queue: MessageQueue::new(),
            sessions: SessionRegistry::new(),
            scripts: ScriptRegistry::new(),
            breakpoints: BreakpointStore::new(),
            pause: PauseState::new(),
            mirrors: MirrorRegistry::new(),
            console: ConsoleLog::new(),
            profiler: ProfilerGlue::new(),
            compiled: FxHashMap::default(),
            next_compiled_id: 0,
            next_exception_id: 0,
            stmt_counter: 0,
            break_at_entry: false,
            current_pc: None,
            last_pause_event: None,
            pause_on_next_deferred: false,
            in_dispatch: false,
            async_stack_depth: 0,
            snapshot_chunk_bytes: heap::writer::DEFAULT_CHUNK_BYTES,
        }
    }

    /// Producer handle for the host transport thread.
    pub fn message_sender(&self) -> MessageSender {
        self.queue.sender()
    }

    pub fn is_paused(&self) -> bool {
        self.pause.mode.is_paused()
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn scripts(&self) -> &ScriptRegistry {
        &self.scripts
    }

    pub fn breakpoints(&self) -> &BreakpointStore {
        &self.breakpoints
    }

    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    pub fn mirror_pause_pins(&self) -> usize {
        self.mirrors.pause_pin_count()
    }

    /// Depth requested via `setAsyncCallStackDepth`. Recorded for the
    /// host; the inspector itself tracks no async stacks.
    pub fn async_stack_depth(&self) -> u32 {
        self.async_stack_depth
    }

    // ── engine hooks ──────────────────────────────────────────────────

    /// Per-instruction hook. Decides pause vs. continue.
    pub fn on_tick(&mut self, engine: &mut dyn Engine, pc: PcRef, depth: u32) {
        if self.in_dispatch || self.pause.suppressing_eval() {
            return;
        }
        self.current_pc = Some(pc);
        self.drain_queue(engine);

        if let Some(reason) = self.pause.pause_on_next.take() {
            self.enter_pause(
                engine,
                ExecMode::PausedAtStatement,
                &reason,
                None,
                None,
            );
            return;
        }
        if self.break_at_entry {
            self.break_at_entry = false;
            self.enter_pause(engine, ExecMode::PausedAtStatement, "other", None, None);
            return;
        }

        if self.pause.breakpoints_active && !self.pause.skip_all {
            if let Some(hit) = self.breakpoint_hit(engine, pc) {
                self.pause.clear_step();
                self.enter_pause(engine, ExecMode::PausedInCall, "other", Some(vec![hit]), None);
                return;
            }
        }

        if self.pause.step_kind().is_some() {
            let (_, line, column) = self.pc_location(engine, pc);
            if self
                .pause
                .should_pause_for_step(line, column, depth, self.stmt_counter)
            {
                self.pause.clear_step();
                self.enter_pause(engine, ExecMode::PausedAtStatement, "other", None, None);
            }
        }
    }

    /// Statement-start marker (the engine's
    /// `OP_push_const("statement")` / `OP_drop` pair).
    pub fn on_statement(&mut self, engine: &mut dyn Engine, pc: PcRef, depth: u32) {
        if self.in_dispatch || self.pause.suppressing_eval() {
            return;
        }
        self.stmt_counter += 1;
        self.on_tick(engine, pc, depth);
    }

    /// A `debugger;` statement. Pauses unless it sits exactly at the
    /// active step origin.
    pub fn on_debugger_statement(&mut self, engine: &mut dyn Engine, pc: PcRef, _depth: u32) {
        if self.in_dispatch || self.pause.suppressing_eval() || self.pause.skip_all {
            return;
        }
        self.current_pc = Some(pc);
        let (_, line, column) = self.pc_location(engine, pc);
        if let Some(origin) = self.pause.step_origin() {
            if (line, column) == (origin.line, origin.column) {
                return;
            }
        }
        self.pause.clear_step();
        self.enter_pause(engine, ExecMode::PausedInCall, "other", None, None);
    }

    /// Entry into the exception branch of the pause machine.
    pub fn on_exception_thrown(&mut self, engine: &mut dyn Engine, exception: Value, uncaught: bool) {
        if self.in_dispatch || self.pause.suppressing_eval() {
            return;
        }
        if !self.pause.should_pause_for_exception(uncaught) {
            return;
        }
        let opts = self.build_opts(false, false, None);
        let mirror = remote_object::build(engine, &mut self.mirrors, exception, &opts);
        let data = serde_json::to_value(&mirror).unwrap_or(JsonValue::Null);
        self.pause.clear_step();
        self.enter_pause(engine, ExecMode::PausedInCall, "exception", None, Some(data));
    }

    /// The engine's parse hook. Registers the program, announces it to
    /// attached sessions, and returns the script id assigned to it.
    pub fn on_script_parsed(
        &mut self,
        engine: &mut dyn Engine,
        source: &str,
        filename: &str,
        end_line: u32,
        had_error: bool,
    ) -> u32 {
        let (id, is_new) = self.scripts.register(source, filename, end_line);
        if !is_new {
            return id;
        }
        let script = match self.scripts.get(id) {
            Some(script) => script.clone(),
            None => return id,
        };
        let event = ScriptParsedEvent {
            script_id: script.id.to_string(),
            url: script.url.clone(),
            start_line: 0,
            start_column: 0,
            end_line: script.end_line,
            end_column: 0,
            execution_context_id: CONTEXT_ID,
            hash: script.hash.clone(),
            source_map_url: script.source_map_url.clone(),
            length: script.source.len() as u32,
        };
        let params = serde_json::to_value(&event).unwrap_or(JsonValue::Null);
        if had_error {
            self.notify_domain(Domain::Debugger, "Debugger.scriptFailedToParse", params);
            self.scripts.unregister(id);
            return id;
        }
        self.notify_domain(Domain::Debugger, "Debugger.scriptParsed", params);
        self.breakpoints.resolve_pending(engine, &script);
        id
    }

    /// Explicit unregistration by url; drops breakpoint pc mappings
    /// into the script.
    pub fn on_script_unregistered(&mut self, url: &str) {
        if let Some(script) = self.scripts.find_by_url(url) {
            let id = script.id;
            self.breakpoints.unresolve_script(id);
            self.scripts.unregister(id);
        }
    }

    /// Console hook. Captures the entry and re-emits it to sessions
    /// with Runtime enabled.
    pub fn on_console_call(&mut self, engine: &mut dyn Engine, tag: &str, args: &[Value]) {
        let mut runtime_id = None;
        let mut group_id = None;
        if let Some(first) = args.first() {
            if let ValueInfo::String(s) = engine.describe(*first) {
                match console::parse_routing_tag(&s) {
                    Some(RoutingTag::Runtime(id)) => runtime_id = Some(id),
                    Some(RoutingTag::Group(id)) => group_id = Some(id),
                    None => {}
                }
            }
        }
        let stack = self.capture_stack(engine);
        let timestamp_ms = console::timestamp_ms();
        self.console.push(ConsoleEntry {
            tag: tag.to_string(),
            args: args.to_vec(),
            timestamp_ms,
            stack: stack.clone(),
            runtime_id,
            group_id,
        });

        if !self.sessions.any_enabled(Domain::Runtime) {
            return;
        }
        let opts = BuildOptions {
            generate_preview: true,
            pin_scope: PinScope::Running,
            ..Default::default()
        };
        let mirrors: Vec<RemoteObject> = args
            .iter()
            .map(|arg| remote_object::build(engine, &mut self.mirrors, *arg, &opts))
            .collect();
        let event = ConsoleApiCalledEvent {
            kind: tag.to_string(),
            args: mirrors,
            execution_context_id: CONTEXT_ID,
            timestamp: timestamp_ms,
            stack_trace: Some(stack),
            runtime_id,
            group_id,
        };
        let params = serde_json::to_value(&event).unwrap_or(JsonValue::Null);
        self.notify_domain(Domain::Runtime, "Runtime.consoleAPICalled", params);
    }

    // ── queue and dispatch ────────────────────────────────────────────

    fn drain_queue(&mut self, engine: &mut dyn Engine) {
        while let Some(raw) = self.queue.pop() {
            if !self.dispatch_raw(engine, raw) {
                break;
            }
        }
    }

    /// Dispatch one raw frame. Returns false when the dispatch loop
    /// must stop (out-of-band `pauseOnNextStatement`).
    fn dispatch_raw(&mut self, engine: &mut dyn Engine, raw: String) -> bool {
        let frame = match envelope::decode_frame(&raw) {
            Ok(frame) => frame,
            Err(err) => {
                log::debug!("dropping malformed inspector frame: {}", err);
                return true;
            }
        };

        // Out-of-band path: arm the flag, leave the message queued, and
        // exit the loop so the engine observes the flag on next tick.
        if frame.method == "Debugger.pauseOnNextStatement"
            && !self.pause.mode.is_paused()
            && !self.pause_on_next_deferred
        {
            let reason = frame
                .params_or_empty()
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("debugCommand")
                .to_string();
            self.pause.pause_on_next = Some(reason);
            self.pause_on_next_deferred = true;
            self.queue.push_front(raw);
            return false;
        }

        let ctx = Ctx {
            id: frame.id,
            view: frame.view_id,
        };
        self.sessions.get_or_insert(ctx.view);

        let method = frame.method.as_str();
        let domain = Domain::parse(frame.domain());
        let allowed = dispatch::is_always_allowed(method)
            || domain
                .map(|d| self.sessions.is_enabled(ctx.view, d))
                .unwrap_or(false);
        if !allowed {
            self.respond(ctx, json!({}));
            return true;
        }

        let Some(key) = dispatch::lookup(method) else {
            // Unknown methods answer an empty result by contract.
            self.respond(ctx, json!({}));
            return true;
        };

        self.in_dispatch = true;
        self.handle(engine, ctx, key, method, frame.params_or_empty());
        self.in_dispatch = false;
        true
    }

    fn handle(
        &mut self,
        engine: &mut dyn Engine,
        ctx: Ctx,
        key: Method,
        method: &str,
        params: JsonValue,
    ) {
        match key {
            Method::DebuggerEnable => self.debugger_enable(ctx),
            Method::DebuggerDisable => self.debugger_disable(engine, ctx),
            Method::DebuggerPause => {
                if !self.pause.mode.is_paused() {
                    self.pause.pause_on_next = Some("other".into());
                }
                self.respond(ctx, json!({}));
            }
            Method::DebuggerResume => {
                self.respond(ctx, json!({}));
                if self.pause.mode.is_paused() {
                    self.finish_pause(engine);
                }
            }
            Method::DebuggerStep => self.debugger_step(engine, ctx, method),
            Method::DebuggerContinueToLocation => self.continue_to_location(engine, ctx, params),
            Method::DebuggerSetBreakpoint => self.set_breakpoint(engine, ctx, params),
            Method::DebuggerSetBreakpointByUrl => self.set_breakpoint_by_url(engine, ctx, params),
            Method::DebuggerRemoveBreakpoint => {
                if let Some(p) =
                    parse::<lyra_protocol::types::RemoveBreakpointParams>(params)
                {
                    self.breakpoints.remove(&p.breakpoint_id);
                }
                self.respond(ctx, json!({}));
            }
            Method::DebuggerSetBreakpointsActive => {
                if let Some(p) =
                    parse::<lyra_protocol::types::SetBreakpointsActiveParams>(params)
                {
                    self.pause.breakpoints_active = p.active;
                }
                self.respond(ctx, json!({}));
            }
            Method::DebuggerGetPossibleBreakpoints => {
                self.get_possible_breakpoints(engine, ctx, params)
            }
            Method::DebuggerGetScriptSource => {
                let source = parse::<lyra_protocol::types::GetScriptSourceParams>(params)
                    .and_then(|p| p.script_id.parse::<u32>().ok())
                    .and_then(|id| self.scripts.get(id))
                    .map(|s| s.source.clone());
                match source {
                    Some(source) => self.respond(ctx, json!({ "scriptSource": source })),
                    None => self.respond(ctx, json!({})),
                }
            }
            Method::DebuggerSetPauseOnExceptions => {
                if let Some(p) =
                    parse::<lyra_protocol::types::SetPauseOnExceptionsParams>(params)
                {
                    self.pause.exception_mode = ExceptionMode::parse(&p.state);
                }
                self.respond(ctx, json!({}));
            }
            Method::DebuggerSetSkipAllPauses => {
                if let Some(p) = parse::<lyra_protocol::types::SetSkipAllPausesParams>(params) {
                    self.pause.skip_all = p.skip;
                }
                self.respond(ctx, json!({}));
            }
            Method::DebuggerEvaluateOnCallFrame => self.evaluate_on_call_frame(engine, ctx, params),
            Method::DebuggerSetVariableValue => self.set_variable_value(engine, ctx, params),
            Method::DebuggerSetAsyncCallStackDepth | Method::RuntimeSetAsyncCallStackDepth => {
                if let Some(depth) = params.get("maxDepth").and_then(|d| d.as_u64()) {
                    self.async_stack_depth = depth as u32;
                }
                self.respond(ctx, json!({}));
            }
            Method::DebuggerPauseOnNextStatement => {
                // Reached only once the out-of-band flag has been
                // consumed (or while already paused): acknowledge.
                self.pause_on_next_deferred = false;
                self.respond(ctx, json!({}));
            }
            Method::DebuggerStopAtEntry => {
                self.break_at_entry = true;
                self.respond(ctx, json!({}));
            }
            Method::RuntimeEnable => {
                self.sessions.set_enabled(ctx.view, Domain::Runtime, true);
                self.respond(ctx, json!({}));
                let event = ExecutionContextCreatedEvent {
                    context: ExecutionContextDescription {
                        id: CONTEXT_ID,
                        origin: String::new(),
                        name: "main".into(),
                    },
                };
                let params = serde_json::to_value(&event).unwrap_or(JsonValue::Null);
                self.notify_view(ctx.view, "Runtime.executionContextCreated", params);
            }
            Method::RuntimeDisable => {
                self.respond(ctx, json!({}));
                self.sessions.set_enabled(ctx.view, Domain::Runtime, false);
            }
            Method::RuntimeEvaluate => self.runtime_evaluate(engine, ctx, params),
            Method::RuntimeCallFunctionOn => self.call_function_on(engine, ctx, params),
            Method::RuntimeGetProperties => self.get_properties(engine, ctx, params),
            Method::RuntimeCompileScript => self.compile_script(engine, ctx, params),
            Method::RuntimeRunScript => self.run_script(engine, ctx, params),
            Method::RuntimeGlobalLexicalScopeNames => {
                let names = engine.global_lexical_names();
                self.respond(ctx, json!({ "names": names }));
            }
            Method::RuntimeDiscardConsoleEntries => {
                self.console.discard();
                self.respond(ctx, json!({}));
            }
            Method::RuntimeGetHeapUsage => {
                let usage = engine.heap_usage();
                self.respond(
                    ctx,
                    json!({ "usedSize": usage.used_size, "totalSize": usage.total_size }),
                );
            }
            Method::RuntimeReleaseObject => {
                if let Some(p) = parse::<lyra_protocol::types::ReleaseObjectParams>(params) {
                    if let Some(ObjectId::Address(addr)) = ObjectId::parse(&p.object_id) {
                        self.mirrors.release(engine, addr);
                    }
                }
                self.respond(ctx, json!({}));
            }
            Method::RuntimeReleaseObjectGroup => {
                if let Some(p) = parse::<lyra_protocol::types::ReleaseObjectGroupParams>(params) {
                    self.mirrors.release_group(engine, &p.object_group);
                }
                self.respond(ctx, json!({}));
            }
            Method::RuntimeRunIfWaitingForDebugger => self.respond(ctx, json!({})),
            Method::ProfilerEnable => {
                self.sessions.set_enabled(ctx.view, Domain::Profiler, true);
                self.respond(ctx, json!({}));
            }
            Method::ProfilerDisable => {
                self.respond(ctx, json!({}));
                self.sessions.set_enabled(ctx.view, Domain::Profiler, false);
            }
            Method::ProfilerSetSamplingInterval => {
                if let Some(p) =
                    parse::<lyra_protocol::types::SetSamplingIntervalParams>(params)
                {
                    self.profiler.set_interval(p.interval);
                }
                self.respond(ctx, json!({}));
            }
            Method::ProfilerStart => {
                self.profiler.start(engine);
                self.respond(ctx, json!({}));
            }
            Method::ProfilerStop => {
                let profile = self
                    .profiler
                    .stop(engine)
                    .and_then(|json| serde_json::from_str::<JsonValue>(&json).ok())
                    .unwrap_or(JsonValue::Null);
                self.respond(ctx, json!({ "profile": profile }));
            }
            Method::HeapProfilerEnable => {
                self.sessions
                    .set_enabled(ctx.view, Domain::HeapProfiler, true);
                self.respond(ctx, json!({}));
            }
            Method::HeapProfilerDisable => {
                self.respond(ctx, json!({}));
                self.sessions
                    .set_enabled(ctx.view, Domain::HeapProfiler, false);
            }
            Method::HeapProfilerTakeHeapSnapshot => self.take_heap_snapshot(engine, ctx, params),
            Method::HeapProfilerCollectGarbage => self.respond(ctx, json!({})),
        }
    }

    // ── Debugger handlers ─────────────────────────────────────────────

    fn debugger_enable(&mut self, ctx: Ctx) {
        self.sessions.set_enabled(ctx.view, Domain::Debugger, true);
        self.respond(ctx, json!({ "debuggerId": "-1" }));
        // Back-fill every known script for the newly attached view.
        let events: Vec<JsonValue> = self
            .scripts
            .iter_ordered()
            .into_iter()
            .map(|script| {
                let event = ScriptParsedEvent {
                    script_id: script.id.to_string(),
                    url: script.url.clone(),
                    start_line: 0,
                    start_column: 0,
                    end_line: script.end_line,
                    end_column: 0,
                    execution_context_id: CONTEXT_ID,
                    hash: script.hash.clone(),
                    source_map_url: script.source_map_url.clone(),
                    length: script.source.len() as u32,
                };
                serde_json::to_value(&event).unwrap_or(JsonValue::Null)
            })
            .collect();
        for params in events {
            self.notify_view(ctx.view, "Debugger.scriptParsed", params);
        }
        if let Some(event) = self.last_pause_event.clone() {
            self.notify_view(ctx.view, "Debugger.paused", event);
            self.sessions.get_or_insert(ctx.view).paused = true;
        }
    }

    fn debugger_disable(&mut self, engine: &mut dyn Engine, ctx: Ctx) {
        self.respond(ctx, json!({}));
        if !self.sessions.is_enabled(ctx.view, Domain::Debugger) {
            return;
        }
        if self.pause.mode.is_paused() {
            self.finish_pause(engine);
        }
        self.sessions.set_enabled(ctx.view, Domain::Debugger, false);
        if !self.sessions.any_enabled(Domain::Debugger) {
            self.pause.clear_step();
            self.pause.pause_on_next = None;
            self.break_at_entry = false;
        }
    }

    fn debugger_step(&mut self, engine: &mut dyn Engine, ctx: Ctx, method: &str) {
        self.respond(ctx, json!({}));
        if !self.pause.mode.is_paused() {
            return;
        }
        let Some(kind) = dispatch::step_kind(method) else {
            return;
        };
        let depth = engine.stack_depth();
        let (line, column) = match self.current_pc {
            Some(pc) => {
                let (_, line, column) = self.pc_location(engine, pc);
                (line, column)
            }
            None => (0, 0),
        };
        // stepOver at the final statement of the top frame behaves as
        // resume: the depth-drop rule never fires once the stack
        // unwinds to zero, and no step pause remains armed.
        self.pause.set_step(
            kind,
            StepOrigin {
                line,
                column,
                depth,
                stmt_count: self.stmt_counter,
            },
        );
        self.finish_pause(engine);
    }

    fn continue_to_location(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        if let Some(p) = parse::<lyra_protocol::types::ContinueToLocationParams>(params) {
            if let Ok(script_id) = p.location.script_id.parse::<u32>() {
                let column = p.location.column_number.map(i64::from).unwrap_or(-1);
                self.breakpoints.set(
                    engine,
                    &self.scripts,
                    Locator::ScriptId(script_id),
                    p.location.line_number,
                    column,
                    None,
                    true,
                );
            }
        }
        self.respond(ctx, json!({}));
        if self.pause.mode.is_paused() {
            self.pause
                .set_step(StepKind::Continue, StepOrigin {
                    line: 0,
                    column: 0,
                    depth: 0,
                    stmt_count: self.stmt_counter,
                });
            self.finish_pause(engine);
        }
    }

    fn set_breakpoint_by_url(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let Some(p) = parse::<lyra_protocol::types::SetBreakpointByUrlParams>(params) else {
            self.respond(ctx, json!({}));
            return;
        };
        let locator = match (&p.url, &p.script_hash) {
            (Some(url), _) if !url.is_empty() => Locator::Url(url.clone()),
            (_, Some(hash)) if !hash.is_empty() => Locator::Hash(hash.clone()),
            _ => {
                self.respond(ctx, json!({}));
                return;
            }
        };
        let column = p.column_number.map(i64::from).unwrap_or(-1);
        let (id, resolved) = self.breakpoints.set(
            engine,
            &self.scripts,
            locator,
            p.line_number,
            column,
            p.condition.clone(),
            false,
        );
        let locations: Vec<Location> = resolved
            .into_iter()
            .map(|r| Location {
                script_id: r.script_id.to_string(),
                line_number: r.line,
                column_number: Some(r.column),
            })
            .collect();
        self.respond(
            ctx,
            json!({ "breakpointId": id, "locations": locations }),
        );
    }

    fn set_breakpoint(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let Some(p) = parse::<lyra_protocol::types::SetBreakpointParams>(params) else {
            self.respond(ctx, json!({}));
            return;
        };
        let Ok(script_id) = p.location.script_id.parse::<u32>() else {
            self.respond(ctx, json!({}));
            return;
        };
        let column = p.location.column_number.map(i64::from).unwrap_or(-1);
        let (id, resolved) = self.breakpoints.set(
            engine,
            &self.scripts,
            Locator::ScriptId(script_id),
            p.location.line_number,
            column,
            p.condition.clone(),
            false,
        );
        let actual = resolved.map(|r| Location {
            script_id: r.script_id.to_string(),
            line_number: r.line,
            column_number: Some(r.column),
        });
        match actual {
            Some(actual) => self.respond(
                ctx,
                json!({ "breakpointId": id, "actualLocation": actual }),
            ),
            None => self.respond(ctx, json!({ "breakpointId": id })),
        }
    }

    fn get_possible_breakpoints(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let Some(p) = parse::<lyra_protocol::types::GetPossibleBreakpointsParams>(params) else {
            self.respond(ctx, json!({ "locations": [] }));
            return;
        };
        let Ok(script_id) = p.start.script_id.parse::<u32>() else {
            self.respond(ctx, json!({ "locations": [] }));
            return;
        };
        let start = (p.start.line_number, p.start.column_number.unwrap_or(0));
        let end = p
            .end
            .as_ref()
            .map(|e| (e.line_number, e.column_number.unwrap_or(0)))
            .unwrap_or((u32::MAX, u32::MAX));

        let mut locations: Vec<BreakLocation> = Vec::new();
        for bytecode in engine.script_bytecodes(script_id) {
            let Some(info) = engine.bytecode_info(bytecode) else {
                continue;
            };
            for point in loc::line_table_points(&info) {
                let at = (point.line, point.column);
                // The end bound is exclusive, so an empty window yields
                // no locations.
                if at >= start && at < end {
                    locations.push(BreakLocation {
                        script_id: script_id.to_string(),
                        line_number: point.line,
                        column_number: Some(point.column),
                        kind: None,
                    });
                }
            }
        }
        locations.sort_by_key(|l| (l.line_number, l.column_number));
        locations.dedup_by_key(|l| (l.line_number, l.column_number));
        self.respond(ctx, json!({ "locations": locations }));
    }

    fn evaluate_on_call_frame(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let Some(p) = parse::<lyra_protocol::types::EvaluateOnCallFrameParams>(params) else {
            self.respond(ctx, json!({}));
            return;
        };
        if p.throw_on_side_effect && is_side_effect_probe(&p.expression) {
            let result = self.side_effect_probe_result();
            self.respond_result(ctx, &result);
            return;
        }
        let frame: u32 = p.call_frame_id.parse().unwrap_or(0);
        let outcome =
            self.guarded_eval(engine, |engine| engine.evaluate_on_frame(frame, &p.expression));
        let result = self.wrap_eval_outcome(
            engine,
            outcome,
            p.return_by_value,
            p.generate_preview,
            p.object_group.as_deref(),
        );
        self.respond_result(ctx, &result);
    }

    fn set_variable_value(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let Some(p) = parse::<lyra_protocol::types::SetVariableValueParams>(params) else {
            self.respond(ctx, json!({}));
            return;
        };
        if let Some(literal) = render_call_argument_literal(&p.new_value) {
            let frame: u32 = p.call_frame_id.parse().unwrap_or(0);
            let expression = format!("{} = {}", p.variable_name, literal);
            let _ =
                self.guarded_eval(engine, |engine| engine.evaluate_on_frame(frame, &expression));
        }
        self.respond(ctx, json!({}));
    }

    // ── Runtime handlers ──────────────────────────────────────────────

    fn runtime_evaluate(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let Some(p) = parse::<lyra_protocol::types::EvaluateParams>(params) else {
            self.respond(ctx, json!({}));
            return;
        };
        if p.throw_on_side_effect && is_side_effect_probe(&p.expression) {
            let result = self.side_effect_probe_result();
            self.respond_result(ctx, &result);
            return;
        }
        let outcome = self.guarded_eval(engine, |engine| engine.evaluate_global(&p.expression));
        let result = self.wrap_eval_outcome(
            engine,
            outcome,
            p.return_by_value,
            p.generate_preview,
            p.object_group.as_deref(),
        );
        self.respond_result(ctx, &result);
    }

    fn call_function_on(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let Some(p) = parse::<lyra_protocol::types::CallFunctionOnParams>(params) else {
            self.respond(ctx, json!({}));
            return;
        };
        let this = p
            .object_id
            .as_deref()
            .and_then(ObjectId::parse)
            .and_then(|id| match id {
                ObjectId::Address(addr) => self.mirrors.resolve(addr),
                ObjectId::Scope { .. } => None,
            })
            .unwrap_or_else(|| engine.undefined());
        let args: Vec<Value> = p
            .arguments
            .iter()
            .map(|arg| self.resolve_call_argument(engine, arg))
            .collect();
        let outcome = self.guarded_eval(engine, |engine| {
            let function = engine.compile_function(&p.function_declaration)?;
            engine.call_function(function, this, &args)
        });
        let result = self.wrap_eval_outcome(
            engine,
            outcome,
            p.return_by_value,
            p.generate_preview,
            p.object_group.as_deref(),
        );
        self.respond_result(ctx, &result);
    }

    fn get_properties(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let Some(p) = parse::<lyra_protocol::types::GetPropertiesParams>(params) else {
            self.respond(ctx, json!({}));
            return;
        };
        if p.accessor_properties_only {
            self.respond(ctx, json!({ "result": [] }));
            return;
        }
        let opts = self.build_opts(false, p.generate_preview, None);
        match ObjectId::parse(&p.object_id) {
            Some(ObjectId::Address(addr)) => {
                let Some(value) = self.mirrors.resolve(addr) else {
                    self.respond(ctx, json!({ "result": [] }));
                    return;
                };
                let mut result = Vec::new();
                for slot in engine.own_properties(value) {
                    let descriptor = match slot.value {
                        Ok(v) => PropertyDescriptor {
                            name: slot.name,
                            value: Some(remote_object::build(engine, &mut self.mirrors, v, &opts)),
                            writable: Some(slot.writable),
                            configurable: slot.configurable,
                            enumerable: slot.enumerable,
                            was_thrown: None,
                            is_own: Some(true),
                        },
                        Err(thrown) => PropertyDescriptor {
                            name: slot.name,
                            value: Some(remote_object::build(
                                engine,
                                &mut self.mirrors,
                                thrown,
                                &opts,
                            )),
                            writable: None,
                            configurable: slot.configurable,
                            enumerable: slot.enumerable,
                            was_thrown: Some(true),
                            is_own: Some(true),
                        },
                    };
                    result.push(descriptor);
                }
                let internals = remote_object::internal_properties(
                    engine,
                    &mut self.mirrors,
                    value,
                    &opts,
                );
                if internals.is_empty() {
                    self.respond(ctx, json!({ "result": result }));
                } else {
                    self.respond(
                        ctx,
                        json!({ "result": result, "internalProperties": internals }),
                    );
                }
            }
            Some(ObjectId::Scope { frame, kind }) => {
                let bindings = scope::scope_bindings(engine, frame, kind);
                let mut result = Vec::new();
                for (name, value) in bindings {
                    result.push(PropertyDescriptor {
                        name,
                        value: Some(remote_object::build(engine, &mut self.mirrors, value, &opts)),
                        writable: Some(true),
                        configurable: true,
                        enumerable: true,
                        was_thrown: None,
                        is_own: Some(true),
                    });
                }
                self.respond(ctx, json!({ "result": result }));
            }
            None => self.respond(ctx, json!({ "result": [] })),
        }
    }

    fn compile_script(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let Some(p) = parse::<lyra_protocol::types::CompileScriptParams>(params) else {
            self.respond(ctx, json!({}));
            return;
        };
        let url = p.source_url.unwrap_or_default();
        let outcome =
            self.guarded_eval(engine, |engine| engine.compile_script(&p.expression, &url));
        match outcome {
            Ok(compiled) => {
                if p.persist_script {
                    self.next_compiled_id += 1;
                    let id = self.next_compiled_id;
                    self.mirrors
                        .register(engine, compiled, PinScope::Running, None);
                    self.compiled.insert(id, compiled);
                    self.respond(ctx, json!({ "scriptId": id.to_string() }));
                } else {
                    self.respond(ctx, json!({}));
                }
            }
            Err(thrown) => {
                let details = self.exception_details(engine, thrown);
                self.respond(ctx, json!({ "exceptionDetails": details }));
            }
        }
    }

    fn run_script(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let Some(p) = parse::<lyra_protocol::types::RunScriptParams>(params) else {
            self.respond(ctx, json!({}));
            return;
        };
        let compiled = p
            .script_id
            .parse::<u32>()
            .ok()
            .and_then(|id| self.compiled.get(&id).copied());
        let Some(compiled) = compiled else {
            self.respond(ctx, json!({}));
            return;
        };
        let global = engine.global_object();
        let outcome =
            self.guarded_eval(engine, |engine| engine.call_function(compiled, global, &[]));
        let result = self.wrap_eval_outcome(
            engine,
            outcome,
            p.return_by_value,
            p.generate_preview,
            p.object_group.as_deref(),
        );
        self.respond_result(ctx, &result);
    }

    // ── HeapProfiler handlers ─────────────────────────────────────────

    fn take_heap_snapshot(&mut self, engine: &mut dyn Engine, ctx: Ctx, params: JsonValue) {
        let report_progress = parse::<lyra_protocol::types::TakeHeapSnapshotParams>(params)
            .map(|p| p.report_progress)
            .unwrap_or(false);
        self.respond(ctx, json!({}));

        engine.set_gc_suppressed(true);
        let snapshot = heap::build_snapshot(engine);
        engine.set_gc_suppressed(false);

        let total = snapshot.node_count() as u32;
        if report_progress {
            let progress = HeapSnapshotProgressEvent {
                done: 0,
                total,
                finished: None,
            };
            self.notify_view(
                ctx.view,
                "HeapProfiler.reportHeapSnapshotProgress",
                serde_json::to_value(&progress).unwrap_or(JsonValue::Null),
            );
        }

        let mut chunks: Vec<String> = Vec::new();
        {
            let mut sink = |chunk: &str| chunks.push(chunk.to_string());
            heap::writer::serialize(&snapshot, self.snapshot_chunk_bytes, &mut sink);
        }
        #[cfg(feature = "snapshot-progress-file")]
        if let Err(err) = write_snapshot_side_file(&chunks) {
            log::warn!("failed to mirror heap snapshot to side file: {}", err);
        }
        for chunk in chunks {
            let event = HeapSnapshotChunkEvent { chunk };
            self.notify_view(
                ctx.view,
                "HeapProfiler.addHeapSnapshotChunk",
                serde_json::to_value(&event).unwrap_or(JsonValue::Null),
            );
        }

        if report_progress {
            let progress = HeapSnapshotProgressEvent {
                done: total,
                total,
                finished: Some(true),
            };
            self.notify_view(
                ctx.view,
                "HeapProfiler.reportHeapSnapshotProgress",
                serde_json::to_value(&progress).unwrap_or(JsonValue::Null),
            );
        }
    }

    // ── pause machinery ───────────────────────────────────────────────

    fn enter_pause(
        &mut self,
        engine: &mut dyn Engine,
        mode: ExecMode,
        reason: &str,
        hit_breakpoints: Option<Vec<String>>,
        data: Option<JsonValue>,
    ) {
        if self.pause.mode.is_paused() {
            return;
        }
        if !self.sessions.any_enabled(Domain::Debugger) {
            return;
        }
        self.pause.mode = mode;
        self.sessions.set_all_paused(true);

        let call_frames = self.build_call_frames(engine);
        let event = PausedEvent {
            call_frames,
            reason: reason.to_string(),
            data,
            hit_breakpoints,
        };
        let params = serde_json::to_value(&event).unwrap_or(JsonValue::Null);
        self.last_pause_event = Some(params.clone());
        self.notify_domain(Domain::Debugger, "Debugger.paused", params);

        self.pause_loop(engine);
    }

    /// Blocking drain: runs handlers until one of them resumes
    /// execution. This is the host's `run_message_loop_on_pause`.
    fn pause_loop(&mut self, engine: &mut dyn Engine) {
        while self.pause.mode.is_paused() {
            if let Some(raw) = self.queue.recv_timeout(PAUSE_POLL) {
                self.dispatch_raw(engine, raw);
            }
        }
    }

    /// Leave the pause: release pause-scoped pins atomically, announce
    /// `Debugger.resumed`, and let the pause loop exit.
    fn finish_pause(&mut self, engine: &mut dyn Engine) {
        self.mirrors.release_pause_scope(engine);
        self.pause.mode = ExecMode::Running;
        self.sessions.set_all_paused(false);
        self.last_pause_event = None;
        self.notify_domain(Domain::Debugger, "Debugger.resumed", json!({}));
    }

    fn breakpoint_hit(&mut self, engine: &mut dyn Engine, pc: PcRef) -> Option<String> {
        let (id, condition, transient) = {
            let breakpoint = self.breakpoints.hit(pc)?;
            (
                breakpoint.id.clone(),
                breakpoint.condition.clone(),
                breakpoint.transient,
            )
        };
        if let Some(condition) = condition {
            // Conditions run with exception pausing forced off; any
            // exception during evaluation means "do not pause".
            let outcome =
                self.guarded_eval(engine, |engine| engine.evaluate_on_frame(0, &condition));
            match outcome {
                Ok(value) if is_truthy(engine, value) => {}
                _ => return None,
            }
        }
        if transient {
            self.breakpoints.remove(&id);
        }
        Some(id)
    }

    /// Run an inspector-initiated engine call under the pause
    /// suppression guard and the scoped pc save/restore guard.
    fn guarded_eval<F>(&mut self, engine: &mut dyn Engine, f: F) -> Result<Value, Value>
    where
        F: FnOnce(&mut dyn Engine) -> Result<Value, Value>,
    {
        let saved_pc = self.current_pc;
        self.pause.begin_eval_suppression();
        let result = f(engine);
        self.pause.end_eval_suppression();
        self.current_pc = saved_pc;
        result
    }

    fn wrap_eval_outcome(
        &mut self,
        engine: &mut dyn Engine,
        outcome: Result<Value, Value>,
        return_by_value: bool,
        generate_preview: bool,
        object_group: Option<&str>,
    ) -> EvaluateResult {
        let opts = self.build_opts(return_by_value, generate_preview, object_group);
        match outcome {
            Ok(value) => EvaluateResult {
                result: remote_object::build(engine, &mut self.mirrors, value, &opts),
                exception_details: None,
            },
            Err(thrown) => {
                let mirror = remote_object::build(engine, &mut self.mirrors, thrown, &opts);
                let details = self.exception_details_with_mirror(engine, mirror.clone());
                EvaluateResult {
                    result: mirror,
                    exception_details: Some(details),
                }
            }
        }
    }

    fn exception_details(&mut self, engine: &mut dyn Engine, thrown: Value) -> ExceptionDetails {
        let opts = self.build_opts(false, false, None);
        let mirror = remote_object::build(engine, &mut self.mirrors, thrown, &opts);
        self.exception_details_with_mirror(engine, mirror)
    }

    fn exception_details_with_mirror(
        &mut self,
        engine: &mut dyn Engine,
        mirror: RemoteObject,
    ) -> ExceptionDetails {
        self.next_exception_id += 1;
        let (script_id, line, column) = match self.current_pc {
            Some(pc) => self.pc_location(engine, pc),
            None => (0, 0, 0),
        };
        ExceptionDetails {
            exception_id: self.next_exception_id,
            text: "Uncaught".into(),
            line_number: line,
            column_number: column,
            script_id: (script_id != 0).then(|| script_id.to_string()),
            url: None,
            exception: Some(mirror),
        }
    }

    fn side_effect_probe_result(&mut self) -> EvaluateResult {
        self.next_exception_id += 1;
        let mirror = RemoteObject {
            kind: "object".into(),
            subtype: Some("error".into()),
            class_name: Some("EvalError".into()),
            description: Some("EvalError: Possible side-effect in debug-evaluate".into()),
            ..Default::default()
        };
        EvaluateResult {
            result: mirror.clone(),
            exception_details: Some(ExceptionDetails {
                exception_id: self.next_exception_id,
                text: "Uncaught".into(),
                line_number: 0,
                column_number: 0,
                script_id: None,
                url: None,
                exception: Some(mirror),
            }),
        }
    }

    // ── frame and stack materialization ───────────────────────────────

    fn build_call_frames(&mut self, engine: &mut dyn Engine) -> Vec<CallFrame> {
        let depth = engine.stack_depth();
        let mut frames = Vec::new();
        let opts = BuildOptions {
            pin_scope: PinScope::Pause,
            ..Default::default()
        };
        for index in 0..depth {
            let Some(frame) = engine.frame(index) else {
                continue;
            };
            let Some(bytecode) = frame.bytecode else {
                continue;
            };
            let Some(info) = engine.bytecode_info(bytecode) else {
                continue;
            };
            let point = loc::resolve_pc(&info, frame.pc);
            let (start_line, start_column) = loc::unpack_line_col(info.start_pos);
            let url = self
                .scripts
                .get(info.script_id)
                .map(|s| s.url.clone())
                .unwrap_or_default();
            let this = remote_object::build(engine, &mut self.mirrors, frame.this, &opts);
            frames.push(CallFrame {
                call_frame_id: index.to_string(),
                function_name: frame.function_name.clone(),
                function_location: Some(Location {
                    script_id: info.script_id.to_string(),
                    line_number: start_line,
                    column_number: Some(start_column),
                }),
                location: Location {
                    script_id: info.script_id.to_string(),
                    line_number: point.line,
                    column_number: Some(point.column),
                },
                url,
                scope_chain: scope::scope_chain(index, frame.closure_depth),
                this,
            });
        }
        frames
    }

    /// Short stack trace for console entries.
    fn capture_stack(&mut self, engine: &mut dyn Engine) -> StackTrace {
        let mut call_frames = Vec::new();
        for index in 0..engine.stack_depth().min(16) {
            let Some(frame) = engine.frame(index) else {
                continue;
            };
            let Some(bytecode) = frame.bytecode else {
                continue;
            };
            let Some(info) = engine.bytecode_info(bytecode) else {
                continue;
            };
            let point = loc::resolve_pc(&info, frame.pc);
            call_frames.push(StackFrame {
                function_name: frame.function_name.clone(),
                script_id: info.script_id.to_string(),
                url: self
                    .scripts
                    .get(info.script_id)
                    .map(|s| s.url.clone())
                    .unwrap_or_default(),
                line_number: point.line,
                column_number: point.column,
            });
        }
        StackTrace {
            description: None,
            call_frames,
        }
    }

    fn pc_location(&self, engine: &dyn Engine, pc: PcRef) -> (u32, u32, u32) {
        match engine.bytecode_info(pc.bytecode) {
            Some(info) => {
                let point = loc::resolve_pc(&info, pc.pc);
                (info.script_id, point.line, point.column)
            }
            None => (0, 0, 0),
        }
    }

    // ── outbound helpers ──────────────────────────────────────────────

    fn build_opts(
        &self,
        return_by_value: bool,
        generate_preview: bool,
        object_group: Option<&str>,
    ) -> BuildOptions {
        BuildOptions {
            generate_preview,
            return_by_value,
            pin_scope: if self.pause.mode.is_paused() {
                PinScope::Pause
            } else {
                PinScope::Running
            },
            object_group: object_group.map(String::from),
        }
    }

    fn resolve_call_argument(&mut self, engine: &mut dyn Engine, arg: &CallArgument) -> Value {
        if let Some(id) = arg.object_id.as_deref().and_then(ObjectId::parse) {
            if let ObjectId::Address(addr) = id {
                if let Some(value) = self.mirrors.resolve(addr) {
                    return value;
                }
            }
        }
        if let Some(json) = &arg.value {
            return engine.value_from_json(json);
        }
        engine.undefined()
    }

    fn respond(&mut self, ctx: Ctx, result: JsonValue) {
        let frame = envelope::response(ctx.id, &result, ctx.view);
        self.transport.send_response(ctx.view, ctx.id, frame);
    }

    fn respond_result(&mut self, ctx: Ctx, result: &EvaluateResult) {
        let body = serde_json::to_value(result).unwrap_or(JsonValue::Null);
        self.respond(ctx, body);
    }

    fn notify_view(&mut self, view: Option<u32>, method: &str, params: JsonValue) {
        let frame = envelope::notification(method, &params, view);
        self.transport.send_notification(view, frame);
    }

    fn notify_domain(&mut self, domain: Domain, method: &str, params: JsonValue) {
        for view in self.sessions.enabled_views(domain) {
            self.notify_view(view, method, params.clone());
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(params: JsonValue) -> Option<T> {
    serde_json::from_value(params).ok()
}

/// JS truthiness of an engine value, as needed by breakpoint
/// conditions.
fn is_truthy(engine: &dyn Engine, value: Value) -> bool {
    match engine.describe(value) {
        ValueInfo::Undefined | ValueInfo::Null => false,
        ValueInfo::Bool(b) => b,
        ValueInfo::Number(n) => n != 0.0 && !n.is_nan(),
        ValueInfo::BigInt(digits) => !digits.is_empty() && digits != "0",
        ValueInfo::String(s) => !s.is_empty(),
        ValueInfo::Symbol(_) | ValueInfo::Function(_) | ValueInfo::Object(_) => true,
    }
}

fn is_side_effect_probe(expression: &str) -> bool {
    let trimmed = expression.trim();
    let inner = trimmed
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .map(str::trim)
        .unwrap_or(trimmed);
    inner == SIDE_EFFECT_PROBE
}

/// Literal source for `setVariableValue`'s synthesized assignment.
fn render_call_argument_literal(arg: &CallArgument) -> Option<String> {
    if let Some(unserializable) = &arg.unserializable_value {
        return Some(unserializable.clone());
    }
    let json = arg.value.as_ref()?;
    serde_json::to_string(json).ok()
}

#[cfg(feature = "snapshot-progress-file")]
fn write_snapshot_side_file(chunks: &[String]) -> Result<(), crate::error::InspectorError> {
    use std::io::Write;
    let mut file = std::fs::File::create("lyra.heapsnapshot")?;
    for chunk in chunks {
        file.write_all(chunk.as_bytes())?;
    }
    Ok(())
}
