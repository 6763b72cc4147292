//! Method dispatch table.
//!
//! A read-only map from CDP method name to a handler key. The three
//! stepping methods share one handler and are told apart by the
//! side table in [`step_kind`]. Lookup misses, disabled domains, and
//! bad params all answer with an empty result; they are not errors.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::debugger::stepping::StepKind;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Method {
    DebuggerEnable,
    DebuggerDisable,
    DebuggerPause,
    DebuggerResume,
    DebuggerStep,
    DebuggerContinueToLocation,
    DebuggerSetBreakpoint,
    DebuggerSetBreakpointByUrl,
    DebuggerRemoveBreakpoint,
    DebuggerSetBreakpointsActive,
    DebuggerGetPossibleBreakpoints,
    DebuggerGetScriptSource,
    DebuggerSetPauseOnExceptions,
    DebuggerSetSkipAllPauses,
    DebuggerEvaluateOnCallFrame,
    DebuggerSetVariableValue,
    DebuggerSetAsyncCallStackDepth,
    DebuggerPauseOnNextStatement,
    DebuggerStopAtEntry,
    RuntimeEnable,
    RuntimeDisable,
    RuntimeEvaluate,
    RuntimeCallFunctionOn,
    RuntimeGetProperties,
    RuntimeCompileScript,
    RuntimeRunScript,
    RuntimeGlobalLexicalScopeNames,
    RuntimeDiscardConsoleEntries,
    RuntimeGetHeapUsage,
    RuntimeSetAsyncCallStackDepth,
    RuntimeReleaseObject,
    RuntimeReleaseObjectGroup,
    RuntimeRunIfWaitingForDebugger,
    ProfilerEnable,
    ProfilerDisable,
    ProfilerSetSamplingInterval,
    ProfilerStart,
    ProfilerStop,
    HeapProfilerEnable,
    HeapProfilerDisable,
    HeapProfilerTakeHeapSnapshot,
    HeapProfilerCollectGarbage,
}

static METHOD_TABLE: Lazy<FxHashMap<&'static str, Method>> = Lazy::new(|| {
    use Method::*;
    let entries: &[(&str, Method)] = &[
        ("Debugger.enable", DebuggerEnable),
        ("Debugger.disable", DebuggerDisable),
        ("Debugger.pause", DebuggerPause),
        ("Debugger.resume", DebuggerResume),
        ("Debugger.stepInto", DebuggerStep),
        ("Debugger.stepOver", DebuggerStep),
        ("Debugger.stepOut", DebuggerStep),
        ("Debugger.continueToLocation", DebuggerContinueToLocation),
        ("Debugger.setBreakpoint", DebuggerSetBreakpoint),
        ("Debugger.setBreakpointByUrl", DebuggerSetBreakpointByUrl),
        ("Debugger.removeBreakpoint", DebuggerRemoveBreakpoint),
        ("Debugger.setBreakpointsActive", DebuggerSetBreakpointsActive),
        ("Debugger.getPossibleBreakpoints", DebuggerGetPossibleBreakpoints),
        ("Debugger.getScriptSource", DebuggerGetScriptSource),
        ("Debugger.setPauseOnExceptions", DebuggerSetPauseOnExceptions),
        ("Debugger.setSkipAllPauses", DebuggerSetSkipAllPauses),
        ("Debugger.evaluateOnCallFrame", DebuggerEvaluateOnCallFrame),
        ("Debugger.setVariableValue", DebuggerSetVariableValue),
        ("Debugger.setAsyncCallStackDepth", DebuggerSetAsyncCallStackDepth),
        ("Debugger.pauseOnNextStatement", DebuggerPauseOnNextStatement),
        ("Debugger.stopAtEntry", DebuggerStopAtEntry),
        ("Runtime.enable", RuntimeEnable),
        ("Runtime.disable", RuntimeDisable),
        ("Runtime.evaluate", RuntimeEvaluate),
        ("Runtime.callFunctionOn", RuntimeCallFunctionOn),
        ("Runtime.getProperties", RuntimeGetProperties),
        ("Runtime.compileScript", RuntimeCompileScript),
        ("Runtime.runScript", RuntimeRunScript),
        ("Runtime.globalLexicalScopeNames", RuntimeGlobalLexicalScopeNames),
        ("Runtime.discardConsoleEntries", RuntimeDiscardConsoleEntries),
        ("Runtime.getHeapUsage", RuntimeGetHeapUsage),
        ("Runtime.setAsyncCallStackDepth", RuntimeSetAsyncCallStackDepth),
        ("Runtime.releaseObject", RuntimeReleaseObject),
        ("Runtime.releaseObjectGroup", RuntimeReleaseObjectGroup),
        ("Runtime.runIfWaitingForDebugger", RuntimeRunIfWaitingForDebugger),
        ("Profiler.enable", ProfilerEnable),
        ("Profiler.disable", ProfilerDisable),
        ("Profiler.setSamplingInterval", ProfilerSetSamplingInterval),
        ("Profiler.start", ProfilerStart),
        ("Profiler.stop", ProfilerStop),
        ("HeapProfiler.enable", HeapProfilerEnable),
        ("HeapProfiler.disable", HeapProfilerDisable),
        ("HeapProfiler.takeHeapSnapshot", HeapProfilerTakeHeapSnapshot),
        ("HeapProfiler.collectGarbage", HeapProfilerCollectGarbage),
    ];
    entries.iter().copied().collect()
});

/// Handler key for a method name.
pub fn lookup(method: &str) -> Option<Method> {
    METHOD_TABLE.get(method).copied()
}

/// Side table telling the shared step handler which kind was asked.
pub fn step_kind(method: &str) -> Option<StepKind> {
    match method {
        "Debugger.stepInto" => Some(StepKind::Into),
        "Debugger.stepOver" => Some(StepKind::Over),
        "Debugger.stepOut" => Some(StepKind::Out),
        _ => None,
    }
}

/// Methods dispatched regardless of the session's enable state.
pub fn is_always_allowed(method: &str) -> bool {
    method.ends_with(".enable")
        || method.ends_with(".disable")
        || method == "Debugger.pauseOnNextStatement"
}
