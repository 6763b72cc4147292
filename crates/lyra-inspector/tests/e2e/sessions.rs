//! Session controller and dispatcher behavior over the wire.

use super::harness::{install_program, Fixture, PROGRAM_SRC};
use serde_json::json;

#[test]
fn test_debugger_enable_returns_debugger_id() {
    let mut fx = Fixture::new();
    let result = fx.send("Debugger.enable", json!({}));
    assert_eq!(result, json!({ "debuggerId": "-1" }));
}

#[test]
fn test_unknown_method_answers_empty_result() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let result = fx.send("Debugger.noSuchMethod", json!({}));
    assert_eq!(result, json!({}));
}

#[test]
fn test_unknown_domain_answers_empty_result() {
    let mut fx = Fixture::new();
    let result = fx.send("Page.navigate", json!({ "url": "about:blank" }));
    assert_eq!(result, json!({}));
}

#[test]
fn test_method_before_enable_answers_empty_stub() {
    let mut fx = Fixture::new();
    // Runtime.evaluate without Runtime.enable: stubbed, not executed.
    let result = fx.send("Runtime.evaluate", json!({ "expression": "1+1" }));
    assert_eq!(result, json!({}));
    assert!(fx.engine.eval_log.borrow().is_empty());
}

#[test]
fn test_malformed_frames_are_dropped_silently() {
    let mut fx = Fixture::new();
    fx.sender.push("{not json".into());
    fx.sender.push(r#"{"method":"Debugger.enable"}"#.into());
    fx.pump();
    assert!(fx.transport.frames().is_empty());
}

#[test]
fn test_runtime_enable_announces_execution_context() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let events = fx.transport.notifications("Runtime.executionContextCreated");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["params"]["context"]["id"], 1);
}

#[test]
fn test_script_parsed_reaches_enabled_sessions_only() {
    let mut fx = Fixture::new();
    install_program(&mut fx);
    // Nobody was listening when the script parsed.
    assert!(fx.transport.notifications("Debugger.scriptParsed").is_empty());

    // Enabling back-fills the known scripts.
    fx.send("Debugger.enable", json!({}));
    let events = fx.transport.notifications("Debugger.scriptParsed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["params"]["url"], "t.js");
}

#[test]
fn test_script_parsed_fan_out_while_enabled() {
    let mut fx = Fixture::new();
    fx.send_from(Some(1), "Debugger.enable", json!({}));
    fx.send_from(Some(2), "Debugger.enable", json!({}));
    install_program(&mut fx);
    let events = fx.transport.notifications("Debugger.scriptParsed");
    assert_eq!(events.len(), 2);
    let views: Vec<_> = fx
        .transport
        .frames()
        .iter()
        .filter(|f| f.call_id.is_none() && f.body["method"] == "Debugger.scriptParsed")
        .map(|f| f.view_id)
        .collect();
    assert_eq!(views, vec![Some(1), Some(2)]);
}

#[test]
fn test_get_script_source_round_trips_bytes() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    let result = fx.send(
        "Debugger.getScriptSource",
        json!({ "scriptId": program.script_id.to_string() }),
    );
    assert_eq!(result["scriptSource"], PROGRAM_SRC);
}

#[test]
fn test_script_ids_unique_across_registrations() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let a = fx
        .inspector
        .on_script_parsed(&mut fx.engine, "var a;", "a.js", 0, false);
    let b = fx
        .inspector
        .on_script_parsed(&mut fx.engine, "var b;", "b.js", 0, false);
    assert_ne!(a, b);
    let events = fx.transport.notifications("Debugger.scriptParsed");
    let ids: Vec<&str> = events
        .iter()
        .map(|e| e["params"]["scriptId"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_script_failed_to_parse_drops_record() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let id = fx
        .inspector
        .on_script_parsed(&mut fx.engine, "var broken = ;", "bad.js", 0, true);
    assert_eq!(
        fx.transport
            .notifications("Debugger.scriptFailedToParse")
            .len(),
        1
    );
    assert!(fx.transport.notifications("Debugger.scriptParsed").is_empty());
    let result = fx.send(
        "Debugger.getScriptSource",
        json!({ "scriptId": id.to_string() }),
    );
    assert_eq!(result, json!({}));
}

#[test]
fn test_console_api_called_when_runtime_enabled() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let msg = fx.engine.add_string("hello");
    fx.inspector.on_console_call(&mut fx.engine, "log", &[msg]);
    let events = fx.transport.notifications("Runtime.consoleAPICalled");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["params"]["type"], "log");
    assert_eq!(events[0]["params"]["args"][0]["value"], "hello");
    assert_eq!(fx.inspector.console().len(), 1);
}

#[test]
fn test_console_runtime_id_tagging() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let tag = fx.engine.add_string("lepusRuntimeId:7");
    let msg = fx.engine.add_string("payload");
    fx.inspector.on_console_call(&mut fx.engine, "info", &[tag, msg]);
    let events = fx.transport.notifications("Runtime.consoleAPICalled");
    assert_eq!(events[0]["params"]["runtimeId"], 7);
}

#[test]
fn test_console_captured_even_without_runtime() {
    let mut fx = Fixture::new();
    let msg = fx.engine.add_string("quiet");
    fx.inspector.on_console_call(&mut fx.engine, "debug", &[msg]);
    assert!(fx
        .transport
        .notifications("Runtime.consoleAPICalled")
        .is_empty());
    assert_eq!(fx.inspector.console().len(), 1);
}

#[test]
fn test_discard_console_entries() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let msg = fx.engine.add_string("x");
    fx.inspector.on_console_call(&mut fx.engine, "log", &[msg]);
    fx.send("Runtime.discardConsoleEntries", json!({}));
    assert!(fx.inspector.console().is_empty());
}

#[test]
fn test_multi_session_isolation_and_late_enable() {
    let mut fx = Fixture::new();
    fx.send_from(Some(1), "Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    fx.send_from(
        Some(1),
        "Debugger.setBreakpointByUrl",
        json!({ "lineNumber": 0, "columnNumber": 0, "url": "t.js" }),
    );
    super::harness::push_frame(&mut fx, &program, 0);

    // View 2 attaches while paused; the pause is then resumed.
    fx.push_later_from(Some(2), 60, "Debugger.enable", json!({}));
    fx.push_later_from(Some(1), 200, "Debugger.resume", json!({}));
    fx.inspector.on_tick(
        &mut fx.engine,
        lyra_inspector::engine::PcRef {
            bytecode: program.bytecode,
            pc: 0,
        },
        1,
    );

    let paused_views: Vec<_> = fx
        .transport
        .frames()
        .iter()
        .filter(|f| f.call_id.is_none() && f.body["method"] == "Debugger.paused")
        .map(|f| f.view_id)
        .collect();
    // The initial pause reached only view 1; view 2 received the
    // current pause immediately after enabling.
    assert_eq!(paused_views, vec![Some(1), Some(2)]);

    // View 2 also got the back-filled scriptParsed.
    let script_views: Vec<_> = fx
        .transport
        .frames()
        .iter()
        .filter(|f| f.call_id.is_none() && f.body["method"] == "Debugger.scriptParsed")
        .map(|f| f.view_id)
        .collect();
    assert!(script_views.contains(&Some(2)));
    assert!(!fx.inspector.is_paused());
}

#[test]
fn test_set_async_call_stack_depth_recorded() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let result = fx.send("Debugger.setAsyncCallStackDepth", json!({ "maxDepth": 8 }));
    assert_eq!(result, json!({}));
    assert_eq!(fx.inspector.async_stack_depth(), 8);

    fx.send("Runtime.enable", json!({}));
    fx.send("Runtime.setAsyncCallStackDepth", json!({ "maxDepth": 4 }));
    assert_eq!(fx.inspector.async_stack_depth(), 4);
}

#[test]
fn test_domain_disable_round_trips() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    fx.send("Profiler.enable", json!({}));
    fx.send("HeapProfiler.enable", json!({}));
    assert_eq!(fx.send("Runtime.disable", json!({})), json!({}));
    assert_eq!(fx.send("Profiler.disable", json!({})), json!({}));
    assert_eq!(fx.send("HeapProfiler.disable", json!({})), json!({}));
    // Disabled domains stub out again.
    let result = fx.send("Runtime.evaluate", json!({ "expression": "1" }));
    assert_eq!(result, json!({}));
}

#[test]
fn test_run_if_waiting_for_debugger_acknowledged() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let result = fx.send("Runtime.runIfWaitingForDebugger", json!({}));
    assert_eq!(result, json!({}));
}
