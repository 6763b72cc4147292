//! Breakpoint scenarios, including the conditional-hit flow.

use super::harness::{install_program, push_frame, Fixture};
use lyra_inspector::engine::PcRef;
use serde_json::json;

#[test]
fn test_set_breakpoint_by_url_adjusts_location() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    let result = fx.send(
        "Debugger.setBreakpointByUrl",
        json!({ "lineNumber": 0, "columnNumber": 15, "url": "t.js" }),
    );
    assert_eq!(result["breakpointId"], "1:0:15:t.js");
    assert_eq!(
        result["locations"],
        json!([{ "scriptId": program.script_id.to_string(), "lineNumber": 0, "columnNumber": 15 }])
    );
}

#[test]
fn test_set_breakpoint_is_idempotent_over_the_wire() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    install_program(&mut fx);
    let params = json!({ "lineNumber": 0, "columnNumber": 15, "url": "t.js" });
    let first = fx.send("Debugger.setBreakpointByUrl", params.clone());
    let second = fx.send("Debugger.setBreakpointByUrl", params);
    assert_eq!(first, second);
    assert_eq!(fx.inspector.breakpoints().len(), 1);
}

#[test]
fn test_conditional_breakpoint_hit_and_miss() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    fx.send(
        "Debugger.setBreakpointByUrl",
        json!({
            "lineNumber": 0,
            "columnNumber": 15,
            "url": "t.js",
            "condition": "x===4"
        }),
    );
    let bp_pc = PcRef {
        bytecode: program.bytecode,
        pc: 4,
    };
    push_frame(&mut fx, &program, 4);

    // First call: f(3), condition false, no pause.
    let falsy = fx.engine.add_bool(false);
    fx.engine.script_eval("x===4", Ok(falsy));
    fx.inspector.on_tick(&mut fx.engine, bp_pc, 1);
    assert!(fx.paused_events().is_empty());

    // Second call: f(4), condition true, pause with the hit id.
    let truthy = fx.engine.add_bool(true);
    fx.engine.script_eval("x===4", Ok(truthy));
    fx.push_later(50, "Debugger.resume", json!({}));
    fx.inspector.on_tick(&mut fx.engine, bp_pc, 1);

    let paused = fx.paused_events();
    assert_eq!(paused.len(), 1);
    assert_eq!(paused[0]["params"]["hitBreakpoints"], json!(["1:0:15:t.js"]));
    assert_eq!(
        paused[0]["params"]["callFrames"][0]["location"]["columnNumber"],
        15
    );
    assert_eq!(fx.resumed_events().len(), 1);
    assert!(!fx.inspector.is_paused());
}

#[test]
fn test_condition_exception_means_no_pause() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    fx.send(
        "Debugger.setBreakpointByUrl",
        json!({ "lineNumber": 0, "columnNumber": 15, "url": "t.js", "condition": "boom()" }),
    );
    push_frame(&mut fx, &program, 4);
    let thrown = fx.engine.add_string("TypeError: boom is not defined");
    fx.engine.script_eval("boom()", Err(thrown));
    fx.inspector.on_tick(
        &mut fx.engine,
        PcRef {
            bytecode: program.bytecode,
            pc: 4,
        },
        1,
    );
    assert!(fx.paused_events().is_empty());
}

#[test]
fn test_breakpoint_past_end_is_retained_unresolved() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    install_program(&mut fx);
    let result = fx.send(
        "Debugger.setBreakpointByUrl",
        json!({ "lineNumber": 1, "url": "t.js" }),
    );
    assert_eq!(result["breakpointId"], "1:1:-1:t.js");
    assert_eq!(result["locations"], json!([]));
    assert_eq!(fx.inspector.breakpoints().len(), 1);
}

#[test]
fn test_unresolved_breakpoint_resolves_on_later_parse() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let result = fx.send(
        "Debugger.setBreakpointByUrl",
        json!({ "lineNumber": 0, "columnNumber": 0, "url": "late.js" }),
    );
    assert_eq!(result["locations"], json!([]));

    // The script arrives afterwards, with bytecode already known.
    let mut table = Vec::new();
    lyra_inspector::debugger::location::encode_record(&mut table, 4, 15);
    fx.engine.add_bytecode(
        0xB100,
        lyra_inspector::engine::BytecodeInfo {
            script_id: 1,
            function_name: "g".into(),
            start_pos: 0,
            pc_to_line: table,
        },
    );
    fx.inspector
        .on_script_parsed(&mut fx.engine, "var late;", "late.js", 0, false);
    let breakpoint = fx.inspector.breakpoints().get("1:0:0:late.js").unwrap();
    assert!(breakpoint.resolved.is_some());
}

#[test]
fn test_remove_breakpoint_disarms_pc() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    fx.send(
        "Debugger.setBreakpointByUrl",
        json!({ "lineNumber": 0, "columnNumber": 15, "url": "t.js" }),
    );
    fx.send(
        "Debugger.removeBreakpoint",
        json!({ "breakpointId": "1:0:15:t.js" }),
    );
    push_frame(&mut fx, &program, 4);
    fx.inspector.on_tick(
        &mut fx.engine,
        PcRef {
            bytecode: program.bytecode,
            pc: 4,
        },
        1,
    );
    assert!(fx.paused_events().is_empty());
}

#[test]
fn test_set_breakpoints_active_false_suppresses_hits() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    fx.send(
        "Debugger.setBreakpointByUrl",
        json!({ "lineNumber": 0, "columnNumber": 15, "url": "t.js" }),
    );
    fx.send("Debugger.setBreakpointsActive", json!({ "active": false }));
    push_frame(&mut fx, &program, 4);
    fx.inspector.on_tick(
        &mut fx.engine,
        PcRef {
            bytecode: program.bytecode,
            pc: 4,
        },
        1,
    );
    assert!(fx.paused_events().is_empty());
}

#[test]
fn test_get_possible_breakpoints_lists_points() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    let result = fx.send(
        "Debugger.getPossibleBreakpoints",
        json!({
            "start": { "scriptId": program.script_id.to_string(), "lineNumber": 0, "columnNumber": 0 }
        }),
    );
    let locations = result["locations"].as_array().unwrap();
    let columns: Vec<u64> = locations
        .iter()
        .map(|l| l["columnNumber"].as_u64().unwrap())
        .collect();
    assert_eq!(columns, vec![0, 15, 30]);
}

#[test]
fn test_get_possible_breakpoints_empty_window() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    let at = json!({ "scriptId": program.script_id.to_string(), "lineNumber": 0, "columnNumber": 15 });
    let result = fx.send(
        "Debugger.getPossibleBreakpoints",
        json!({ "start": at, "end": at }),
    );
    assert_eq!(result["locations"], json!([]));
}

#[test]
fn test_continue_to_location_installs_transient_breakpoint() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    fx.send(
        "Debugger.continueToLocation",
        json!({
            "location": {
                "scriptId": program.script_id.to_string(),
                "lineNumber": 0,
                "columnNumber": 30
            }
        }),
    );
    let id = format!("1:0:30:{}", program.script_id);
    assert!(fx.inspector.breakpoints().get(&id).unwrap().transient);

    // Hitting it pauses once and removes it.
    push_frame(&mut fx, &program, 8);
    fx.push_later(50, "Debugger.resume", json!({}));
    fx.inspector.on_tick(
        &mut fx.engine,
        PcRef {
            bytecode: program.bytecode,
            pc: 8,
        },
        1,
    );
    assert_eq!(fx.paused_events().len(), 1);
    assert!(fx.inspector.breakpoints().get(&id).is_none());
}

#[test]
fn test_set_breakpoint_by_location() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    let result = fx.send(
        "Debugger.setBreakpoint",
        json!({
            "location": {
                "scriptId": program.script_id.to_string(),
                "lineNumber": 0,
                "columnNumber": 15
            }
        }),
    );
    assert_eq!(
        result["breakpointId"],
        format!("1:0:15:{}", program.script_id)
    );
    assert_eq!(result["actualLocation"]["lineNumber"], 0);
    assert_eq!(result["actualLocation"]["columnNumber"], 15);
}
