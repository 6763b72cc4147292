//! Evaluation paths: on-frame, global, callFunctionOn, and the mirror
//! surface they return.

use super::harness::{install_program, push_frame, Fixture};
use lyra_inspector::engine::{Engine, ObjectTraits, PropertySlot};
use serde_json::json;

#[test]
fn test_evaluate_on_call_frame_returns_value() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    push_frame(&mut fx, &program, 4);
    let six = fx.engine.add_number(6.0);
    fx.engine.script_eval("x*2", Ok(six));
    let result = fx.send(
        "Debugger.evaluateOnCallFrame",
        json!({ "callFrameId": "0", "expression": "x*2" }),
    );
    assert_eq!(result["result"]["type"], "number");
    assert_eq!(result["result"]["value"], 6.0);
    assert!(result.get("exceptionDetails").is_none());
}

#[test]
fn test_evaluate_exception_is_wrapped_not_paused() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    // Even with pause-on-exceptions armed, inspector-initiated
    // evaluation never pauses.
    fx.send("Debugger.setPauseOnExceptions", json!({ "state": "all" }));
    push_frame(&mut fx, &program, 4);

    let error = fx.engine.add_object("ReferenceError", ObjectTraits::ERROR, None);
    fx.engine.value_mut(error).display =
        "ReferenceError: nope is not defined".into();
    fx.engine.script_eval("nope.x", Err(error));

    let result = fx.send(
        "Debugger.evaluateOnCallFrame",
        json!({ "callFrameId": "0", "expression": "nope.x" }),
    );
    assert_eq!(result["result"]["type"], "object");
    assert_eq!(result["result"]["subtype"], "error");
    assert_eq!(
        result["result"]["description"],
        "ReferenceError: nope is not defined"
    );
    let details = &result["exceptionDetails"];
    assert_eq!(details["text"], "Uncaught");
    assert_eq!(details["exception"]["subtype"], "error");
    // No Debugger.paused was emitted as a side effect.
    assert!(fx.paused_events().is_empty());
}

#[test]
fn test_side_effect_probe_gets_canned_answer() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let result = fx.send(
        "Debugger.evaluateOnCallFrame",
        json!({
            "callFrameId": "0",
            "expression": "(async function(){ await 1; })()",
            "throwOnSideEffect": true
        }),
    );
    assert_eq!(
        result["result"]["description"],
        "EvalError: Possible side-effect in debug-evaluate"
    );
    // The engine never saw the expression.
    assert!(fx.engine.eval_log.borrow().is_empty());
}

#[test]
fn test_runtime_evaluate_runs_globally() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let v = fx.engine.add_string("ok");
    fx.engine.script_eval("probe()", Ok(v));
    let result = fx.send("Runtime.evaluate", json!({ "expression": "probe()" }));
    assert_eq!(result["result"]["value"], "ok");
    assert_eq!(fx.engine.eval_log.borrow()[0], "global:probe()");
}

#[test]
fn test_call_function_on_return_by_value_round_trip() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    // The compiled function returns its numeric argument unchanged.
    let f = fx.engine.compile_function("function(v){ return v; }").unwrap();
    fx.engine.script_eval("function(v){ return v; }", Ok(f));
    let echoed = fx.engine.add_number(42.0);
    fx.engine.script_call(f, Ok(echoed));

    let result = fx.send(
        "Runtime.callFunctionOn",
        json!({
            "functionDeclaration": "function(v){ return v; }",
            "arguments": [{ "value": 42 }],
            "returnByValue": true
        }),
    );
    assert_eq!(result["result"]["type"], "number");
    assert_eq!(result["result"]["value"], 42.0);
    assert!(result["result"].get("objectId").is_none());
}

#[test]
fn test_set_variable_value_round_trip() {
    let mut fx = Fixture::new();
    fx.send("Debugger.enable", json!({}));
    let program = install_program(&mut fx);
    push_frame(&mut fx, &program, 4);

    let result = fx.send(
        "Debugger.setVariableValue",
        json!({
            "scopeNumber": 1,
            "variableName": "x",
            "newValue": { "value": 42 },
            "callFrameId": "0"
        }),
    );
    assert_eq!(result, json!({}));
    // The synthesized assignment ran on the target frame.
    assert_eq!(fx.engine.eval_log.borrow()[0], "frame:0:x = 42");

    // A subsequent getProperties on the local scope sees the value.
    let x = fx.engine.add_number(42.0);
    fx.engine.frame_locals[0] = vec![("x".into(), x)];
    fx.send("Runtime.enable", json!({}));
    let props = fx.send("Runtime.getProperties", json!({ "objectId": "scope:1" }));
    assert_eq!(props["result"][0]["name"], "x");
    assert_eq!(props["result"][0]["value"]["value"], 42.0);
}

#[test]
fn test_get_properties_on_object_mirror() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let obj = fx.engine.add_object("Object", ObjectTraits::empty(), None);
    let a = fx.engine.add_number(1.0);
    let undefined = fx.engine.undefined_value();
    fx.engine.value_mut(obj).props = vec![
        PropertySlot {
            name: "a".into(),
            value: Ok(a),
            writable: true,
            enumerable: true,
            configurable: true,
        },
        PropertySlot {
            name: "boom".into(),
            value: Err(undefined),
            writable: false,
            enumerable: true,
            configurable: true,
        },
    ];
    fx.engine.script_eval("it", Ok(obj));
    let result = fx.send("Runtime.evaluate", json!({ "expression": "it" }));
    let object_id = result["result"]["objectId"].as_str().unwrap().to_string();

    let props = fx.send("Runtime.getProperties", json!({ "objectId": object_id }));
    assert_eq!(props["result"][0]["name"], "a");
    assert_eq!(props["result"][0]["value"]["value"], 1.0);
    assert_eq!(props["result"][1]["name"], "boom");
    assert_eq!(props["result"][1]["wasThrown"], true);
}

#[test]
fn test_get_properties_resolves_same_pin_during_pause_scope() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let obj = fx.engine.add_object("Object", ObjectTraits::empty(), None);
    fx.engine.script_eval("it", Ok(obj));
    let result = fx.send("Runtime.evaluate", json!({ "expression": "it" }));
    let object_id = result["result"]["objectId"].as_str().unwrap().to_string();
    assert_eq!(object_id, obj.addr().to_string());
    assert!(fx.engine.is_pinned(obj));

    // Releasing drops the pin and the id stops resolving.
    fx.send("Runtime.releaseObject", json!({ "objectId": object_id.clone() }));
    assert!(!fx.engine.is_pinned(obj));
    let props = fx.send("Runtime.getProperties", json!({ "objectId": object_id }));
    assert_eq!(props["result"], json!([]));
}

#[test]
fn test_compile_and_run_script() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let compiled = fx.engine.compile_function("1 + 1").unwrap();
    fx.engine.script_eval("1 + 1", Ok(compiled));
    let two = fx.engine.add_number(2.0);
    fx.engine.script_call(compiled, Ok(two));

    let result = fx.send(
        "Runtime.compileScript",
        json!({ "expression": "1 + 1", "persistScript": true }),
    );
    let script_id = result["scriptId"].as_str().unwrap().to_string();

    let run = fx.send("Runtime.runScript", json!({ "scriptId": script_id }));
    assert_eq!(run["result"]["value"], 2.0);
}

#[test]
fn test_global_lexical_scope_names() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let v = fx.engine.add_number(1.0);
    fx.engine.lexical = vec![("answer".into(), v)];
    let result = fx.send("Runtime.globalLexicalScopeNames", json!({}));
    assert_eq!(result["names"], json!(["answer"]));
}

#[test]
fn test_get_heap_usage() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let result = fx.send("Runtime.getHeapUsage", json!({}));
    assert_eq!(result["usedSize"], 1024.0);
    assert_eq!(result["totalSize"], 4096.0);
}

#[test]
fn test_evaluate_with_preview() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let arr = fx.engine.add_object("Array", ObjectTraits::ARRAY, Some(2));
    let one = fx.engine.add_number(1.0);
    let two = fx.engine.add_number(2.0);
    fx.engine.value_mut(arr).props = vec![
        PropertySlot {
            name: "0".into(),
            value: Ok(one),
            writable: true,
            enumerable: true,
            configurable: true,
        },
        PropertySlot {
            name: "1".into(),
            value: Ok(two),
            writable: true,
            enumerable: true,
            configurable: true,
        },
    ];
    fx.engine.script_eval("arr", Ok(arr));
    let result = fx.send(
        "Runtime.evaluate",
        json!({ "expression": "arr", "generatePreview": true }),
    );
    assert_eq!(result["result"]["description"], "Array(2)");
    let preview = &result["result"]["preview"];
    assert_eq!(preview["overflow"], false);
    assert_eq!(preview["properties"][0]["value"], "1");
    assert_eq!(preview["properties"][1]["value"], "2");
}

#[test]
fn test_release_object_group_drops_all_pins() {
    let mut fx = Fixture::new();
    fx.send("Runtime.enable", json!({}));
    let a = fx.engine.add_object("Object", ObjectTraits::empty(), None);
    let b = fx.engine.add_object("Object", ObjectTraits::empty(), None);
    fx.engine.script_eval("a", Ok(a));
    fx.engine.script_eval("b", Ok(b));
    fx.send(
        "Runtime.evaluate",
        json!({ "expression": "a", "objectGroup": "repl" }),
    );
    fx.send(
        "Runtime.evaluate",
        json!({ "expression": "b", "objectGroup": "repl" }),
    );
    assert!(fx.engine.is_pinned(a));
    assert!(fx.engine.is_pinned(b));

    fx.send(
        "Runtime.releaseObjectGroup",
        json!({ "objectGroup": "repl" }),
    );
    assert!(!fx.engine.is_pinned(a));
    assert!(!fx.engine.is_pinned(b));
}
