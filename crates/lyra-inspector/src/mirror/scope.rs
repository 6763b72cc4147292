//! Scope reifier.
//!
//! Frame locals, closure var tables, and the global record are exposed
//! as synthetic mirror objects addressable by `scope:N` ids, where
//! `N = frame_index * MAX_SCOPE_NESTING + scope_kind`.

use lyra_protocol::types::{RemoteObject, Scope};

use crate::engine::{Engine, Value};
use crate::mirror::{
    ObjectId, MAX_SCOPE_NESTING, SCOPE_KIND_CLOSURE_BASE, SCOPE_KIND_GLOBAL, SCOPE_KIND_LOCAL,
};

fn scope_mirror(frame: u32, kind: u32, description: &str) -> RemoteObject {
    RemoteObject {
        kind: "object".into(),
        class_name: Some("Object".into()),
        description: Some(description.to_string()),
        object_id: Some(ObjectId::scope_id(frame, kind)),
        ..Default::default()
    }
}

/// Scope chain for one call frame: local, enclosing closures, global.
pub fn scope_chain(frame: u32, closure_depth: u32) -> Vec<Scope> {
    let mut chain = vec![Scope {
        kind: "local".into(),
        object: scope_mirror(frame, SCOPE_KIND_LOCAL, "Local"),
        name: None,
    }];
    let hops = closure_depth.min(MAX_SCOPE_NESTING - SCOPE_KIND_CLOSURE_BASE - 1);
    for hop in 0..hops {
        chain.push(Scope {
            kind: "closure".into(),
            object: scope_mirror(frame, SCOPE_KIND_CLOSURE_BASE + hop, "Closure"),
            name: None,
        });
    }
    chain.push(Scope {
        kind: "global".into(),
        object: scope_mirror(frame, SCOPE_KIND_GLOBAL, "Global"),
        name: None,
    });
    chain
}

/// Enumerate the bindings behind a parsed scope id.
pub fn scope_bindings(engine: &mut dyn Engine, frame: u32, kind: u32) -> Vec<(String, Value)> {
    match kind {
        SCOPE_KIND_GLOBAL => {
            let mut bindings = engine.global_lexical_bindings();
            let global = engine.global_object();
            for slot in engine.own_properties(global) {
                if !slot.enumerable {
                    continue;
                }
                if let Ok(value) = slot.value {
                    bindings.push((slot.name, value));
                }
            }
            bindings
        }
        SCOPE_KIND_LOCAL => engine.frame_locals(frame),
        _ => engine.frame_closure_vars(frame, kind - SCOPE_KIND_CLOSURE_BASE),
    }
}
