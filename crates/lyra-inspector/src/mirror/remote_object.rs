//! RemoteObject builder.
//!
//! Projects an engine value into the CDP mirror model. Object subtypes
//! are chosen by a classifier applied in a fixed priority order; adding
//! a subtype is one entry in that table.

use lyra_protocol::types::{
    EntryPreview, InternalPropertyDescriptor, ObjectPreview, PropertyPreview, RemoteObject,
};
use serde_json::json;
use serde_json::Value as JsonValue;

use crate::engine::{Engine, ObjectInfo, ObjectTraits, Value, ValueInfo};
use crate::mirror::{MirrorRegistry, PinScope};

/// Own-property cap for previews.
pub const PREVIEW_PROPERTY_CAP: usize = 10;
/// Map/Set entry cap for previews.
pub const PREVIEW_ENTRY_CAP: usize = 5;

/// Classifier table: first matching trait wins.
const SUBTYPE_ORDER: &[(ObjectTraits, &str)] = &[
    (ObjectTraits::ARRAY, "array"),
    (ObjectTraits::PROXY, "proxy"),
    (ObjectTraits::TYPED_ARRAY, "typedarray"),
    (ObjectTraits::ERROR, "error"),
    (ObjectTraits::DATA_VIEW, "dataview"),
    (ObjectTraits::DATE, "date"),
    (ObjectTraits::MAP, "map"),
    (ObjectTraits::SET, "set"),
    (ObjectTraits::WEAK_MAP, "weakmap"),
    (ObjectTraits::WEAK_SET, "weakset"),
    (ObjectTraits::GENERATOR, "generator"),
    (ObjectTraits::PROMISE, "promise"),
    (ObjectTraits::REGEXP, "regexp"),
    (ObjectTraits::ARRAY_BUFFER, "arraybuffer"),
];

/// Subtype of an object value, or `None` for a plain object.
pub fn classify(traits: ObjectTraits) -> Option<&'static str> {
    SUBTYPE_ORDER
        .iter()
        .find(|(flag, _)| traits.contains(*flag))
        .map(|(_, name)| *name)
}

/// How a mirror should be built.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub generate_preview: bool,
    pub return_by_value: bool,
    pub pin_scope: PinScope,
    pub object_group: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            generate_preview: false,
            return_by_value: false,
            pin_scope: PinScope::Pause,
            object_group: None,
        }
    }
}

/// Build the mirror for `value`.
pub fn build(
    engine: &mut dyn Engine,
    mirrors: &mut MirrorRegistry,
    value: Value,
    opts: &BuildOptions,
) -> RemoteObject {
    match engine.describe(value) {
        ValueInfo::Undefined => RemoteObject::of_kind("undefined"),
        ValueInfo::Null => RemoteObject {
            kind: "object".into(),
            subtype: Some("null".into()),
            value: Some(JsonValue::Null),
            ..Default::default()
        },
        ValueInfo::Bool(b) => RemoteObject {
            kind: "boolean".into(),
            value: Some(JsonValue::Bool(b)),
            ..Default::default()
        },
        ValueInfo::Number(n) => build_number(n),
        ValueInfo::BigInt(digits) => RemoteObject {
            kind: "bigint".into(),
            description: Some(format!("{}n", digits)),
            value: Some(JsonValue::String(digits)),
            ..Default::default()
        },
        ValueInfo::String(s) => RemoteObject {
            kind: "string".into(),
            value: Some(JsonValue::String(s)),
            ..Default::default()
        },
        ValueInfo::Symbol(desc) => {
            let description = format!("Symbol({})", desc.as_deref().unwrap_or(""));
            let object_id =
                mirrors.register(engine, value, opts.pin_scope, opts.object_group.as_deref());
            RemoteObject {
                kind: "symbol".into(),
                description: Some(description),
                object_id: Some(object_id),
                ..Default::default()
            }
        }
        ValueInfo::Function(info) => {
            let class_name = if info.is_generator {
                "GeneratorFunction"
            } else if info.is_async {
                "AsyncFunction"
            } else {
                "Function"
            };
            let description = engine.to_display_string(value);
            let object_id =
                mirrors.register(engine, value, opts.pin_scope, opts.object_group.as_deref());
            RemoteObject {
                kind: "function".into(),
                class_name: Some(class_name.into()),
                description: Some(description),
                object_id: Some(object_id),
                ..Default::default()
            }
        }
        ValueInfo::Object(info) => build_object(engine, mirrors, value, &info, opts),
    }
}

fn build_number(n: f64) -> RemoteObject {
    let description = render_number(n);
    if n.is_finite() {
        RemoteObject {
            kind: "number".into(),
            description: Some(description),
            value: Some(json!(n)),
            ..Default::default()
        }
    } else {
        // NaN and infinities have no JSON form.
        RemoteObject {
            kind: "number".into(),
            unserializable_value: Some(description.clone()),
            description: Some(description),
            ..Default::default()
        }
    }
}

fn render_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn build_object(
    engine: &mut dyn Engine,
    mirrors: &mut MirrorRegistry,
    value: Value,
    info: &ObjectInfo,
    opts: &BuildOptions,
) -> RemoteObject {
    let subtype = classify(info.traits);
    let description = describe_object(engine, value, info, subtype);

    if opts.return_by_value {
        return match engine.serialize_json(value) {
            Ok(json) => RemoteObject {
                kind: "object".into(),
                subtype: subtype.map(String::from),
                class_name: Some(info.class_name.clone()),
                value: Some(json),
                ..Default::default()
            },
            Err(_) => RemoteObject {
                kind: "object".into(),
                subtype: subtype.map(String::from),
                class_name: Some(info.class_name.clone()),
                description: Some(description),
                ..Default::default()
            },
        };
    }

    let object_id = mirrors.register(engine, value, opts.pin_scope, opts.object_group.as_deref());
    let preview = if opts.generate_preview {
        Some(build_preview(engine, value, info, subtype, &description))
    } else {
        None
    };
    RemoteObject {
        kind: "object".into(),
        subtype: subtype.map(String::from),
        class_name: Some(info.class_name.clone()),
        description: Some(description),
        object_id: Some(object_id),
        preview,
        ..Default::default()
    }
}

fn describe_object(
    engine: &mut dyn Engine,
    value: Value,
    info: &ObjectInfo,
    subtype: Option<&'static str>,
) -> String {
    let size = info.size.unwrap_or(0);
    match subtype {
        Some("array") => format!("Array({})", size),
        Some("typedarray") => format!("{}({})", info.class_name, size),
        Some("arraybuffer") => format!("ArrayBuffer({})", size),
        Some("dataview") => format!("DataView({})", size),
        Some("map") | Some("set") | Some("weakmap") | Some("weakset") => {
            format!("{}({})", info.class_name, size)
        }
        Some("date") | Some("regexp") | Some("error") => engine.to_display_string(value),
        Some("proxy") => "Proxy".into(),
        Some("promise") => "Promise".into(),
        _ => info.class_name.clone(),
    }
}

/// Short one-line rendering of a property value for previews.
fn render_short(engine: &mut dyn Engine, value: Value) -> (String, String, Option<String>) {
    // Returns (type, rendered value, subtype).
    match engine.describe(value) {
        ValueInfo::Undefined => ("undefined".into(), "undefined".into(), None),
        ValueInfo::Null => ("object".into(), "null".into(), Some("null".into())),
        ValueInfo::Bool(b) => ("boolean".into(), b.to_string(), None),
        ValueInfo::Number(n) => ("number".into(), render_number(n), None),
        ValueInfo::BigInt(d) => ("bigint".into(), format!("{}n", d), None),
        ValueInfo::String(s) => ("string".into(), s, None),
        ValueInfo::Symbol(desc) => (
            "symbol".into(),
            format!("Symbol({})", desc.as_deref().unwrap_or("")),
            None,
        ),
        ValueInfo::Function(_) => ("function".into(), String::new(), None),
        ValueInfo::Object(info) => {
            let subtype = classify(info.traits);
            let rendered = describe_object(engine, value, &info, subtype);
            ("object".into(), rendered, subtype.map(String::from))
        }
    }
}

fn build_preview(
    engine: &mut dyn Engine,
    value: Value,
    info: &ObjectInfo,
    subtype: Option<&'static str>,
    description: &str,
) -> ObjectPreview {
    let mut properties = Vec::new();
    let mut overflow = false;

    if subtype == Some("error") {
        // Errors preview only their message and stack.
        for slot in engine.own_properties(value) {
            if slot.name != "message" && slot.name != "stack" {
                continue;
            }
            if let Ok(v) = slot.value {
                let (kind, rendered, sub) = render_short(engine, v);
                properties.push(PropertyPreview {
                    name: slot.name,
                    kind,
                    value: Some(rendered),
                    subtype: sub,
                });
            }
        }
    } else {
        for slot in engine.own_properties(value) {
            if !slot.enumerable {
                continue;
            }
            if properties.len() >= PREVIEW_PROPERTY_CAP {
                overflow = true;
                break;
            }
            match slot.value {
                Ok(v) => {
                    let (kind, rendered, sub) = render_short(engine, v);
                    properties.push(PropertyPreview {
                        name: slot.name,
                        kind,
                        value: Some(rendered),
                        subtype: sub,
                    });
                }
                Err(_) => properties.push(PropertyPreview {
                    name: slot.name,
                    kind: "accessor".into(),
                    value: None,
                    subtype: None,
                }),
            }
        }
    }

    let entries = if matches!(subtype, Some("map") | Some("set")) {
        let mut entries = Vec::new();
        for entry in engine.container_entries(value, PREVIEW_ENTRY_CAP) {
            let key = entry.key.map(|k| value_preview(engine, k));
            entries.push(EntryPreview {
                key,
                value: value_preview(engine, entry.value),
            });
        }
        Some(entries)
    } else {
        None
    };

    ObjectPreview {
        kind: "object".into(),
        subtype: subtype.map(String::from),
        description: Some(description.to_string()),
        overflow,
        properties,
        entries,
    }
}

/// Minimal preview of a single value (Map/Set entry halves).
fn value_preview(engine: &mut dyn Engine, value: Value) -> ObjectPreview {
    let (kind, rendered, subtype) = render_short(engine, value);
    ObjectPreview {
        kind,
        subtype,
        description: Some(rendered),
        overflow: false,
        properties: Vec::new(),
        entries: None,
    }
}

/// The `[[Slot]]` bucket for `Runtime.getProperties`.
pub fn internal_properties(
    engine: &mut dyn Engine,
    mirrors: &mut MirrorRegistry,
    value: Value,
    opts: &BuildOptions,
) -> Vec<InternalPropertyDescriptor> {
    let mut slots = Vec::new();
    match engine.describe(value) {
        ValueInfo::Function(info) => {
            if let Some(location) = info.location {
                slots.push(InternalPropertyDescriptor {
                    name: "[[FunctionLocation]]".into(),
                    value: Some(location_mirror(
                        location.script_id,
                        location.line,
                        location.column,
                    )),
                });
            }
        }
        ValueInfo::Object(info) => {
            if info.traits.contains(ObjectTraits::GENERATOR) {
                if let Some(state) = engine.generator_state(value) {
                    slots.push(InternalPropertyDescriptor {
                        name: "[[GeneratorState]]".into(),
                        value: Some(string_mirror(state.as_str())),
                    });
                }
                if let Some(function) = engine.generator_function(value) {
                    slots.push(InternalPropertyDescriptor {
                        name: "[[GeneratorFunction]]".into(),
                        value: Some(build(engine, mirrors, function, opts)),
                    });
                    if let ValueInfo::Function(f) = engine.describe(function) {
                        if let Some(location) = f.location {
                            slots.push(InternalPropertyDescriptor {
                                name: "[[GeneratorLocation]]".into(),
                                value: Some(location_mirror(
                                    location.script_id,
                                    location.line,
                                    location.column,
                                )),
                            });
                        }
                    }
                }
            }
            if info.traits.contains(ObjectTraits::PROXY) {
                if let Some(parts) = engine.proxy_parts(value) {
                    slots.push(InternalPropertyDescriptor {
                        name: "[[Handler]]".into(),
                        value: Some(build(engine, mirrors, parts.handler, opts)),
                    });
                    slots.push(InternalPropertyDescriptor {
                        name: "[[Target]]".into(),
                        value: Some(build(engine, mirrors, parts.target, opts)),
                    });
                    slots.push(InternalPropertyDescriptor {
                        name: "[[IsRevoked]]".into(),
                        value: Some(RemoteObject {
                            kind: "boolean".into(),
                            value: Some(JsonValue::Bool(parts.is_revoked)),
                            ..Default::default()
                        }),
                    });
                }
            }
            if info.traits.contains(ObjectTraits::PROMISE) {
                if let Some(parts) = engine.promise_parts(value) {
                    slots.push(InternalPropertyDescriptor {
                        name: "[[PromiseState]]".into(),
                        value: Some(string_mirror(parts.state)),
                    });
                    let result = parts.result.unwrap_or_else(|| engine.undefined());
                    slots.push(InternalPropertyDescriptor {
                        name: "[[PromiseResult]]".into(),
                        value: Some(build(engine, mirrors, result, opts)),
                    });
                }
            }
        }
        _ => {}
    }
    slots
}

fn string_mirror(s: &str) -> RemoteObject {
    RemoteObject {
        kind: "string".into(),
        value: Some(JsonValue::String(s.to_string())),
        ..Default::default()
    }
}

fn location_mirror(script_id: u32, line: u32, column: u32) -> RemoteObject {
    RemoteObject {
        kind: "object".into(),
        subtype: Some("internal#location".into()),
        description: Some("Object".into()),
        value: Some(json!({
            "scriptId": script_id.to_string(),
            "lineNumber": line,
            "columnNumber": column,
        })),
        ..Default::default()
    }
}
