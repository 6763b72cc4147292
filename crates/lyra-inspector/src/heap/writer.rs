//! Chunked `.heapsnapshot` serialization.
//!
//! The JSON is assembled into a buffer that flushes to the sink every
//! time it crosses the byte threshold, so arbitrarily large graphs
//! stream out as bounded `addHeapSnapshotChunk` payloads.

use super::{Snapshot, NODE_FIELD_COUNT};

/// Default flush threshold.
pub const DEFAULT_CHUNK_BYTES: usize = 10 * 1024;

/// Buffered writer that hands the sink chunks of at most roughly the
/// threshold size.
pub struct ChunkedWriter<'a> {
    buf: String,
    threshold: usize,
    sink: &'a mut dyn FnMut(&str),
}

impl<'a> ChunkedWriter<'a> {
    pub fn new(threshold: usize, sink: &'a mut dyn FnMut(&str)) -> Self {
        Self {
            buf: String::with_capacity(threshold.saturating_add(256).min(1 << 20)),
            threshold,
            sink,
        }
    }

    pub fn push(&mut self, s: &str) {
        self.buf.push_str(s);
        if self.buf.len() >= self.threshold {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if !self.buf.is_empty() {
            (self.sink)(&self.buf);
            self.buf.clear();
        }
    }

    /// Flush whatever remains. Must be called last.
    pub fn finish(mut self) {
        self.flush();
    }
}

const NODE_TYPE_NAMES: [&str; 15] = [
    "hidden",
    "array",
    "string",
    "object",
    "code",
    "closure",
    "regexp",
    "number",
    "native",
    "synthetic",
    "concatenated string",
    "sliced string",
    "symbol",
    "bigint",
    "object shape",
];

const EDGE_TYPE_NAMES: [&str; 7] = [
    "context",
    "element",
    "property",
    "internal",
    "hidden",
    "shortcut",
    "weak",
];

fn meta_json() -> String {
    let node_types: Vec<&str> = NODE_TYPE_NAMES.to_vec();
    let edge_types: Vec<&str> = EDGE_TYPE_NAMES.to_vec();
    serde_json::json!({
        "node_fields": ["type", "name", "id", "self_size", "edge_count", "trace_node_id"],
        "node_types": [node_types, "string", "number", "number", "number", "number"],
        "edge_fields": ["type", "name_or_index", "to_node"],
        "edge_types": [edge_types, "string_or_number", "node"],
    })
    .to_string()
}

/// Serialize the whole snapshot through a [`ChunkedWriter`].
pub fn serialize(snapshot: &Snapshot, threshold: usize, sink: &mut dyn FnMut(&str)) {
    let mut writer = ChunkedWriter::new(threshold, sink);

    writer.push("{\"snapshot\":{\"meta\":");
    writer.push(&meta_json());
    writer.push(&format!(
        ",\"node_count\":{},\"edge_count\":{},\"trace_function_count\":0}}",
        snapshot.node_count(),
        snapshot.edge_count()
    ));

    // Nodes: six ints each.
    writer.push(",\"nodes\":[");
    let mut first = true;
    for node in &snapshot.nodes {
        if !first {
            writer.push(",");
        }
        first = false;
        writer.push(&format!(
            "{},{},{},{},{},0",
            node.type_index,
            node.name_id,
            node.id,
            node.self_size,
            node.edges.len()
        ));
    }
    writer.push("]");

    // Edges: three ints each, grouped by from-node in node order; the
    // target is the byte offset of the node record.
    writer.push(",\"edges\":[");
    let mut first = true;
    for node in &snapshot.nodes {
        for edge in &node.edges {
            if !first {
                writer.push(",");
            }
            first = false;
            writer.push(&format!(
                "{},{},{}",
                edge.type_index,
                edge.name_or_index,
                edge.to_entry * NODE_FIELD_COUNT
            ));
        }
    }
    writer.push("]");

    writer.push(",\"trace_function_infos\":[],\"trace_tree\":[],\"samples\":[],\"locations\":[]");

    writer.push(",\"strings\":[");
    let mut first = true;
    for s in &snapshot.strings {
        if !first {
            writer.push(",");
        }
        first = false;
        // serde_json handles all JSON string escaping.
        writer.push(&serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into()));
    }
    writer.push("]}");

    writer.finish();
}
