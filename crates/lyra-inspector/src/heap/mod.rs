//! Heap snapshot graph builder.
//!
//! Walks the engine heap from four synthetic subroots and produces the
//! flat node/edge/string model of the `.heapsnapshot` format. Entry
//! indexes are pre-assigned on first visit and edges reference entries
//! by index, so cyclic graphs terminate; a pointer set guards each
//! visited heap thing.

pub mod writer;

use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use crate::engine::{EdgeLabel, Engine, HeapEdgeKind, HeapNodeKind, Value};

/// Node id of the artificial root.
const ROOT_ID: u64 = 1;
/// Node id of the `(GC roots)` aggregate.
const GC_ROOTS_ID: u64 = 3;
/// First synthetic subroot id; subroot `k` is `5 + 2k`.
const FIRST_SUBROOT_ID: u64 = 5;

/// Subroots, in traversal order.
const SUBROOTS: [&str; 4] = ["HandleScope", "StackRoots", "GlobalHandles", "ContextList"];

/// Ints per serialized node.
pub const NODE_FIELD_COUNT: usize = 6;
/// Ints per serialized edge.
pub const EDGE_FIELD_COUNT: usize = 3;

#[derive(Debug)]
pub struct NodeEntry {
    pub type_index: u32,
    pub name_id: u32,
    pub id: u64,
    pub self_size: u64,
    pub edges: Vec<EdgeEntry>,
}

#[derive(Debug)]
pub struct EdgeEntry {
    pub type_index: u32,
    /// String id for named edges, plain index for element edges.
    pub name_or_index: u32,
    pub to_entry: usize,
}

/// The complete in-memory graph, ready for serialization.
#[derive(Debug)]
pub struct Snapshot {
    pub nodes: Vec<NodeEntry>,
    pub strings: Vec<String>,
}

impl Snapshot {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.edges.len()).sum()
    }
}

struct Builder<'e> {
    engine: &'e mut dyn Engine,
    nodes: Vec<NodeEntry>,
    strings: Vec<String>,
    string_ids: FxHashMap<String, u32>,
    visited: FxHashMap<u64, usize>,
    next_id: u64,
    queue: VecDeque<Value>,
}

impl<'e> Builder<'e> {
    fn new(engine: &'e mut dyn Engine) -> Self {
        let mut builder = Self {
            engine,
            nodes: Vec::new(),
            strings: Vec::new(),
            string_ids: FxHashMap::default(),
            visited: FxHashMap::default(),
            next_id: FIRST_SUBROOT_ID + 2 * SUBROOTS.len() as u64,
            queue: VecDeque::new(),
        };
        // The first string slot is reserved.
        builder.intern("<dummy>");
        builder
    }

    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.string_ids.get(s) {
            return id;
        }
        let id = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.string_ids.insert(s.to_string(), id);
        id
    }

    fn push_synthetic(&mut self, name: &str, id: u64) -> usize {
        let name_id = self.intern(name);
        self.nodes.push(NodeEntry {
            type_index: HeapNodeKind::Synthetic.type_index(),
            name_id,
            id,
            self_size: 0,
            edges: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Entry index for a heap value, creating the node on first visit
    /// and queueing its children.
    fn visit(&mut self, value: Value) -> usize {
        if let Some(&entry) = self.visited.get(&value.addr()) {
            return entry;
        }
        let info = self.engine.heap_node(value);
        let name_id = self.intern(&info.name);
        let id = self.next_id;
        self.next_id += 2;
        self.nodes.push(NodeEntry {
            type_index: info.kind.type_index(),
            name_id,
            id,
            self_size: info.self_size,
            edges: Vec::new(),
        });
        let entry = self.nodes.len() - 1;
        self.visited.insert(value.addr(), entry);
        self.queue.push_back(value);
        entry
    }

    fn drain(&mut self) {
        while let Some(value) = self.queue.pop_front() {
            let from = self.visited[&value.addr()];
            for child in self.engine.heap_children(value) {
                let to_entry = self.visit(child.to);
                let name_or_index = match &child.label {
                    EdgeLabel::Name(name) => self.intern(name),
                    EdgeLabel::Index(index) => *index,
                };
                self.nodes[from].edges.push(EdgeEntry {
                    type_index: child.kind.type_index(),
                    name_or_index,
                    to_entry,
                });
            }
        }
    }
}

/// Build the full graph. The caller owns GC suppression for the
/// duration.
pub fn build_snapshot(engine: &mut dyn Engine) -> Snapshot {
    let roots = engine.heap_roots();
    let mut builder = Builder::new(engine);

    let root_entry = builder.push_synthetic("", ROOT_ID);
    let gc_roots_entry = builder.push_synthetic("(GC roots)", GC_ROOTS_ID);
    let element_kind = HeapEdgeKind::Element.type_index();
    builder.nodes[root_entry].edges.push(EdgeEntry {
        type_index: element_kind,
        name_or_index: 0,
        to_entry: gc_roots_entry,
    });

    let slot_groups = [
        roots.handle_scope,
        roots.stack,
        roots.global_handles,
        roots.contexts,
    ];
    for (k, (name, slots)) in SUBROOTS.iter().zip(slot_groups).enumerate() {
        let subroot_id = FIRST_SUBROOT_ID + 2 * k as u64;
        let subroot_entry = builder.push_synthetic(name, subroot_id);
        let shortcut_name = builder.intern(name);
        builder.nodes[gc_roots_entry].edges.push(EdgeEntry {
            type_index: HeapEdgeKind::Shortcut.type_index(),
            name_or_index: shortcut_name,
            to_entry: subroot_entry,
        });
        for (slot_index, slot) in slots.into_iter().enumerate() {
            let to_entry = builder.visit(slot);
            let label = builder.intern(&slot_index.to_string());
            builder.nodes[subroot_entry].edges.push(EdgeEntry {
                type_index: HeapEdgeKind::Internal.type_index(),
                name_or_index: label,
                to_entry,
            });
        }
        builder.drain();
    }

    Snapshot {
        nodes: builder.nodes,
        strings: builder.strings,
    }
}
