//! Mirror registry: stable object ids and pinned engine values.
//!
//! Live mirrors use the heap pointer stringified in decimal as their
//! object id; synthetic scope mirrors use `"scope:"` followed by
//! `frame_index * MAX_SCOPE_NESTING + scope_kind`. Registered values
//! are pinned in the engine so a moving collector cannot invalidate
//! the id; pause-scoped pins are released atomically on resume.

pub mod remote_object;
pub mod scope;

use rustc_hash::FxHashMap;

use crate::engine::{Engine, Value};

/// Maximum scope-chain nesting encodable in a scope object id.
pub const MAX_SCOPE_NESTING: u32 = 20;

/// Scope kind component of a scope object id.
pub const SCOPE_KIND_GLOBAL: u32 = 0;
pub const SCOPE_KIND_LOCAL: u32 = 1;
/// Closure hop `k` is encoded as `2 + k`.
pub const SCOPE_KIND_CLOSURE_BASE: u32 = 2;

/// Lifetime of a mirror pin.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PinScope {
    /// Released when the current pause ends.
    Pause,
    /// Held until explicitly released.
    Running,
}

/// Parsed form of an object id string.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjectId {
    /// Decimal heap pointer of a live mirror.
    Address(u64),
    /// Synthetic scope mirror.
    Scope { frame: u32, kind: u32 },
}

impl ObjectId {
    /// Recover whichever form was encoded.
    pub fn parse(id: &str) -> Option<ObjectId> {
        if let Some(rest) = id.strip_prefix("scope:") {
            let encoded: u32 = rest.parse().ok()?;
            return Some(ObjectId::Scope {
                frame: encoded / MAX_SCOPE_NESTING,
                kind: encoded % MAX_SCOPE_NESTING,
            });
        }
        id.parse::<u64>().ok().map(ObjectId::Address)
    }

    /// Encode a scope id for `(frame, kind)`.
    pub fn scope_id(frame: u32, kind: u32) -> String {
        format!("scope:{}", frame * MAX_SCOPE_NESTING + kind)
    }
}

#[derive(Debug, Default)]
pub struct MirrorRegistry {
    pause_pins: FxHashMap<u64, Value>,
    running_pins: FxHashMap<u64, Value>,
    groups: FxHashMap<String, Vec<u64>>,
}

impl MirrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `value` and return its object id.
    pub fn register(
        &mut self,
        engine: &mut dyn Engine,
        value: Value,
        scope: PinScope,
        group: Option<&str>,
    ) -> String {
        let addr = value.addr();
        let pins = match scope {
            PinScope::Pause => &mut self.pause_pins,
            PinScope::Running => &mut self.running_pins,
        };
        if pins.insert(addr, value).is_none() {
            engine.pin(value);
        }
        if let Some(group) = group {
            self.groups.entry(group.to_string()).or_default().push(addr);
        }
        addr.to_string()
    }

    /// The pinned value behind an address id, from either pin scope.
    pub fn resolve(&self, addr: u64) -> Option<Value> {
        self.pause_pins
            .get(&addr)
            .or_else(|| self.running_pins.get(&addr))
            .copied()
    }

    /// Release every pause-scoped pin. Called on resume and step.
    pub fn release_pause_scope(&mut self, engine: &mut dyn Engine) {
        for (addr, value) in std::mem::take(&mut self.pause_pins) {
            if !self.running_pins.contains_key(&addr) {
                engine.unpin(value);
            }
        }
    }

    /// Release one mirror (`Runtime.releaseObject`).
    pub fn release(&mut self, engine: &mut dyn Engine, addr: u64) {
        let in_pause = self.pause_pins.remove(&addr);
        let in_running = self.running_pins.remove(&addr);
        if let Some(value) = in_pause.or(in_running) {
            engine.unpin(value);
        }
    }

    /// Release every mirror registered under an object group.
    pub fn release_group(&mut self, engine: &mut dyn Engine, group: &str) {
        if let Some(addrs) = self.groups.remove(group) {
            for addr in addrs {
                self.release(engine, addr);
            }
        }
    }

    pub fn pause_pin_count(&self) -> usize {
        self.pause_pins.len()
    }
}
