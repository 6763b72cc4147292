//! Breakpoint store.
//!
//! Canonical set of breakpoints plus the per-pc active map the tick
//! hook consults. Two-level bookkeeping: the id-keyed registry holds
//! the full records, the pc map is the fast path. Both are kept in
//! sync by every mutation.

use rustc_hash::FxHashMap;

use crate::debugger::location;
use crate::engine::{BytecodeRef, Engine, PcRef};
use crate::scripts::{Script, ScriptRegistry};

/// How a breakpoint names its script. The locator is also the trailing
/// component of the canonical id string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Url(String),
    Hash(String),
    ScriptId(u32),
}

impl Locator {
    fn id_component(&self) -> String {
        match self {
            Locator::Url(url) => url.clone(),
            Locator::Hash(hash) => hash.clone(),
            Locator::ScriptId(id) => id.to_string(),
        }
    }

    fn matches(&self, script: &Script) -> bool {
        match self {
            Locator::Url(url) => !url.is_empty() && script.url == *url,
            Locator::Hash(hash) => script.hash == *hash,
            Locator::ScriptId(id) => script.id == *id,
        }
    }
}

/// Where a breakpoint actually landed after adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub pc: PcRef,
    pub script_id: u32,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub id: String,
    pub locator: Locator,
    pub line: u32,
    /// −1 means any column.
    pub column: i64,
    pub condition: Option<String>,
    pub resolved: Option<ResolvedLocation>,
    /// Removed on next hit (`continueToLocation`).
    pub transient: bool,
}

/// Canonical breakpoint id: `"1:L:C:LOC"`.
pub fn canonical_id(line: u32, column: i64, locator: &Locator) -> String {
    format!("1:{}:{}:{}", line, column, locator.id_component())
}

#[derive(Debug, Default)]
pub struct BreakpointStore {
    by_id: FxHashMap<String, Breakpoint>,
    active_pc: FxHashMap<PcRef, String>,
    attached: FxHashMap<BytecodeRef, u32>,
}

impl BreakpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a breakpoint. Re-adding an identical
    /// `(locator, line, column, condition)` returns the existing record
    /// without duplication. The breakpoint is retained unresolved when
    /// no script or location matches yet.
    pub fn set(
        &mut self,
        engine: &dyn Engine,
        scripts: &ScriptRegistry,
        locator: Locator,
        line: u32,
        column: i64,
        condition: Option<String>,
        transient: bool,
    ) -> (String, Option<ResolvedLocation>) {
        let id = canonical_id(line, column, &locator);
        if let Some(existing) = self.by_id.get(&id) {
            if existing.condition == condition {
                return (id, existing.resolved);
            }
        }

        let mut breakpoint = Breakpoint {
            id: id.clone(),
            locator,
            line,
            column,
            condition,
            resolved: None,
            transient,
        };
        if let Some(script) = self.find_script(scripts, &breakpoint.locator) {
            if let Some(resolved) = adjust(engine, script, line, column) {
                self.install(&id, resolved);
                breakpoint.resolved = Some(resolved);
            }
        }
        let resolved = breakpoint.resolved;
        self.by_id.insert(id.clone(), breakpoint);
        (id, resolved)
    }

    /// Remove a breakpoint and its pc mapping.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.by_id.remove(id) {
            Some(breakpoint) => {
                if let Some(resolved) = breakpoint.resolved {
                    self.uninstall(resolved);
                }
                true
            }
            None => false,
        }
    }

    /// The breakpoint mapped at `pc`, if any.
    pub fn hit(&self, pc: PcRef) -> Option<&Breakpoint> {
        let id = self.active_pc.get(&pc)?;
        self.by_id.get(id)
    }

    /// Re-try resolution of unresolved breakpoints against a newly
    /// parsed script. Returns the ids that resolved.
    pub fn resolve_pending(&mut self, engine: &dyn Engine, script: &Script) -> Vec<String> {
        let pending: Vec<String> = self
            .by_id
            .values()
            .filter(|b| b.resolved.is_none() && b.locator.matches(script))
            .map(|b| b.id.clone())
            .collect();
        let mut resolved_ids = Vec::new();
        for id in pending {
            let (line, column) = {
                let b = &self.by_id[&id];
                (b.line, b.column)
            };
            if let Some(resolved) = adjust(engine, script, line, column) {
                self.install(&id, resolved);
                if let Some(b) = self.by_id.get_mut(&id) {
                    b.resolved = Some(resolved);
                }
                resolved_ids.push(id);
            }
        }
        resolved_ids
    }

    /// Drop every mapping into a script that is being unregistered.
    pub fn unresolve_script(&mut self, script_id: u32) {
        let affected: Vec<String> = self
            .by_id
            .values()
            .filter(|b| matches!(b.resolved, Some(r) if r.script_id == script_id))
            .map(|b| b.id.clone())
            .collect();
        for id in affected {
            if let Some(b) = self.by_id.get_mut(&id) {
                if let Some(resolved) = b.resolved.take() {
                    let pc = resolved.pc;
                    let bytecode = pc.bytecode;
                    self.active_pc.remove(&pc);
                    decrement(&mut self.attached, bytecode);
                }
            }
        }
    }

    /// Number of breakpoints attached to one function bytecode.
    pub fn attached_count(&self, bytecode: BytecodeRef) -> u32 {
        self.attached.get(&bytecode).copied().unwrap_or(0)
    }

    pub fn get(&self, id: &str) -> Option<&Breakpoint> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn active_pc_map(&self) -> &FxHashMap<PcRef, String> {
        &self.active_pc
    }

    fn find_script<'a>(&self, scripts: &'a ScriptRegistry, locator: &Locator) -> Option<&'a Script> {
        match locator {
            Locator::Url(url) => scripts.find_by_url(url),
            Locator::Hash(hash) => scripts.find_by_hash(hash),
            Locator::ScriptId(id) => scripts.get(*id),
        }
    }

    fn install(&mut self, id: &str, resolved: ResolvedLocation) {
        self.active_pc.insert(resolved.pc, id.to_string());
        *self.attached.entry(resolved.pc.bytecode).or_insert(0) += 1;
    }

    fn uninstall(&mut self, resolved: ResolvedLocation) {
        self.active_pc.remove(&resolved.pc);
        decrement(&mut self.attached, resolved.pc.bytecode);
    }
}

fn decrement(attached: &mut FxHashMap<BytecodeRef, u32>, bytecode: BytecodeRef) {
    if let Some(count) = attached.get_mut(&bytecode) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            attached.remove(&bytecode);
        }
    }
}

/// Adjustment: for each function bytecode of the script, the smallest
/// `(line, column)` at or after the request that does not precede the
/// function's own start; smaller line wins, then smaller column.
fn adjust(engine: &dyn Engine, script: &Script, line: u32, column: i64) -> Option<ResolvedLocation> {
    let wanted_column = if column < 0 { 0 } else { column as u32 };
    let mut best: Option<ResolvedLocation> = None;
    for bytecode in engine.script_bytecodes(script.id) {
        let Some(info) = engine.bytecode_info(bytecode) else {
            continue;
        };
        if let Some(point) = location::nearest_candidate(&info, line, wanted_column) {
            let candidate = ResolvedLocation {
                pc: PcRef {
                    bytecode,
                    pc: point.pc,
                },
                script_id: script.id,
                line: point.line,
                column: point.column,
            };
            match best {
                Some(b) if (b.line, b.column) <= (candidate.line, candidate.column) => {}
                _ => best = Some(candidate),
            }
        }
    }
    best
}
