//! Console capture.
//!
//! Each console call is recorded into an in-memory log for the
//! runtime's lifetime and, when the Runtime domain is enabled,
//! re-emitted as `Runtime.consoleAPICalled`. A first argument of the
//! form `"runtimeId:N"`, `"groupId:N"`, or `"lepusRuntimeId:N"` tags
//! the entry with the embedder's routing id.

use lyra_protocol::types::StackTrace;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::Value;

/// One captured console call.
#[derive(Debug, Clone)]
pub struct ConsoleEntry {
    /// `log`, `info`, `debug`, `error`, `warning`, `timeEnd`.
    pub tag: String,
    pub args: Vec<Value>,
    pub timestamp_ms: f64,
    pub stack: StackTrace,
    pub runtime_id: Option<i64>,
    pub group_id: Option<i64>,
}

/// Routing id extracted from a tagging first argument.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RoutingTag {
    Runtime(i64),
    Group(i64),
}

/// Parse an embedder routing tag. Only exact prefix matches count; the
/// prefixes are fixed by the protocol peers.
pub fn parse_routing_tag(first_arg: &str) -> Option<RoutingTag> {
    for (prefix, is_group) in [
        ("runtimeId:", false),
        ("groupId:", true),
        ("lepusRuntimeId:", false),
    ] {
        if let Some(rest) = first_arg.strip_prefix(prefix) {
            let id: i64 = rest.trim().parse().ok()?;
            return Some(if is_group {
                RoutingTag::Group(id)
            } else {
                RoutingTag::Runtime(id)
            });
        }
    }
    None
}

/// Wall-clock milliseconds for event timestamps.
pub fn timestamp_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Unbounded per-runtime console log.
#[derive(Debug, Default)]
pub struct ConsoleLog {
    entries: Vec<ConsoleEntry>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ConsoleEntry) {
        self.entries.push(entry);
    }

    /// `Runtime.discardConsoleEntries`.
    pub fn discard(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ConsoleEntry] {
        &self.entries
    }
}
