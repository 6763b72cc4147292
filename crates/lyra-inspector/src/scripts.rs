//! Script registry.
//!
//! In-memory catalog of compiled top-level programs, fed by the
//! engine's parse hook. Records are append-only except for explicit
//! unregistration by url; ids are unique for the runtime's lifetime.

use rustc_hash::FxHashMap;

/// One compiled script known to the inspector.
#[derive(Debug, Clone)]
pub struct Script {
    pub id: u32,
    /// May be empty for anonymous programs.
    pub url: String,
    /// Deterministic in `(source, id)`.
    pub hash: String,
    pub source: String,
    pub end_line: u32,
    pub source_map_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct ScriptRegistry {
    by_id: FxHashMap<u32, Script>,
    next_id: u32,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly compiled script. A `//# sourceURL=`
    /// annotation overrides `filename`; a script whose url is already
    /// registered is deduplicated and the existing id returned with
    /// `false` so the caller can skip re-announcing it.
    pub fn register(&mut self, source: &str, filename: &str, end_line: u32) -> (u32, bool) {
        let url = extract_annotation(source, "sourceURL").unwrap_or_else(|| filename.to_string());
        if !url.is_empty() {
            if let Some(existing) = self.find_by_url(&url) {
                return (existing.id, false);
            }
        }
        self.next_id += 1;
        let id = self.next_id;
        let script = Script {
            id,
            hash: hash_source(source, id),
            source_map_url: extract_annotation(source, "sourceMappingURL"),
            url,
            source: source.to_string(),
            end_line,
        };
        self.by_id.insert(id, script);
        (id, true)
    }

    /// Whether `id` names a live record. A freshly registered id is
    /// removed again when the engine reported a parse error.
    pub fn unregister(&mut self, id: u32) -> bool {
        self.by_id.remove(&id).is_some()
    }

    /// Drop the record for `url`, if any.
    pub fn unregister_by_url(&mut self, url: &str) -> bool {
        let id = self.find_by_url(url).map(|s| s.id);
        match id {
            Some(id) => self.by_id.remove(&id).is_some(),
            None => false,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Script> {
        self.by_id.get(&id)
    }

    pub fn find_by_url(&self, url: &str) -> Option<&Script> {
        self.by_id.values().find(|s| s.url == url)
    }

    pub fn find_by_hash(&self, hash: &str) -> Option<&Script> {
        self.by_id.values().find(|s| s.hash == hash)
    }

    /// All records in id order (stable fan-out for back-fill).
    pub fn iter_ordered(&self) -> Vec<&Script> {
        let mut scripts: Vec<&Script> = self.by_id.values().collect();
        scripts.sort_by_key(|s| s.id);
        scripts
    }
}

/// Content hash: `fold(src, 31) * 31 + id`, stringified in decimal.
pub fn hash_source(source: &str, id: u32) -> String {
    let folded = source
        .bytes()
        .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)));
    folded
        .wrapping_mul(31)
        .wrapping_add(u64::from(id))
        .to_string()
}

/// Extract a `//# key=value` annotation (last occurrence wins, matching
/// how engines treat trailing annotations).
fn extract_annotation(source: &str, key: &str) -> Option<String> {
    let mut found = None;
    for line in source.lines() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed
            .strip_prefix("//#")
            .or_else(|| trimmed.strip_prefix("//@"))
        else {
            continue;
        };
        let rest = rest.trim_start();
        if let Some(value) = rest.strip_prefix(key) {
            if let Some(value) = value.trim_start().strip_prefix('=') {
                let value = value.trim();
                if !value.is_empty() {
                    found = Some(value.to_string());
                }
            }
        }
    }
    found
}
