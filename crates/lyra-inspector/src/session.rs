//! Session controller.
//!
//! Tracks zero or more front-end views, each with its own per-domain
//! enable bits and paused flag. Single-session hosts use the default
//! view (`view_id == None`); multi-view hosts address sessions by the
//! `view_id` carried on each frame.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Domain {
    Debugger,
    Runtime,
    Profiler,
    HeapProfiler,
}

impl Domain {
    /// Parse the domain component of a method name.
    pub fn parse(domain: &str) -> Option<Domain> {
        match domain {
            "Debugger" => Some(Domain::Debugger),
            "Runtime" => Some(Domain::Runtime),
            "Profiler" => Some(Domain::Profiler),
            "HeapProfiler" => Some(Domain::HeapProfiler),
            _ => None,
        }
    }
}

/// Per-domain enable bits of one session.
#[derive(Debug, Copy, Clone, Default)]
pub struct DomainSet {
    pub debugger: bool,
    pub runtime: bool,
    pub profiler: bool,
    pub heap_profiler: bool,
}

impl DomainSet {
    pub fn get(&self, domain: Domain) -> bool {
        match domain {
            Domain::Debugger => self.debugger,
            Domain::Runtime => self.runtime,
            Domain::Profiler => self.profiler,
            Domain::HeapProfiler => self.heap_profiler,
        }
    }

    pub fn set(&mut self, domain: Domain, enabled: bool) {
        match domain {
            Domain::Debugger => self.debugger = enabled,
            Domain::Runtime => self.runtime = enabled,
            Domain::Profiler => self.profiler = enabled,
            Domain::HeapProfiler => self.heap_profiler = enabled,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub view_id: Option<u32>,
    pub enables: DomainSet,
    pub paused: bool,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for a view, created lazily on first contact.
    pub fn get_or_insert(&mut self, view_id: Option<u32>) -> &mut Session {
        let index = match self.sessions.iter().position(|s| s.view_id == view_id) {
            Some(index) => index,
            None => {
                self.sessions.push(Session {
                    view_id,
                    enables: DomainSet::default(),
                    paused: false,
                });
                self.sessions.len() - 1
            }
        };
        &mut self.sessions[index]
    }

    pub fn is_enabled(&self, view_id: Option<u32>, domain: Domain) -> bool {
        self.sessions
            .iter()
            .find(|s| s.view_id == view_id)
            .map(|s| s.enables.get(domain))
            .unwrap_or(false)
    }

    pub fn set_enabled(&mut self, view_id: Option<u32>, domain: Domain, enabled: bool) {
        self.get_or_insert(view_id).enables.set(domain, enabled);
    }

    /// Views with `domain` enabled, in registration order.
    pub fn enabled_views(&self, domain: Domain) -> Vec<Option<u32>> {
        self.sessions
            .iter()
            .filter(|s| s.enables.get(domain))
            .map(|s| s.view_id)
            .collect()
    }

    pub fn any_enabled(&self, domain: Domain) -> bool {
        self.sessions.iter().any(|s| s.enables.get(domain))
    }

    pub fn set_all_paused(&mut self, paused: bool) {
        for session in &mut self.sessions {
            if session.enables.debugger {
                session.paused = paused;
            }
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }
}
