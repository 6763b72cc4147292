//! Pause and stepping state machine.
//!
//! The tick hook feeds the current `(line, column, depth)` plus the
//! running statement-start counter into [`PauseState`]; the state
//! decides pause vs. continue. Breakpoint hits are checked before any
//! step rule and clear the active step.

/// Execution mode as observed by the front end.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExecMode {
    Running,
    /// Paused at a statement boundary (stepping, pauseOnNextStatement).
    PausedAtStatement,
    /// Paused mid-call (breakpoint, `debugger;`, exception).
    PausedInCall,
}

impl ExecMode {
    pub fn is_paused(self) -> bool {
        !matches!(self, ExecMode::Running)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepKind {
    Into,
    Over,
    Out,
    /// Run free; breakpoints still apply.
    Continue,
}

/// Where the active step was issued from.
#[derive(Debug, Copy, Clone)]
pub struct StepOrigin {
    pub line: u32,
    pub column: u32,
    pub depth: u32,
    /// Statement-start counter value at the time of the step.
    pub stmt_count: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExceptionMode {
    None,
    Uncaught,
    All,
}

impl ExceptionMode {
    /// Parse the CDP `setPauseOnExceptions` state string; anything
    /// unrecognized falls back to `None`.
    pub fn parse(state: &str) -> Self {
        match state {
            "all" => ExceptionMode::All,
            "uncaught" => ExceptionMode::Uncaught,
            _ => ExceptionMode::None,
        }
    }
}

#[derive(Debug)]
pub struct PauseState {
    pub mode: ExecMode,
    step: Option<(StepKind, StepOrigin)>,
    pub exception_mode: ExceptionMode,
    pub breakpoints_active: bool,
    pub skip_all: bool,
    /// One-shot pause reason armed by `pauseOnNextStatement`.
    pub pause_on_next: Option<String>,
    saved: Option<(bool, ExceptionMode)>,
    suppress_depth: u32,
}

impl Default for PauseState {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseState {
    pub fn new() -> Self {
        Self {
            mode: ExecMode::Running,
            step: None,
            exception_mode: ExceptionMode::None,
            breakpoints_active: true,
            skip_all: false,
            pause_on_next: None,
            saved: None,
            suppress_depth: 0,
        }
    }

    pub fn set_step(&mut self, kind: StepKind, origin: StepOrigin) {
        self.step = Some((kind, origin));
    }

    /// Breakpoint hits and completed steps clear the active step.
    pub fn clear_step(&mut self) {
        self.step = None;
    }

    pub fn step_kind(&self) -> Option<StepKind> {
        self.step.map(|(kind, _)| kind)
    }

    pub fn step_origin(&self) -> Option<StepOrigin> {
        self.step.map(|(_, origin)| origin)
    }

    /// Step transition rules, evaluated per tick while running.
    pub fn should_pause_for_step(
        &self,
        line: u32,
        column: u32,
        depth: u32,
        stmt_count: u64,
    ) -> bool {
        if self.skip_all {
            return false;
        }
        let Some((kind, origin)) = self.step else {
            return false;
        };
        let over = |origin: &StepOrigin| {
            depth < origin.depth
                || (depth <= origin.depth && line != origin.line)
                || (depth <= origin.depth
                    && stmt_count > origin.stmt_count
                    && (line, column) != (origin.line, origin.column))
        };
        match kind {
            StepKind::Continue => false,
            StepKind::Out => depth < origin.depth,
            StepKind::Into => depth != origin.depth || over(&origin),
            StepKind::Over => over(&origin),
        }
    }

    pub fn should_pause_for_exception(&self, uncaught: bool) -> bool {
        if self.skip_all {
            return false;
        }
        match self.exception_mode {
            ExceptionMode::All => true,
            ExceptionMode::Uncaught => uncaught,
            ExceptionMode::None => false,
        }
    }

    /// Suppress pausing while the inspector itself calls back into the
    /// engine (breakpoint conditions, evaluate). Calls nest; the saved
    /// state is restored when the outermost suppression ends.
    pub fn begin_eval_suppression(&mut self) {
        if self.suppress_depth == 0 {
            self.saved = Some((self.breakpoints_active, self.exception_mode));
        }
        self.suppress_depth += 1;
        self.breakpoints_active = false;
        self.exception_mode = ExceptionMode::None;
    }

    pub fn end_eval_suppression(&mut self) {
        self.suppress_depth = self.suppress_depth.saturating_sub(1);
        if self.suppress_depth == 0 {
            if let Some((breakpoints_active, exception_mode)) = self.saved.take() {
                self.breakpoints_active = breakpoints_active;
                self.exception_mode = exception_mode;
            }
        }
    }

    pub fn suppressing_eval(&self) -> bool {
        self.suppress_depth > 0
    }
}
