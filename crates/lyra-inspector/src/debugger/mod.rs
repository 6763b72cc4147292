//! Debugger core: breakpoints, stepping, and location resolution.

pub mod breakpoints;
pub mod location;
pub mod stepping;

pub use breakpoints::{Breakpoint, BreakpointStore, Locator, ResolvedLocation};
pub use stepping::{ExceptionMode, ExecMode, PauseState, StepKind, StepOrigin};
