//! Lyra inspector runtime.
//!
//! This crate implements the Chrome DevTools Protocol inspection
//! surface for the Lyra JavaScript engine:
//! - **Session management**: message queue, dispatch, per-view enable
//!   state, multi-view fan-out (`queue`, `dispatch`, `session`)
//! - **Debugger core**: breakpoints, bytecode↔source resolution,
//!   stepping, pause/resume, exception pausing (`debugger`)
//! - **Runtime mirror**: stable object ids, `RemoteObject` projection,
//!   property and scope enumeration (`mirror`)
//! - **Heap snapshot**: graph traversal and chunked `.heapsnapshot`
//!   serialization (`heap`)
//! - **CPU profiler glue**: enable/start/stop over the engine's
//!   sampler (`profiler`)
//!
//! The engine itself is a collaborator behind [`engine::Engine`]; the
//! byte transport carrying CDP frames is behind [`engine::Transport`].
//! One [`Inspector`] value per engine holds all mutable state; there
//! are no process-global singletons apart from the read-only dispatch
//! table.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let mut inspector = Inspector::new(Box::new(transport));
//! let sender = inspector.message_sender(); // hand to the transport thread
//!
//! // Engine hooks, called from the mutator thread:
//! inspector.on_script_parsed(&mut engine, source, "app.js", end_line, false);
//! inspector.on_tick(&mut engine, pc, depth);          // per instruction
//! inspector.on_statement(&mut engine, pc, depth);     // statement starts
//! inspector.on_exception_thrown(&mut engine, exc, uncaught);
//! inspector.on_console_call(&mut engine, "log", &args);
//! ```

#![warn(rust_2018_idioms)]

pub mod console;
pub mod debugger;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod heap;
pub mod inspector;
pub mod mirror;
pub mod profiler;
pub mod queue;
pub mod scripts;
pub mod session;
pub mod testing;

pub use error::InspectorError;
pub use inspector::Inspector;
