//! Test harness: a wired inspector over the scripted fake engine.
//!
//! Frames are enqueued through the real message queue and dispatched by
//! ticking the inspector, so every test exercises the same path a live
//! engine would. Messages that must arrive while the inspector is
//! blocked in its pause loop are pushed from a background thread with a
//! delay.

use lyra_inspector::debugger::location::encode_record;
use lyra_inspector::engine::{BytecodeInfo, BytecodeRef, FrameInfo, PcRef};
use lyra_inspector::queue::MessageSender;
use lyra_inspector::testing::{FakeEngine, RecordingTransport};
use lyra_inspector::Inspector;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

/// A pc no real bytecode uses; good for draining the queue.
pub const DUMMY_PC: PcRef = PcRef {
    bytecode: BytecodeRef(0),
    pc: 0,
};

pub struct Fixture {
    pub engine: FakeEngine,
    pub inspector: Inspector,
    pub transport: RecordingTransport,
    pub sender: MessageSender,
    next_id: i64,
}

impl Fixture {
    pub fn new() -> Self {
        let transport = RecordingTransport::new();
        let inspector = Inspector::new(Box::new(transport.clone()));
        let sender = inspector.message_sender();
        Self {
            engine: FakeEngine::new(),
            inspector,
            transport,
            sender,
            next_id: 0,
        }
    }

    pub fn enqueue_from(&mut self, view: Option<u32>, method: &str, params: JsonValue) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        let mut frame = json!({ "id": id, "method": method, "params": params });
        if let Some(view) = view {
            frame["view_id"] = json!(view);
        }
        self.sender.push(frame.to_string());
        id
    }

    pub fn enqueue(&mut self, method: &str, params: JsonValue) -> i64 {
        self.enqueue_from(None, method, params)
    }

    /// Drain the queue by ticking at a pc nothing is attached to.
    pub fn pump(&mut self) {
        self.inspector.on_tick(&mut self.engine, DUMMY_PC, 0);
    }

    /// Enqueue, dispatch, and return the result body of the response.
    pub fn send(&mut self, method: &str, params: JsonValue) -> JsonValue {
        let id = self.enqueue(method, params);
        self.pump();
        self.result(id)
    }

    pub fn send_from(&mut self, view: Option<u32>, method: &str, params: JsonValue) -> JsonValue {
        let id = self.enqueue_from(view, method, params);
        self.pump();
        self.result(id)
    }

    /// The `result` body of the (single) response for `id`.
    pub fn result(&self, id: i64) -> JsonValue {
        let responses = self.transport.responses_for(id);
        assert_eq!(responses.len(), 1, "expected one response for id {}", id);
        responses[0]["result"].clone()
    }

    /// Push a frame from a background thread after `delay_ms`, so it is
    /// delivered into an active pause loop.
    pub fn push_later(&mut self, delay_ms: u64, method: &str, params: JsonValue) -> i64 {
        self.push_later_from(None, delay_ms, method, params)
    }

    pub fn push_later_from(
        &mut self,
        view: Option<u32>,
        delay_ms: u64,
        method: &str,
        params: JsonValue,
    ) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        let mut frame = json!({ "id": id, "method": method, "params": params });
        if let Some(view) = view {
            frame["view_id"] = json!(view);
        }
        let raw = frame.to_string();
        let sender = self.sender.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(delay_ms));
            sender.push(raw);
        });
        id
    }

    pub fn paused_events(&self) -> Vec<JsonValue> {
        self.transport.notifications("Debugger.paused")
    }

    pub fn resumed_events(&self) -> Vec<JsonValue> {
        self.transport.notifications("Debugger.resumed")
    }
}

/// The standard one-function program most scenarios use:
/// `function f(x){ return x*2; }; f(3); f(4);` with pc→line points
/// `(0,0)@pc0`, `(0,15)@pc4`, `(0,30)@pc8`.
pub const PROGRAM_SRC: &str = "function f(x){ return x*2; }; f(3); f(4);";

pub struct Program {
    pub script_id: u32,
    pub bytecode: BytecodeRef,
}

pub fn install_program(fx: &mut Fixture) -> Program {
    let script_id = fx
        .inspector
        .on_script_parsed(&mut fx.engine, PROGRAM_SRC, "t.js", 0, false);
    let mut table = Vec::new();
    encode_record(&mut table, 4, 15);
    encode_record(&mut table, 4, 15);
    let bytecode = fx.engine.add_bytecode(
        0xB000,
        BytecodeInfo {
            script_id,
            function_name: "f".into(),
            start_pos: 0,
            pc_to_line: table,
        },
    );
    Program {
        script_id,
        bytecode,
    }
}

/// Put one frame of `f` on the fake stack at `pc`.
pub fn push_frame(fx: &mut Fixture, program: &Program, pc: u32) {
    let this = fx.engine.undefined_value();
    fx.engine.push_frame(FrameInfo {
        function_name: "f".into(),
        bytecode: Some(program.bytecode),
        pc,
        this,
        closure_depth: 0,
    });
}
