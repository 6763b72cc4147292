//! Inbound message queue.
//!
//! Raw CDP frames cross from the host transport thread into mutator
//! land exclusively through this queue. `push` may run on any thread;
//! everything else runs on the mutator only. Channel semantics give the
//! required release/acquire ordering on the crossing.

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::time::Duration;

/// Upper bound on in-flight frames; the transport side drops beyond it.
const QUEUE_CAPACITY: usize = 4096;

/// Clonable producer half handed to the host transport.
#[derive(Clone)]
pub struct MessageSender {
    tx: Sender<String>,
}

impl MessageSender {
    /// Enqueue one raw frame. Returns false when the queue is full and
    /// the frame was dropped.
    pub fn push(&self, raw: String) -> bool {
        match self.tx.try_send(raw) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("inspector message queue full, frame dropped");
                false
            }
        }
    }
}

/// Mutator-side consumer. A small local buffer fronts the channel so a
/// message can be put back unconsumed (the out-of-band
/// `pauseOnNextStatement` path).
pub struct MessageQueue {
    tx: Sender<String>,
    rx: Receiver<String>,
    buffer: VecDeque<String>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        let (tx, rx) = bounded(QUEUE_CAPACITY);
        Self {
            tx,
            rx,
            buffer: VecDeque::new(),
        }
    }

    /// Producer handle for the transport thread.
    pub fn sender(&self) -> MessageSender {
        MessageSender {
            tx: self.tx.clone(),
        }
    }

    /// Next pending frame without blocking.
    pub fn pop(&mut self) -> Option<String> {
        if let Some(front) = self.buffer.pop_front() {
            return Some(front);
        }
        self.rx.try_recv().ok()
    }

    /// Put a frame back at the head of the queue, to be observed again
    /// on the next drain.
    pub fn push_front(&mut self, raw: String) {
        self.buffer.push_front(raw);
    }

    /// Blocking receive used by the pause loop. Returns `None` on
    /// timeout so the caller can re-check its resume flag.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<String> {
        if let Some(front) = self.buffer.pop_front() {
            return Some(front);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(raw) => Some(raw),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// True when a frame is ready without blocking.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.rx.is_empty()
    }
}
