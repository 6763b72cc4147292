//! Inspector error taxonomy.
//!
//! Protocol-level failures (unknown method, disabled domain, bad
//! params) are answered with empty results and never surface here; this
//! type covers the cases where the inspector itself cannot proceed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InspectorError {
    /// Malformed inbound frame. Logged and dropped by the dispatcher;
    /// no response is possible without an id.
    #[error(transparent)]
    Decode(#[from] lyra_protocol::DecodeError),

    /// Writing the snapshot side file failed.
    #[error("snapshot side file: {0}")]
    SnapshotFile(#[from] std::io::Error),
}
