//! Chrome DevTools Protocol wire layer for the Lyra inspector.
//!
//! This crate knows the CDP envelope shape and the payload types the
//! inspector emits; it knows nothing about the engine. Two halves:
//!
//! - **Envelope** (`envelope` module): inbound frame decoding, outbound
//!   response/notification framing.
//! - **Payload types** (`types` module): `RemoteObject`, call frames,
//!   scopes, previews, exception details, and the request parameter
//!   structs for the methods the inspector handles.

pub mod envelope;
pub mod types;

pub use envelope::{decode_frame, notification, response, DecodeError, InboundFrame};
