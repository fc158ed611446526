//! Wire protocol for hostcall host↔client communication.
//!
//! A client sends one [`Request`]-shaped message and receives at most one
//! [`Reply`]. Messages are plain JSON value trees; the [`codec`] frames them
//! with a 4-byte big-endian length prefix for byte-stream channels
//! (pipes, Unix sockets, TCP).

pub mod codec;
mod message;
mod path;

pub use codec::{decode, encode, recv, send};
pub use message::{
    Frame, INVOKE_FUNCTION, GET_FUNCTION_NAMES, Invocation, PROTOCOL_TAG, Reply, Request,
    RequestKind, Sender,
};
pub use path::Path;
pub use serde_json::Value;
