//! Command framing and subprotocol multiplexing
//!
//! This module provides command schemas, their per-session bindings, the
//! protocol id-space multiplexer and RLPx frame construction.

mod cache;
mod command;
mod error;
mod frame;
mod metrics;
mod schema;
mod subprotocol;
mod value;

pub use cache::{BindingKey, CommandCache};
pub use command::{BoundCommand, read_command_id};
pub use error::{Error, ErrorKind, Result};
pub use frame::{Frame, frame_payload, pad_to_16_byte_boundary, padded_len, read_frame_size};
pub use metrics::{MetricsSnapshot, metrics_snapshot};
pub use schema::{CommandSchema, Fields, Payload, Structure};
pub use subprotocol::{CommandSet, IdSpace, Protocol, ProtocolSpec, Request, Transport};
pub use value::{
    Sedes, SedesError, Value, decode_countable, decode_list, decode_uint_prefix, encode_countable,
    encode_list, encode_uint,
};

/// Frame header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Alignment of frame headers and bodies
pub const FRAME_ALIGNMENT: usize = 16;

/// Largest frame size expressible in the 3-byte header field
pub const MAX_FRAME_SIZE: usize = (1 << 24) - 1;

/// Header bytes following the frame size: RLP of `[0, 0]`, ignored on receipt
pub const HEADER_MARKER: [u8; 3] = [0xc2, 0x80, 0x80];
