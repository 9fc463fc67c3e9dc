//! devp2p wire - RLPx framing and subprotocol command multiplexing
//!
//! This library turns typed command payloads into RLPx frames and back. It
//! covers command schemas, their per-session bindings, the id-space
//! multiplexing of several subprotocols over one connection, and the base
//! `p2p` protocol (Hello, Disconnect, Ping, Pong). Encryption and socket I/O
//! belong to the session layer, reached through the [`Transport`] trait.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use devp2p_wire::p2p::PING;
//! use devp2p_wire::{CommandCache, Payload};
//!
//! // Bind Ping at the base protocol's offset, uncompressed
//! let ping = CommandCache::global().bind(PING, 0, false)?;
//!
//! // Encode to a header and a 16-byte aligned body
//! let frame = ping.encode(&Payload::empty())?;
//! assert_eq!(frame.body()[0], 0x02);
//!
//! // Decode the body again
//! let payload = ping.decode(frame.body())?;
//! assert_eq!(payload, Payload::empty());
//! # Ok::<(), devp2p_wire::Error>(())
//! ```
//!
//! # Features
//!
//! - **Declarative schemas** - commands are `const` values, not types
//! - **Shared bindings** - one cached instance per (schema, offset, snappy)
//! - **Atomic compression upgrade** - protocols swap whole command snapshots
//! - **Snappy** - negotiated per session, never applied to `Hello`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod p2p;
pub mod protocol;

pub use protocol::{
    BoundCommand, CommandCache, CommandSchema, Error, ErrorKind, Frame, HEADER_SIZE,
    MAX_FRAME_SIZE, MetricsSnapshot, Payload, Protocol, ProtocolSpec, Request, Result, Sedes,
    Transport, Value, metrics_snapshot,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
