//! devp2p wire error types

use thiserror::Error;

use super::value::SedesError;

/// Broad classification of [`Error`] values.
///
/// Callers in the session layer use this to decide whether the remote sent
/// something we cannot accept or whether the local side tried to send
/// something invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote peer sent data that violates the protocol.
    MalformedMessage,
    /// A locally built message failed validation before it reached the wire.
    Encoding,
    /// A protocol definition is inconsistent (id ranges, schema ids).
    Definition,
}

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum Error {
    /// Leading command id of a frame body does not belong to the expected command
    #[error("wrong packet type: {found}, expected {expected}")]
    WrongCommandId {
        /// Command id the decoder was bound to
        expected: u64,
        /// Command id read from the frame body
        found: u64,
    },

    /// No command of the protocol is registered under the received id
    #[error("unknown command id {found} for protocol {protocol}")]
    UnknownCommandId {
        /// Protocol name
        protocol: &'static str,
        /// Command id read from the frame body
        found: u64,
    },

    /// Leading command id of a frame body cannot be read
    #[error("malformed {protocol} frame: unreadable command id: {source}")]
    UnreadableCommandId {
        /// Protocol that received the frame
        protocol: &'static str,
        /// Underlying decode failure
        #[source]
        source: SedesError,
    },

    /// Frame body is shorter than the size announced in its header
    #[error("frame body holds {body_len} bytes, header announces {frame_size}")]
    TruncatedFrame {
        /// Size read from the header
        frame_size: usize,
        /// Bytes actually received
        body_len: usize,
    },

    /// Structured decoding of a payload failed
    #[error("malformed {command} message: {source}")]
    MalformedPayload {
        /// Schema name
        command: &'static str,
        /// Underlying decode failure
        #[source]
        source: SedesError,
    },

    /// Snappy decompression of an inbound payload failed
    #[error("malformed {command} message: snappy decompression failed: {source}")]
    Decompression {
        /// Schema name
        command: &'static str,
        /// Underlying snappy failure
        #[source]
        source: snap::Error,
    },

    /// Field mapping keys do not match the schema fields
    #[error("keys in {command} payload ({found:?}) do not match expected keys ({expected:?})")]
    FieldMismatch {
        /// Schema name
        command: &'static str,
        /// Sorted schema field names
        expected: Vec<&'static str>,
        /// Sorted keys supplied by the caller
        found: Vec<String>,
    },

    /// A payload value does not fit the schema element type
    #[error("invalid {command} payload: {source}")]
    InvalidValue {
        /// Schema name
        command: &'static str,
        /// Underlying shape mismatch
        #[source]
        source: SedesError,
    },

    /// Snappy compression of an outbound payload failed
    #[error("snappy compression of {command} payload failed: {source}")]
    Compression {
        /// Schema name
        command: &'static str,
        /// Underlying snappy failure
        #[source]
        source: snap::Error,
    },

    /// Encoded command id and payload do not fit the 3-byte frame size
    #[error("frame size has to fit in a 3-byte integer: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Frame size in bytes
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// The protocol does not own the requested command schema
    #[error("protocol {protocol} does not support command {command}")]
    UnsupportedCommand {
        /// Protocol name
        protocol: &'static str,
        /// Schema name
        command: &'static str,
    },

    /// A schema id does not fit the id range reserved by its protocol
    #[error("command {command} has id {base_id}, outside the {cmd_length} ids reserved by {protocol}")]
    CommandIdOutOfRange {
        /// Protocol name
        protocol: &'static str,
        /// Schema name
        command: &'static str,
        /// Schema base id
        base_id: u64,
        /// Reserved range size
        cmd_length: u64,
    },

    /// Two schemas of one protocol share a base id
    #[error("protocol {protocol} defines command id {base_id} more than once")]
    DuplicateCommandId {
        /// Protocol name
        protocol: &'static str,
        /// Repeated base id
        base_id: u64,
    },

    /// An id offset pushes command ids past `u64::MAX`
    #[error("ids of {name} at offset {offset} overflow ({length} ids needed)")]
    IdOverflow {
        /// Protocol or command name
        name: &'static str,
        /// Requested offset
        offset: u64,
        /// Number of ids needed from the offset
        length: u64,
    },

    /// Two subprotocols on one connection claim overlapping id ranges
    #[error("id range of {protocol} at offset {offset} overlaps {other}")]
    IdRangeOverlap {
        /// Protocol being placed
        protocol: &'static str,
        /// Requested offset
        offset: u64,
        /// Protocol already owning part of the range
        other: &'static str,
    },
}

impl Error {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongCommandId { .. }
            | Self::UnknownCommandId { .. }
            | Self::UnreadableCommandId { .. }
            | Self::TruncatedFrame { .. }
            | Self::MalformedPayload { .. }
            | Self::Decompression { .. } => ErrorKind::MalformedMessage,
            Self::FieldMismatch { .. }
            | Self::InvalidValue { .. }
            | Self::Compression { .. }
            | Self::FrameTooLarge { .. }
            | Self::UnsupportedCommand { .. } => ErrorKind::Encoding,
            Self::CommandIdOutOfRange { .. }
            | Self::DuplicateCommandId { .. }
            | Self::IdOverflow { .. }
            | Self::IdRangeOverlap { .. } => ErrorKind::Definition,
        }
    }

    /// Whether the error signals a malformed inbound message.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self.kind(), ErrorKind::MalformedMessage)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
