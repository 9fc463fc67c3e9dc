//! Commands bound to a session's id offset and compression state

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use super::frame::Frame;
use super::metrics::{FrameDirection, Metrics};
use super::schema::{CommandSchema, Payload};
use super::value::{self, SedesError};
use super::{Error, Result};

/// A [`CommandSchema`] placed at a concrete id with a resolved compression flag.
///
/// Instances are produced by [`CommandCache::bind`](super::CommandCache::bind)
/// and are interchangeable when their binding triple matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundCommand {
    schema: CommandSchema,
    id_offset: u64,
    cmd_id: u64,
    snappy_support: bool,
}

impl BoundCommand {
    /// `id_offset + schema.base_id` must fit in a `u64`.
    pub(crate) const fn new(schema: CommandSchema, id_offset: u64, snappy_support: bool) -> Self {
        Self {
            schema,
            id_offset,
            cmd_id: id_offset + schema.base_id,
            snappy_support,
        }
    }

    /// Get the schema this command was bound from
    #[must_use]
    pub const fn schema(&self) -> &CommandSchema {
        &self.schema
    }

    /// Get the command name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.schema.name
    }

    /// Get the id offset of the owning protocol
    #[must_use]
    pub const fn id_offset(&self) -> u64 {
        self.id_offset
    }

    /// Get the final command id on the connection
    #[must_use]
    pub const fn cmd_id(&self) -> u64 {
        self.cmd_id
    }

    /// Whether the session negotiated snappy for this binding
    #[must_use]
    pub const fn snappy_support(&self) -> bool {
        self.snappy_support
    }

    /// Whether payloads of this command are actually compressed
    #[must_use]
    pub const fn compresses(&self) -> bool {
        self.snappy_support && self.schema.compressible
    }

    /// Whether the command belongs to the base protocol (offset 0)
    #[must_use]
    pub const fn is_base_protocol(&self) -> bool {
        self.id_offset == 0
    }

    /// Structured-encode a payload.
    pub fn encode_payload(&self, payload: &Payload) -> Result<Bytes> {
        self.schema.encode_payload(payload)
    }

    /// Structured-decode a payload.
    pub fn decode_payload(&self, bytes: &[u8]) -> Result<Payload> {
        self.schema.decode_payload(bytes)
    }

    /// Snappy-compress an encoded payload when compression applies.
    pub fn compress_payload(&self, raw_payload: Bytes) -> Result<Bytes> {
        if !self.compresses() {
            return Ok(raw_payload);
        }
        snap::raw::Encoder::new()
            .compress_vec(&raw_payload)
            .map(Bytes::from)
            .map_err(|source| Error::Compression {
                command: self.schema.name,
                source,
            })
    }

    /// Reverse [`compress_payload`](Self::compress_payload).
    pub fn decompress_payload(&self, raw_payload: &[u8]) -> Result<Bytes> {
        if !self.compresses() {
            return Ok(Bytes::copy_from_slice(raw_payload));
        }
        snap::raw::Decoder::new()
            .decompress_vec(raw_payload)
            .map(Bytes::from)
            .map_err(|source| Error::Decompression {
                command: self.schema.name,
                source,
            })
    }

    /// Encode a payload into a ready-to-send frame.
    pub fn encode(&self, payload: &Payload) -> Result<Frame> {
        let frame = self.encode_frame(payload).inspect_err(Metrics::record_error)?;
        Metrics::record_frame(
            FrameDirection::Encoded,
            frame.frame_size(),
            self.compresses(),
        );
        Ok(frame)
    }

    fn encode_frame(&self, payload: &Payload) -> Result<Frame> {
        let encoded = self.encode_payload(payload)?;
        let compressed = self.compress_payload(encoded)?;
        let cmd_id = value::encode_uint(self.cmd_id);

        let mut buf = BytesMut::with_capacity(cmd_id.len() + compressed.len());
        buf.put_slice(&cmd_id);
        buf.put_slice(&compressed);
        trace!(
            command = self.schema.name,
            cmd_id = self.cmd_id,
            frame_size = buf.len(),
            snappy = self.compresses(),
            "encoding frame"
        );
        Frame::build(&buf)
    }

    /// Decode a frame body (command id followed by payload).
    ///
    /// Uncompressed bodies may still carry their zero padding; compressed
    /// bodies must be cut to the frame size first.
    pub fn decode(&self, body: &[u8]) -> Result<Payload> {
        let payload = self.decode_body(body).inspect_err(Metrics::record_error)?;
        Metrics::record_frame(FrameDirection::Decoded, body.len(), self.compresses());
        Ok(payload)
    }

    fn decode_body(&self, body: &[u8]) -> Result<Payload> {
        let (found, id_len) = read_command_id(body).map_err(|source| Error::MalformedPayload {
            command: self.schema.name,
            source,
        })?;
        if found != self.cmd_id {
            return Err(Error::WrongCommandId {
                expected: self.cmd_id,
                found,
            });
        }
        let encoded = self.decompress_payload(&body[id_len..])?;
        self.decode_payload(&encoded)
    }
}

impl fmt::Display for BoundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (cmd_id={}, offset={}, snappy={})",
            self.schema.name, self.cmd_id, self.id_offset, self.snappy_support
        )
    }
}

/// Read the leading command id of a frame body, returning it with its
/// encoded length.
pub fn read_command_id(body: &[u8]) -> std::result::Result<(u64, usize), SedesError> {
    value::decode_uint_prefix(body)
}
