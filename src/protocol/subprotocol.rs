//! Subprotocols multiplexed onto one connection's command id space

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, instrument, trace};

use super::cache::CommandCache;
use super::command::{BoundCommand, read_command_id};
use super::frame::{Frame, frame_payload};
use super::schema::{CommandSchema, Payload};
use super::{Error, HEADER_SIZE, Result};

/// Outbound side of the encrypted session.
///
/// Sending is fire-and-forget from this layer's point of view.
pub trait Transport: Send + Sync {
    /// Hand one frame header and body to the session.
    fn send(&self, header: &[u8], body: &[u8]);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, header: &[u8], body: &[u8]) {
        (**self).send(header, body);
    }
}

/// Definition of one subprotocol: name, version and the commands it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolSpec {
    /// Short capability name (`p2p`, `eth`, ...)
    pub name: &'static str,
    /// Protocol version
    pub version: u64,
    /// Size of the id range the protocol reserves
    pub cmd_length: u64,
    /// Command schemas owned by the protocol
    pub commands: &'static [CommandSchema],
}

impl ProtocolSpec {
    /// Whether `schema` is one of this protocol's commands.
    #[must_use]
    pub fn supports_command(&self, schema: &CommandSchema) -> bool {
        self.commands.contains(schema)
    }

    /// Ids reserved when the protocol is placed at `offset`.
    pub fn id_range(&self, offset: u64) -> Result<Range<u64>> {
        let end = offset
            .checked_add(self.cmd_length)
            .ok_or(Error::IdOverflow {
                name: self.name,
                offset,
                length: self.cmd_length,
            })?;
        Ok(offset..end)
    }

    /// Check that every schema id is unique and inside the reserved range.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.commands.len());
        for schema in self.commands {
            if schema.base_id >= self.cmd_length {
                return Err(Error::CommandIdOutOfRange {
                    protocol: self.name,
                    command: schema.name,
                    base_id: schema.base_id,
                    cmd_length: self.cmd_length,
                });
            }
            if !seen.insert(schema.base_id) {
                return Err(Error::DuplicateCommandId {
                    protocol: self.name,
                    base_id: schema.base_id,
                });
            }
        }
        Ok(())
    }
}

/// An outbound request: a command payload, optionally paired with the
/// command expected in response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    schema: CommandSchema,
    payload: Payload,
    response: Option<CommandSchema>,
}

impl Request {
    /// Create a request for `schema` carrying `payload`
    #[must_use]
    pub const fn new(schema: CommandSchema, payload: Payload) -> Self {
        Self {
            schema,
            payload,
            response: None,
        }
    }

    /// Record the command the peer is expected to answer with
    #[must_use]
    pub fn expecting(mut self, response: CommandSchema) -> Self {
        self.response = Some(response);
        self
    }

    /// Get the outbound command schema
    #[must_use]
    pub const fn schema(&self) -> &CommandSchema {
        &self.schema
    }

    /// Get the payload
    #[must_use]
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Get the expected response schema
    #[must_use]
    pub const fn response(&self) -> Option<&CommandSchema> {
        self.response.as_ref()
    }
}

/// Immutable set of a protocol's bound commands for one compression state.
#[derive(Debug)]
pub struct CommandSet {
    snappy_support: bool,
    commands: Vec<Arc<BoundCommand>>,
    by_schema: HashMap<CommandSchema, Arc<BoundCommand>>,
    by_id: HashMap<u64, Arc<BoundCommand>>,
}

impl CommandSet {
    // The spec is validated and its range at `id_offset` fits.
    fn bind(
        spec: &ProtocolSpec,
        id_offset: u64,
        snappy_support: bool,
        cache: &CommandCache,
    ) -> Self {
        let commands: Vec<_> = spec
            .commands
            .iter()
            .map(|schema| cache.bind_in_range(*schema, id_offset, snappy_support))
            .collect();
        let by_schema = commands
            .iter()
            .map(|cmd| (*cmd.schema(), Arc::clone(cmd)))
            .collect();
        let by_id = commands
            .iter()
            .map(|cmd| (cmd.cmd_id(), Arc::clone(cmd)))
            .collect();
        Self {
            snappy_support,
            commands,
            by_schema,
            by_id,
        }
    }

    /// Compression state the commands were bound with
    #[must_use]
    pub const fn snappy_support(&self) -> bool {
        self.snappy_support
    }

    /// Bound commands in definition order
    #[must_use]
    pub fn commands(&self) -> &[Arc<BoundCommand>] {
        &self.commands
    }

    /// Bound command for a schema
    #[must_use]
    pub fn get(&self, schema: &CommandSchema) -> Option<&Arc<BoundCommand>> {
        self.by_schema.get(schema)
    }

    /// Bound command for a final command id
    #[must_use]
    pub fn by_id(&self, cmd_id: u64) -> Option<&Arc<BoundCommand>> {
        self.by_id.get(&cmd_id)
    }
}

/// A subprotocol instance on one connection.
///
/// The bound commands live in a [`CommandSet`] snapshot that is replaced as a
/// whole when compression is toggled, so every operation sees either the old
/// or the new flag for all commands.
pub struct Protocol<T> {
    spec: ProtocolSpec,
    id_offset: u64,
    transport: T,
    cache: Arc<CommandCache>,
    snapshot: RwLock<Arc<CommandSet>>,
}

impl<T: Transport> Protocol<T> {
    /// Create a protocol instance bound through the process-wide cache.
    pub fn new(
        spec: ProtocolSpec,
        transport: T,
        id_offset: u64,
        snappy_support: bool,
    ) -> Result<Self> {
        Self::with_cache(
            spec,
            transport,
            id_offset,
            snappy_support,
            CommandCache::global(),
        )
    }

    /// Create a protocol instance bound through `cache`.
    pub fn with_cache(
        spec: ProtocolSpec,
        transport: T,
        id_offset: u64,
        snappy_support: bool,
        cache: Arc<CommandCache>,
    ) -> Result<Self> {
        spec.validate()?;
        spec.id_range(id_offset)?;
        let commands = CommandSet::bind(&spec, id_offset, snappy_support, &cache);
        debug!(
            protocol = spec.name,
            version = spec.version,
            id_offset,
            snappy_support,
            "protocol bound"
        );
        Ok(Self {
            spec,
            id_offset,
            transport,
            cache,
            snapshot: RwLock::new(Arc::new(commands)),
        })
    }

    /// Get the protocol definition
    #[must_use]
    pub const fn spec(&self) -> &ProtocolSpec {
        &self.spec
    }

    /// Get the protocol name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Get the protocol version
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.spec.version
    }

    /// Get the size of the reserved id range
    #[must_use]
    pub const fn cmd_length(&self) -> u64 {
        self.spec.cmd_length
    }

    /// Get the id offset on this connection
    #[must_use]
    pub const fn cmd_id_offset(&self) -> u64 {
        self.id_offset
    }

    /// Whether this is the base protocol (offset 0)
    #[must_use]
    pub const fn is_base_protocol(&self) -> bool {
        self.id_offset == 0
    }

    /// Get the transport
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Current snapshot of bound commands
    #[must_use]
    pub fn commands(&self) -> Arc<CommandSet> {
        Arc::clone(&*self.snapshot.read())
    }

    /// Current compression state
    #[must_use]
    pub fn snappy_support(&self) -> bool {
        self.snapshot.read().snappy_support
    }

    /// Re-bind every command against `enabled` and install the result.
    pub fn set_snappy_support(&self, enabled: bool) {
        let mut snapshot = self.snapshot.write();
        if snapshot.snappy_support == enabled {
            return;
        }
        *snapshot = Arc::new(CommandSet::bind(
            &self.spec,
            self.id_offset,
            enabled,
            &self.cache,
        ));
        debug!(
            protocol = self.spec.name,
            snappy_support = enabled,
            "compression toggled"
        );
    }

    /// Whether `schema` is one of this protocol's commands.
    #[must_use]
    pub fn supports_command(&self, schema: &CommandSchema) -> bool {
        self.spec.supports_command(schema)
    }

    /// Bound command for `schema` in the current snapshot.
    pub fn command_for(&self, schema: &CommandSchema) -> Result<Arc<BoundCommand>> {
        self.commands()
            .get(schema)
            .cloned()
            .ok_or(Error::UnsupportedCommand {
                protocol: self.spec.name,
                command: schema.name,
            })
    }

    /// Bound command registered under a final command id.
    #[must_use]
    pub fn command_by_id(&self, cmd_id: u64) -> Option<Arc<BoundCommand>> {
        self.commands().by_id(cmd_id).cloned()
    }

    /// Encode `payload` as `schema` with the current compression state.
    pub fn encode(&self, schema: &CommandSchema, payload: &Payload) -> Result<Frame> {
        self.command_for(schema)?.encode(payload)
    }

    /// Decode an inbound frame body by dispatching on its command id.
    #[instrument(
        level = "trace",
        skip(self, body),
        fields(protocol = self.spec.name, len = body.len())
    )]
    pub fn decode(&self, body: &[u8]) -> Result<(Arc<BoundCommand>, Payload)> {
        let (cmd_id, _) =
            read_command_id(body).map_err(|source| Error::UnreadableCommandId {
                protocol: self.spec.name,
                source,
            })?;
        let command = self
            .command_by_id(cmd_id)
            .ok_or(Error::UnknownCommandId {
                protocol: self.spec.name,
                found: cmd_id,
            })?;
        let payload = command.decode(body)?;
        Ok((command, payload))
    }

    /// Decode a received header and body, cutting the body to the frame size
    /// first so compressed payloads lose their padding.
    pub fn decode_frame(
        &self,
        header: &[u8; HEADER_SIZE],
        body: &[u8],
    ) -> Result<(Arc<BoundCommand>, Payload)> {
        self.decode(frame_payload(header, body)?)
    }

    /// Pass a frame to the transport.
    pub fn send(&self, header: &[u8], body: &[u8]) {
        self.transport.send(header, body);
    }

    /// Encode a request with its protocol command and send it.
    #[instrument(
        level = "trace",
        skip(self, request),
        fields(protocol = self.spec.name, command = request.schema().name)
    )]
    pub fn send_request(&self, request: &Request) -> Result<()> {
        let frame = self.encode(request.schema(), request.payload())?;
        trace!(frame_size = frame.frame_size(), "sending request");
        self.send(frame.header(), frame.body());
        Ok(())
    }
}

impl<T> fmt::Display for Protocol<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.spec.name, self.spec.version)
    }
}

impl<T> fmt::Debug for Protocol<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("name", &self.spec.name)
            .field("version", &self.spec.version)
            .field("id_offset", &self.id_offset)
            .field("snappy_support", &self.snapshot.read().snappy_support)
            .finish_non_exhaustive()
    }
}

/// Allocation of command id ranges to the subprotocols of one connection.
#[derive(Debug, Default, Clone)]
pub struct IdSpace {
    reserved: Vec<(&'static str, Range<u64>)>,
}

impl IdSpace {
    /// Create an empty id space
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// First id after every reserved range.
    #[must_use]
    pub fn next_free(&self) -> u64 {
        self.reserved
            .iter()
            .map(|(_, range)| range.end)
            .max()
            .unwrap_or(0)
    }

    /// Reserve the next free range for `spec`, returning its offset.
    pub fn reserve(&mut self, spec: &ProtocolSpec) -> Result<u64> {
        let offset = self.next_free();
        self.reserved.push((spec.name, spec.id_range(offset)?));
        Ok(offset)
    }

    /// Reserve `spec`'s range at an explicit offset.
    pub fn reserve_at(&mut self, spec: &ProtocolSpec, offset: u64) -> Result<u64> {
        let wanted = spec.id_range(offset)?;
        if let Some((other, _)) = self
            .reserved
            .iter()
            .find(|(_, range)| wanted.start < range.end && range.start < wanted.end)
        {
            return Err(Error::IdRangeOverlap {
                protocol: spec.name,
                offset,
                other: *other,
            });
        }
        self.reserved.push((spec.name, wanted));
        Ok(offset)
    }
}
