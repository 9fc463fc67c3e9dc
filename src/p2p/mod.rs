//! Base (`p2p`) subprotocol: Hello, Disconnect, Ping and Pong
//!
//! The base protocol always sits at id offset 0 and every session starts
//! uncompressed; snappy is switched on once both `Hello`s are known.

mod commands;
mod disconnect;
mod identity;

use std::ops::Deref;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::protocol::{
    BoundCommand, CommandCache, CommandSchema, Error, HEADER_SIZE, Payload, Protocol, Result,
    Transport, Value, frame_payload,
};

pub use commands::{DISCONNECT, HELLO, P2P, P2P_CMD_LENGTH, P2P_VERSION, PING, PONG};
pub use disconnect::{DisconnectReason, UNKNOWN_REASON, reason_name};
pub use identity::{Capability, HelloInfo, LocalIdentity, client_identifier};

/// The base protocol bound to one connection.
#[derive(Debug)]
pub struct P2PProtocol<T> {
    protocol: Protocol<T>,
    identity: LocalIdentity,
}

impl<T: Transport> P2PProtocol<T> {
    /// Bind the base protocol through the process-wide cache.
    pub fn new(transport: T, identity: LocalIdentity) -> Result<Self> {
        Self::with_cache(transport, identity, CommandCache::global())
    }

    /// Bind the base protocol through `cache`.
    pub fn with_cache(
        transport: T,
        identity: LocalIdentity,
        cache: Arc<CommandCache>,
    ) -> Result<Self> {
        Ok(Self {
            protocol: Protocol::with_cache(P2P, transport, 0, false, cache)?,
            identity,
        })
    }

    /// Get the underlying protocol
    #[must_use]
    pub const fn protocol(&self) -> &Protocol<T> {
        &self.protocol
    }

    /// Get the local identity
    #[must_use]
    pub const fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    /// `Hello` payload announcing the local identity.
    #[must_use]
    pub fn hello_payload(&self) -> Payload {
        let capabilities = self.identity.capabilities.iter().map(Value::from).collect();
        Payload::from_iter([
            ("version", Value::Uint(P2P_VERSION)),
            (
                "client_version_string",
                Value::Text(self.identity.client_version_string.clone()),
            ),
            ("capabilities", Value::List(capabilities)),
            ("listen_port", Value::from(self.identity.listen_port)),
            ("remote_pubkey", Value::Bytes(self.identity.public_key.clone())),
        ])
    }

    /// Send `Hello`.
    pub fn send_handshake(&self) -> Result<()> {
        debug!(
            client = %self.identity.client_version_string,
            capabilities = self.identity.capabilities.len(),
            "sending hello"
        );
        self.send_command(&HELLO, &self.hello_payload())
    }

    /// Send `Disconnect` with `reason`.
    pub fn send_disconnect(&self, reason: DisconnectReason) -> Result<()> {
        debug!(%reason, "sending disconnect");
        self.send_command(
            &DISCONNECT,
            &Payload::from_iter([("reason", Value::Uint(reason.code()))]),
        )
    }

    /// Send `Ping`.
    pub fn send_ping(&self) -> Result<()> {
        self.send_command(&PING, &Payload::empty())
    }

    /// Send `Pong`.
    pub fn send_pong(&self) -> Result<()> {
        self.send_command(&PONG, &Payload::empty())
    }

    fn send_command(&self, schema: &CommandSchema, payload: &Payload) -> Result<()> {
        let frame = self.protocol.encode(schema, payload)?;
        self.protocol.send(frame.header(), frame.body());
        Ok(())
    }

    /// Decode an inbound base protocol frame body.
    ///
    /// `Disconnect` payloads gain a `reason_name` field; unknown codes map to
    /// [`UNKNOWN_REASON`] while structural errors still fail.
    pub fn decode(&self, body: &[u8]) -> Result<(Arc<BoundCommand>, Payload)> {
        match self.protocol.decode(body) {
            Ok((command, payload)) if *command.schema() == DISCONNECT => {
                Ok((command, with_reason_name(payload)))
            }
            Err(err) => {
                warn_if_malformed_disconnect(&err, body);
                Err(err)
            }
            decoded => decoded,
        }
    }

    /// Decode a received header and body, see [`Protocol::decode_frame`].
    pub fn decode_frame(
        &self,
        header: &[u8; HEADER_SIZE],
        body: &[u8],
    ) -> Result<(Arc<BoundCommand>, Payload)> {
        self.decode(frame_payload(header, body)?)
    }
}

impl<T> Deref for P2PProtocol<T> {
    type Target = Protocol<T>;

    fn deref(&self) -> &Self::Target {
        &self.protocol
    }
}

/// Decode a `Disconnect` body with an already bound command.
pub fn decode_disconnect(command: &BoundCommand, body: &[u8]) -> Result<Payload> {
    command
        .decode(body)
        .map(with_reason_name)
        .inspect_err(|err| warn_if_malformed_disconnect(err, body))
}

fn with_reason_name(payload: Payload) -> Payload {
    let Payload::Fields(mut fields) = payload else {
        return payload;
    };
    let name = fields
        .get("reason")
        .and_then(Value::as_uint)
        .map_or(UNKNOWN_REASON, reason_name);
    fields.insert("reason_name".to_owned(), Value::from(name));
    Payload::Fields(fields)
}

fn warn_if_malformed_disconnect(err: &Error, body: &[u8]) {
    if matches!(err, Error::MalformedPayload { command, .. } if *command == DISCONNECT.name) {
        warn!(error = %err, ?body, "malformed Disconnect message");
    }
}
