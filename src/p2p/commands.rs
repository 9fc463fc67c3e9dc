//! Base protocol command schemas

use crate::protocol::{CommandSchema, ProtocolSpec, Sedes};

/// Base protocol version announced in `Hello`
pub const P2P_VERSION: u64 = 5;

/// Ids reserved by the base protocol; application protocols start here
pub const P2P_CMD_LENGTH: u64 = 16;

const CAPABILITY: Sedes = Sedes::List(&[Sedes::Text, Sedes::BigEndianInt]);

/// Handshake message. Never compressed, and tolerant of fields appended by
/// later protocol versions.
pub const HELLO: CommandSchema = CommandSchema::new(
    "Hello",
    0,
    &[
        ("version", Sedes::BigEndianInt),
        ("client_version_string", Sedes::Text),
        ("capabilities", Sedes::CountableList(&CAPABILITY)),
        ("listen_port", Sedes::BigEndianInt),
        ("remote_pubkey", Sedes::Binary),
    ],
)
.lenient()
.uncompressed();

/// Session teardown with a reason code
pub const DISCONNECT: CommandSchema =
    CommandSchema::new("Disconnect", 1, &[("reason", Sedes::BigEndianInt)]);

/// Liveness check
pub const PING: CommandSchema = CommandSchema::new("Ping", 2, &[]);

/// Answer to [`PING`]
pub const PONG: CommandSchema = CommandSchema::new("Pong", 3, &[]);

/// The base (`p2p`) protocol definition
pub const P2P: ProtocolSpec = ProtocolSpec {
    name: "p2p",
    version: P2P_VERSION,
    cmd_length: P2P_CMD_LENGTH,
    commands: &[HELLO, PING, PONG, DISCONNECT],
};
