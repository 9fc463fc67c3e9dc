//! Disconnect reason vocabulary

use std::fmt;

/// Name reported for reason codes outside [`DisconnectReason`].
pub const UNKNOWN_REASON: &str = "unknown reason";

/// Reason codes carried by the `Disconnect` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DisconnectReason {
    /// Disconnect requested
    DisconnectRequested = 0,
    /// TCP sub-system error
    TcpSubSystemError = 1,
    /// Breach of protocol
    BadProtocol = 2,
    /// Useless peer
    UselessPeer = 3,
    /// Too many peers
    TooManyPeers = 4,
    /// Already connected
    AlreadyConnected = 5,
    /// Incompatible P2P protocol version
    IncompatibleP2pVersion = 6,
    /// Null node identity received
    NullNodeIdentityReceived = 7,
    /// Client quitting
    ClientQuitting = 8,
    /// Unexpected identity in handshake
    UnexpectedIdentity = 9,
    /// Identity is the same as this node
    ConnectedToSelf = 10,
    /// Ping timeout
    Timeout = 11,
    /// Some other reason specific to a subprotocol
    SubprotocolError = 16,
}

impl DisconnectReason {
    /// Every reason, in code order
    pub const ALL: [Self; 13] = [
        Self::DisconnectRequested,
        Self::TcpSubSystemError,
        Self::BadProtocol,
        Self::UselessPeer,
        Self::TooManyPeers,
        Self::AlreadyConnected,
        Self::IncompatibleP2pVersion,
        Self::NullNodeIdentityReceived,
        Self::ClientQuitting,
        Self::UnexpectedIdentity,
        Self::ConnectedToSelf,
        Self::Timeout,
        Self::SubprotocolError,
    ];

    /// Convert from a wire code
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::DisconnectRequested),
            1 => Some(Self::TcpSubSystemError),
            2 => Some(Self::BadProtocol),
            3 => Some(Self::UselessPeer),
            4 => Some(Self::TooManyPeers),
            5 => Some(Self::AlreadyConnected),
            6 => Some(Self::IncompatibleP2pVersion),
            7 => Some(Self::NullNodeIdentityReceived),
            8 => Some(Self::ClientQuitting),
            9 => Some(Self::UnexpectedIdentity),
            10 => Some(Self::ConnectedToSelf),
            11 => Some(Self::Timeout),
            16 => Some(Self::SubprotocolError),
            _ => None,
        }
    }

    /// Convert to the wire code
    #[must_use]
    pub const fn code(self) -> u64 {
        self as u64
    }

    /// Snake-case reason name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DisconnectRequested => "disconnect_requested",
            Self::TcpSubSystemError => "tcp_sub_system_error",
            Self::BadProtocol => "bad_protocol",
            Self::UselessPeer => "useless_peer",
            Self::TooManyPeers => "too_many_peers",
            Self::AlreadyConnected => "already_connected",
            Self::IncompatibleP2pVersion => "incompatible_p2p_version",
            Self::NullNodeIdentityReceived => "null_node_identity_received",
            Self::ClientQuitting => "client_quitting",
            Self::UnexpectedIdentity => "unexpected_identity",
            Self::ConnectedToSelf => "connected_to_self",
            Self::Timeout => "timeout",
            Self::SubprotocolError => "subprotocol_error",
        }
    }
}

/// Name for a reason code; codes newer than this enumeration map to
/// [`UNKNOWN_REASON`].
#[must_use]
pub fn reason_name(code: u64) -> &'static str {
    DisconnectReason::from_code(code).map_or(UNKNOWN_REASON, DisconnectReason::name)
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
