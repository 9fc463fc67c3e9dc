//! Local node identity announced in `Hello`

use std::fmt;

use bytes::Bytes;

use crate::protocol::{Payload, Value};

/// A subprotocol capability advertised during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capability {
    /// Capability name (`eth`, `les`, ...)
    pub name: String,
    /// Capability version
    pub version: u64,
}

impl Capability {
    /// Create a capability
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Read a `[name, version]` pair.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_list()? {
            [name, version] => Some(Self::new(name.as_text()?, version.as_uint()?)),
            _ => None,
        }
    }
}

impl From<&Capability> for Value {
    fn from(cap: &Capability) -> Self {
        Self::List(vec![
            Self::Text(cap.name.clone()),
            Self::Uint(cap.version),
        ])
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Client identifier sent in `Hello`: `<crate>/v<version>/<os>-<arch>/rust`.
#[must_use]
pub fn client_identifier() -> String {
    format!(
        "{}/v{}/{}-{}/rust",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Handshake data of the local node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Client version string
    pub client_version_string: String,
    /// Capabilities offered to the remote
    pub capabilities: Vec<Capability>,
    /// TCP listen port, 0 when not listening
    pub listen_port: u16,
    /// Node public key (64 bytes, uncompressed secp256k1 without prefix)
    pub public_key: Bytes,
}

impl LocalIdentity {
    /// Identity with the default client identifier.
    pub fn new(
        capabilities: Vec<Capability>,
        listen_port: u16,
        public_key: impl Into<Bytes>,
    ) -> Self {
        Self {
            client_version_string: client_identifier(),
            capabilities,
            listen_port,
            public_key: public_key.into(),
        }
    }
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new(Vec::new(), 30303, Bytes::new())
    }
}

/// Typed view of a decoded `Hello` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloInfo {
    /// Base protocol version of the remote
    pub version: u64,
    /// Remote client identifier
    pub client_version_string: String,
    /// Capabilities the remote offers
    pub capabilities: Vec<Capability>,
    /// Remote listen port
    pub listen_port: u64,
    /// Remote node public key
    pub remote_pubkey: Bytes,
}

impl HelloInfo {
    /// Read the fields of a decoded `Hello` payload.
    #[must_use]
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        Some(Self {
            version: payload.get("version")?.as_uint()?,
            client_version_string: payload.get("client_version_string")?.as_text()?.to_owned(),
            capabilities: payload
                .get("capabilities")?
                .as_list()?
                .iter()
                .map(Capability::from_value)
                .collect::<Option<_>>()?,
            listen_port: payload.get("listen_port")?.as_uint()?,
            remote_pubkey: payload.get("remote_pubkey")?.as_bytes()?.clone(),
        })
    }
}
