//! Declarative command schemas and payloads

use std::collections::BTreeMap;

use bytes::Bytes;

use super::value::{self, Sedes, SedesError, Value};
use super::{Error, Result};

/// Field-name to value mapping of a decoded or outbound payload.
pub type Fields = BTreeMap<String, Value>;

/// Payload of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Named fields, for schemas declared with a field list
    Fields(Fields),
    /// Positional elements, for homogeneous-list schemas
    List(Vec<Value>),
}

impl Payload {
    /// Payload with no fields (Ping, Pong).
    #[must_use]
    pub fn empty() -> Self {
        Self::Fields(Fields::new())
    }

    /// Look up a named field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Fields(fields) => fields.get(name),
            Self::List(_) => None,
        }
    }

    /// Get the field mapping, if this payload has named fields
    #[must_use]
    pub const fn as_fields(&self) -> Option<&Fields> {
        match self {
            Self::Fields(fields) => Some(fields),
            Self::List(_) => None,
        }
    }

    /// Get the elements, if this is a list payload
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            Self::Fields(_) => None,
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Fields(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl From<Vec<Value>> for Payload {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

/// Payload layout of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Structure {
    /// Ordered named fields
    Fields(&'static [(&'static str, Sedes)]),
    /// Homogeneous list of one element type
    Items(Sedes),
}

/// Immutable description of one message type.
///
/// Schemas are plain values compared structurally, so they can key the
/// binding cache and the per-protocol lookup tables directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandSchema {
    /// Command name, used in diagnostics
    pub name: &'static str,
    /// Id relative to the owning protocol's offset
    pub base_id: u64,
    /// Payload layout
    pub structure: Structure,
    /// Reject decoded field lists longer than the schema
    pub decode_strict: bool,
    /// Whether negotiated snappy compression may apply
    pub compressible: bool,
}

impl CommandSchema {
    /// Schema with named fields, strict decoding, compression allowed.
    #[must_use]
    pub const fn new(
        name: &'static str,
        base_id: u64,
        fields: &'static [(&'static str, Sedes)],
    ) -> Self {
        Self {
            name,
            base_id,
            structure: Structure::Fields(fields),
            decode_strict: true,
            compressible: true,
        }
    }

    /// Schema whose payload is a homogeneous list of `element`.
    #[must_use]
    pub const fn items(name: &'static str, base_id: u64, element: Sedes) -> Self {
        Self {
            name,
            base_id,
            structure: Structure::Items(element),
            decode_strict: true,
            compressible: true,
        }
    }

    /// Accept extra trailing fields on decode.
    #[must_use]
    pub const fn lenient(mut self) -> Self {
        self.decode_strict = false;
        self
    }

    /// Never compress this command, whatever the session negotiated.
    #[must_use]
    pub const fn uncompressed(mut self) -> Self {
        self.compressible = false;
        self
    }

    /// Declared field names in wire order (empty for list schemas).
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> {
        let fields: &'static [(&'static str, Sedes)] = match self.structure {
            Structure::Fields(fields) => fields,
            Structure::Items(_) => &[],
        };
        fields.iter().map(|(name, _)| *name)
    }

    fn field_types(fields: &[(&'static str, Sedes)]) -> Vec<Sedes> {
        fields.iter().map(|(_, sedes)| *sedes).collect()
    }

    /// Structured-encode a payload.
    ///
    /// A field mapping must carry exactly the schema's field names; it is
    /// reordered into declaration order before encoding.
    pub fn encode_payload(&self, payload: &Payload) -> Result<Bytes> {
        let invalid = |source: SedesError| Error::InvalidValue {
            command: self.name,
            source,
        };
        match (self.structure, payload) {
            (Structure::Fields(fields), Payload::Fields(data)) => {
                let mut expected: Vec<&'static str> = self.field_names().collect();
                expected.sort_unstable();
                // BTreeMap keys come out sorted.
                if !data.keys().map(String::as_str).eq(expected.iter().copied()) {
                    return Err(Error::FieldMismatch {
                        command: self.name,
                        expected,
                        found: data.keys().cloned().collect(),
                    });
                }
                let ordered: Vec<Value> = fields
                    .iter()
                    .filter_map(|(name, _)| data.get(*name).cloned())
                    .collect();
                value::encode_list(&Self::field_types(fields), &ordered).map_err(invalid)
            }
            (Structure::Fields(fields), Payload::List(items)) => {
                value::encode_list(&Self::field_types(fields), items).map_err(invalid)
            }
            (Structure::Items(element), Payload::List(items)) => {
                value::encode_countable(&element, items).map_err(invalid)
            }
            (Structure::Items(element), Payload::Fields(_)) => {
                Err(invalid(SedesError::UnexpectedShape {
                    expected: element.name(),
                    found: "field mapping",
                }))
            }
        }
    }

    /// Structured-decode a payload.
    pub fn decode_payload(&self, bytes: &[u8]) -> Result<Payload> {
        let malformed = |source: SedesError| Error::MalformedPayload {
            command: self.name,
            source,
        };
        match self.structure {
            Structure::Fields(fields) => {
                let values =
                    value::decode_list(&Self::field_types(fields), self.decode_strict, bytes)
                        .map_err(malformed)?;
                Ok(Payload::Fields(
                    fields
                        .iter()
                        .zip(values)
                        .map(|((name, _), value)| ((*name).to_owned(), value))
                        .collect(),
                ))
            }
            Structure::Items(element) => value::decode_countable(&element, bytes)
                .map(Payload::List)
                .map_err(malformed),
        }
    }
}
