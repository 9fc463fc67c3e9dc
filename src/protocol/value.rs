//! Typed values and element types layered over RLP
//!
//! [`Value`] is what applications put into and get out of a payload;
//! [`Sedes`] says how a value is laid out on the wire. The actual byte-level
//! work is done by the `rlp` crate.

use std::fmt;

use bytes::Bytes;
use rlp::{DecoderError, Rlp, RlpStream};
use thiserror::Error;

/// Failure to map between a [`Value`] and its RLP encoding.
#[derive(Error, Debug)]
pub enum SedesError {
    /// Byte-level RLP failure
    #[error("rlp: {0}")]
    Rlp(#[from] DecoderError),

    /// Value or item has the wrong shape for the element type
    #[error("expected {expected}, found {found}")]
    UnexpectedShape {
        /// Element type name
        expected: &'static str,
        /// What was found instead
        found: &'static str,
    },

    /// Fixed-shape list has the wrong number of elements
    #[error("list has {found} elements, expected {expected}")]
    ListLength {
        /// Number of element types
        expected: usize,
        /// Number of elements present
        found: usize,
    },

    /// Text item is not valid UTF-8
    #[error("text is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Input ends before the item it announces
    #[error("truncated item: need {needed} bytes, got {got}")]
    Truncated {
        /// Bytes announced by the item header
        needed: usize,
        /// Bytes available
        got: usize,
    },

    /// Non-padding bytes follow the top-level item
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

/// A dynamically typed payload value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Unsigned integer, big-endian without leading zeros on the wire
    Uint(u64),
    /// UTF-8 text
    Text(String),
    /// Opaque bytes
    Bytes(Bytes),
    /// Nested list
    List(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
        }
    }

    /// Get the integer, if this is one
    #[must_use]
    pub const fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the text, if this is text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Get the bytes, if this is a byte string
    #[must_use]
    pub const fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Get the elements, if this is a list
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

/// Wire element type of a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sedes {
    /// Canonical big-endian unsigned integer
    BigEndianInt,
    /// UTF-8 text as a byte string
    Text,
    /// Raw byte string
    Binary,
    /// Fixed-shape list, one element type per position
    List(&'static [Sedes]),
    /// Homogeneous list of any length
    CountableList(&'static Sedes),
}

impl Sedes {
    /// Short name used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BigEndianInt => "uint",
            Self::Text => "text",
            Self::Binary => "bytes",
            Self::List(_) => "list",
            Self::CountableList(_) => "countable list",
        }
    }

    fn append(&self, value: &Value, stream: &mut RlpStream) -> Result<(), SedesError> {
        match (self, value) {
            (Self::BigEndianInt, Value::Uint(v)) => {
                stream.append(v);
            }
            (Self::Text, Value::Text(v)) => {
                stream.append(&v.as_bytes().to_vec());
            }
            (Self::Binary, Value::Bytes(v)) => {
                stream.append(&v.to_vec());
            }
            (Self::List(types), Value::List(items)) => append_list(types, items, stream)?,
            (Self::CountableList(element), Value::List(items)) => {
                append_countable(element, items, stream)?;
            }
            _ => {
                return Err(SedesError::UnexpectedShape {
                    expected: self.name(),
                    found: value.kind_name(),
                });
            }
        }
        Ok(())
    }

    fn decode(&self, rlp: &Rlp<'_>) -> Result<Value, SedesError> {
        match self {
            Self::BigEndianInt => {
                expect_data(self, rlp)?;
                Ok(Value::Uint(rlp.as_val::<u64>()?))
            }
            Self::Text => {
                expect_data(self, rlp)?;
                Ok(Value::Text(String::from_utf8(rlp.data()?.to_vec())?))
            }
            Self::Binary => {
                expect_data(self, rlp)?;
                Ok(Value::Bytes(Bytes::copy_from_slice(rlp.data()?)))
            }
            Self::List(types) => Ok(Value::List(decode_items(types, true, rlp)?)),
            Self::CountableList(element) => Ok(Value::List(decode_countable_items(element, rlp)?)),
        }
    }
}

fn expect_data(sedes: &Sedes, rlp: &Rlp<'_>) -> Result<(), SedesError> {
    if rlp.is_list() {
        return Err(SedesError::UnexpectedShape {
            expected: sedes.name(),
            found: "list",
        });
    }
    Ok(())
}

fn append_list(types: &[Sedes], items: &[Value], stream: &mut RlpStream) -> Result<(), SedesError> {
    if types.len() != items.len() {
        return Err(SedesError::ListLength {
            expected: types.len(),
            found: items.len(),
        });
    }
    stream.begin_list(items.len());
    for (sedes, item) in types.iter().zip(items) {
        sedes.append(item, stream)?;
    }
    Ok(())
}

fn append_countable(
    element: &Sedes,
    items: &[Value],
    stream: &mut RlpStream,
) -> Result<(), SedesError> {
    stream.begin_list(items.len());
    for item in items {
        element.append(item, stream)?;
    }
    Ok(())
}

fn decode_items(types: &[Sedes], strict: bool, rlp: &Rlp<'_>) -> Result<Vec<Value>, SedesError> {
    if !rlp.is_list() {
        return Err(SedesError::UnexpectedShape {
            expected: "list",
            found: "bytes",
        });
    }
    let count = rlp.item_count()?;
    // Non-strict lists accept extra trailing elements but never missing ones.
    if count < types.len() || (strict && count != types.len()) {
        return Err(SedesError::ListLength {
            expected: types.len(),
            found: count,
        });
    }
    types
        .iter()
        .enumerate()
        .map(|(index, sedes)| sedes.decode(&rlp.at(index)?))
        .collect()
}

fn decode_countable_items(element: &Sedes, rlp: &Rlp<'_>) -> Result<Vec<Value>, SedesError> {
    if !rlp.is_list() {
        return Err(SedesError::UnexpectedShape {
            expected: "countable list",
            found: "bytes",
        });
    }
    (0..rlp.item_count()?)
        .map(|index| element.decode(&rlp.at(index)?))
        .collect()
}

/// Length of the first RLP item in `bytes`, header included.
pub(crate) fn item_len(bytes: &[u8]) -> Result<usize, SedesError> {
    let info = Rlp::new(bytes).payload_info()?;
    let needed = info.header_len + info.value_len;
    if needed > bytes.len() {
        return Err(SedesError::Truncated {
            needed,
            got: bytes.len(),
        });
    }
    Ok(needed)
}

// Only zero padding may follow the top-level item.
fn top_level(bytes: &[u8]) -> Result<Rlp<'_>, SedesError> {
    let len = item_len(bytes)?;
    let trailing = &bytes[len..];
    if trailing.iter().any(|b| *b != 0) {
        return Err(SedesError::TrailingBytes(trailing.len()));
    }
    Ok(Rlp::new(&bytes[..len]))
}

/// Encode `values` as a fixed-shape list.
pub fn encode_list(types: &[Sedes], values: &[Value]) -> Result<Bytes, SedesError> {
    let mut stream = RlpStream::new();
    append_list(types, values, &mut stream)?;
    Ok(stream.out().freeze())
}

/// Encode `values` as a homogeneous list.
pub fn encode_countable(element: &Sedes, values: &[Value]) -> Result<Bytes, SedesError> {
    let mut stream = RlpStream::new();
    append_countable(element, values, &mut stream)?;
    Ok(stream.out().freeze())
}

/// Decode a fixed-shape list. With `strict == false`, elements beyond
/// `types` are accepted and dropped.
pub fn decode_list(types: &[Sedes], strict: bool, bytes: &[u8]) -> Result<Vec<Value>, SedesError> {
    decode_items(types, strict, &top_level(bytes)?)
}

/// Decode a homogeneous list.
pub fn decode_countable(element: &Sedes, bytes: &[u8]) -> Result<Vec<Value>, SedesError> {
    decode_countable_items(element, &top_level(bytes)?)
}

/// Encode a single unsigned integer.
#[must_use]
pub fn encode_uint(value: u64) -> Bytes {
    rlp::encode(&value).freeze()
}

/// Decode the unsigned integer at the start of `bytes`, returning it with the
/// number of bytes it occupied.
pub fn decode_uint_prefix(bytes: &[u8]) -> Result<(u64, usize), SedesError> {
    let len = item_len(bytes)?;
    let rlp = Rlp::new(&bytes[..len]);
    expect_data(&Sedes::BigEndianInt, &rlp)?;
    Ok((rlp.as_val::<u64>()?, len))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => {
                write!(f, "0x")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}
