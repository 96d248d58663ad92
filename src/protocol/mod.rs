// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements. See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership. The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License. You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. See the License for the
// specific language governing permissions and limitations
// under the License.

//! The protocol contract: structural tokens and typed primitives that
//! the codec engine reads and writes.
//!
//! A protocol converts between Thrift identifiers/primitives and a raw
//! byte stream. It does not deal with higher-level concepts like
//! structs or exceptions — only with primitives and message or
//! container boundaries. The contract is symmetric: every `write_*` on
//! the sender has a matching `read_*` on the receiver.
//!
//! If any operation returns an `Err` the protocol instance and the
//! stream beneath it should be terminated.
//!
//! # Examples
//!
//! Write a field with the binary encoding, then read it back:
//!
//! ```
//! use std::io::Cursor;
//! use thrift_reflect::protocol::{
//!     TBinaryInputProtocol, TBinaryOutputProtocol, TFieldIdentifier, TInputProtocol,
//!     TOutputProtocol, TType,
//! };
//!
//! let mut buf = Vec::new();
//! {
//!     let mut o_prot = TBinaryOutputProtocol::new(&mut buf, true);
//!     o_prot.write_field_begin(&TFieldIdentifier::new("string_thing", TType::String, 1)).unwrap();
//!     o_prot.write_string("foo").unwrap();
//!     o_prot.write_field_end().unwrap();
//! }
//!
//! let mut i_prot = TBinaryInputProtocol::new(Cursor::new(buf), true);
//! let field_ident = i_prot.read_field_begin().unwrap();
//! let field_contents = i_prot.read_string().unwrap();
//! i_prot.read_field_end().unwrap();
//! assert_eq!(field_contents, "foo");
//! ```

use std::fmt::{self, Display, Formatter};

use crate::{ApplicationError, ApplicationErrorKind, ProtocolError, ProtocolErrorKind};

mod binary;

pub use self::binary::{TBinaryInputProtocol, TBinaryOutputProtocol};

// Maximum depth to which `skip` will recurse into a Thrift field.
// Structs and collections nest, so an adversarial stream could
// otherwise drive unbounded recursion.
const MAXIMUM_SKIP_DEPTH: i8 = 64;

/// Converts a stream of bytes into Thrift identifiers and primitives.
pub trait TInputProtocol {
    /// Read the beginning of a Thrift message.
    fn read_message_begin(&mut self) -> crate::Result<TMessageIdentifier>;
    /// Read the end of a Thrift message.
    fn read_message_end(&mut self) -> crate::Result<()>;
    /// Read the beginning of a Thrift struct.
    fn read_struct_begin(&mut self) -> crate::Result<Option<TStructIdentifier>>;
    /// Read the end of a Thrift struct.
    fn read_struct_end(&mut self) -> crate::Result<()>;
    /// Read the beginning of a Thrift struct field.
    fn read_field_begin(&mut self) -> crate::Result<TFieldIdentifier>;
    /// Read the end of a Thrift struct field.
    fn read_field_end(&mut self) -> crate::Result<()>;
    /// Read a bool.
    fn read_bool(&mut self) -> crate::Result<bool>;
    /// Read a length-prefixed byte array.
    fn read_bytes(&mut self) -> crate::Result<Vec<u8>>;
    /// Read an 8-bit signed integer.
    fn read_i8(&mut self) -> crate::Result<i8>;
    /// Read a 16-bit signed integer.
    fn read_i16(&mut self) -> crate::Result<i16>;
    /// Read a 32-bit signed integer.
    fn read_i32(&mut self) -> crate::Result<i32>;
    /// Read a 64-bit signed integer.
    fn read_i64(&mut self) -> crate::Result<i64>;
    /// Read a 64-bit float.
    fn read_double(&mut self) -> crate::Result<f64>;
    /// Read a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> crate::Result<String>;
    /// Read the beginning of a list.
    fn read_list_begin(&mut self) -> crate::Result<TListIdentifier>;
    /// Read the end of a list.
    fn read_list_end(&mut self) -> crate::Result<()>;
    /// Read the beginning of a set.
    fn read_set_begin(&mut self) -> crate::Result<TSetIdentifier>;
    /// Read the end of a set.
    fn read_set_end(&mut self) -> crate::Result<()>;
    /// Read the beginning of a map.
    fn read_map_begin(&mut self) -> crate::Result<TMapIdentifier>;
    /// Read the end of a map.
    fn read_map_end(&mut self) -> crate::Result<()>;

    /// Consume and discard a value of wire type `field_type`,
    /// recursing up to the default maximum skip depth.
    fn skip(&mut self, field_type: TType) -> crate::Result<()> {
        self.skip_till_depth(field_type, MAXIMUM_SKIP_DEPTH)
    }

    /// Consume and discard a value of wire type `field_type`,
    /// recursing at most `depth` levels.
    fn skip_till_depth(&mut self, field_type: TType, depth: i8) -> crate::Result<()> {
        if depth == 0 {
            return Err(ProtocolError::new(
                ProtocolErrorKind::DepthLimit,
                format!("cannot skip past {}", field_type),
            )
            .into());
        }

        match field_type {
            TType::Bool => self.read_bool().map(|_| ()),
            TType::I08 => self.read_i8().map(|_| ()),
            TType::I16 => self.read_i16().map(|_| ()),
            TType::I32 => self.read_i32().map(|_| ()),
            TType::I64 => self.read_i64().map(|_| ()),
            TType::Double => self.read_double().map(|_| ()),
            TType::String => self.read_bytes().map(|_| ()),
            TType::Struct => {
                self.read_struct_begin()?;
                loop {
                    let field_ident = self.read_field_begin()?;
                    if field_ident.field_type == TType::Stop {
                        break;
                    }
                    self.skip_till_depth(field_ident.field_type, depth - 1)?;
                    self.read_field_end()?;
                }
                self.read_struct_end()
            }
            TType::List => {
                let list_ident = self.read_list_begin()?;
                for _ in 0..list_ident.size {
                    self.skip_till_depth(list_ident.element_type, depth - 1)?;
                }
                self.read_list_end()
            }
            TType::Set => {
                let set_ident = self.read_set_begin()?;
                for _ in 0..set_ident.size {
                    self.skip_till_depth(set_ident.element_type, depth - 1)?;
                }
                self.read_set_end()
            }
            TType::Map => {
                let map_ident = self.read_map_begin()?;
                for _ in 0..map_ident.size {
                    self.skip_till_depth(map_ident.key_type, depth - 1)?;
                    self.skip_till_depth(map_ident.value_type, depth - 1)?;
                }
                self.read_map_end()
            }
            TType::Stop => Err(ProtocolError::new(
                ProtocolErrorKind::InvalidData,
                "cannot skip a stop marker",
            )
            .into()),
        }
    }

    /// Read an unsigned byte.
    ///
    /// Used internally by protocol implementations; codecs never call
    /// this directly.
    fn read_byte(&mut self) -> crate::Result<u8>;
}

/// Converts Thrift identifiers and primitives into a stream of bytes.
///
/// Any or all of the fields in an identifier may be omitted when
/// writing to the stream; write methods may even be noops. All of this
/// is transparent to the caller as long as a matching `TInputProtocol`
/// decodes the bytes on the other side.
pub trait TOutputProtocol {
    /// Write the beginning of a Thrift message.
    fn write_message_begin(&mut self, identifier: &TMessageIdentifier) -> crate::Result<()>;
    /// Write the end of a Thrift message.
    fn write_message_end(&mut self) -> crate::Result<()>;
    /// Write the beginning of a Thrift struct.
    fn write_struct_begin(&mut self, identifier: &TStructIdentifier) -> crate::Result<()>;
    /// Write the end of a Thrift struct.
    fn write_struct_end(&mut self) -> crate::Result<()>;
    /// Write the beginning of a Thrift field.
    fn write_field_begin(&mut self, identifier: &TFieldIdentifier) -> crate::Result<()>;
    /// Write the end of a Thrift field.
    fn write_field_end(&mut self) -> crate::Result<()>;
    /// Write a STOP marker indicating that all fields in the current
    /// struct have been written.
    fn write_field_stop(&mut self) -> crate::Result<()>;
    /// Write a bool.
    fn write_bool(&mut self, b: bool) -> crate::Result<()>;
    /// Write a length-prefixed byte array.
    fn write_bytes(&mut self, b: &[u8]) -> crate::Result<()>;
    /// Write an 8-bit signed integer.
    fn write_i8(&mut self, i: i8) -> crate::Result<()>;
    /// Write a 16-bit signed integer.
    fn write_i16(&mut self, i: i16) -> crate::Result<()>;
    /// Write a 32-bit signed integer.
    fn write_i32(&mut self, i: i32) -> crate::Result<()>;
    /// Write a 64-bit signed integer.
    fn write_i64(&mut self, i: i64) -> crate::Result<()>;
    /// Write a 64-bit float.
    fn write_double(&mut self, d: f64) -> crate::Result<()>;
    /// Write a length-prefixed UTF-8 string.
    fn write_string(&mut self, s: &str) -> crate::Result<()>;
    /// Write the beginning of a list.
    fn write_list_begin(&mut self, identifier: &TListIdentifier) -> crate::Result<()>;
    /// Write the end of a list.
    fn write_list_end(&mut self) -> crate::Result<()>;
    /// Write the beginning of a set.
    fn write_set_begin(&mut self, identifier: &TSetIdentifier) -> crate::Result<()>;
    /// Write the end of a set.
    fn write_set_end(&mut self) -> crate::Result<()>;
    /// Write the beginning of a map.
    fn write_map_begin(&mut self, identifier: &TMapIdentifier) -> crate::Result<()>;
    /// Write the end of a map.
    fn write_map_end(&mut self) -> crate::Result<()>;
    /// Flush buffered bytes to the underlying stream.
    fn flush(&mut self) -> crate::Result<()>;

    /// Write an unsigned byte.
    ///
    /// Used internally by protocol implementations; codecs never call
    /// this directly.
    fn write_byte(&mut self, b: u8) -> crate::Result<()>;
}

impl<P> TInputProtocol for Box<P>
where
    P: TInputProtocol + ?Sized,
{
    fn read_message_begin(&mut self) -> crate::Result<TMessageIdentifier> {
        (**self).read_message_begin()
    }

    fn read_message_end(&mut self) -> crate::Result<()> {
        (**self).read_message_end()
    }

    fn read_struct_begin(&mut self) -> crate::Result<Option<TStructIdentifier>> {
        (**self).read_struct_begin()
    }

    fn read_struct_end(&mut self) -> crate::Result<()> {
        (**self).read_struct_end()
    }

    fn read_field_begin(&mut self) -> crate::Result<TFieldIdentifier> {
        (**self).read_field_begin()
    }

    fn read_field_end(&mut self) -> crate::Result<()> {
        (**self).read_field_end()
    }

    fn read_bool(&mut self) -> crate::Result<bool> {
        (**self).read_bool()
    }

    fn read_bytes(&mut self) -> crate::Result<Vec<u8>> {
        (**self).read_bytes()
    }

    fn read_i8(&mut self) -> crate::Result<i8> {
        (**self).read_i8()
    }

    fn read_i16(&mut self) -> crate::Result<i16> {
        (**self).read_i16()
    }

    fn read_i32(&mut self) -> crate::Result<i32> {
        (**self).read_i32()
    }

    fn read_i64(&mut self) -> crate::Result<i64> {
        (**self).read_i64()
    }

    fn read_double(&mut self) -> crate::Result<f64> {
        (**self).read_double()
    }

    fn read_string(&mut self) -> crate::Result<String> {
        (**self).read_string()
    }

    fn read_list_begin(&mut self) -> crate::Result<TListIdentifier> {
        (**self).read_list_begin()
    }

    fn read_list_end(&mut self) -> crate::Result<()> {
        (**self).read_list_end()
    }

    fn read_set_begin(&mut self) -> crate::Result<TSetIdentifier> {
        (**self).read_set_begin()
    }

    fn read_set_end(&mut self) -> crate::Result<()> {
        (**self).read_set_end()
    }

    fn read_map_begin(&mut self) -> crate::Result<TMapIdentifier> {
        (**self).read_map_begin()
    }

    fn read_map_end(&mut self) -> crate::Result<()> {
        (**self).read_map_end()
    }

    fn read_byte(&mut self) -> crate::Result<u8> {
        (**self).read_byte()
    }
}

impl<P> TOutputProtocol for Box<P>
where
    P: TOutputProtocol + ?Sized,
{
    fn write_message_begin(&mut self, identifier: &TMessageIdentifier) -> crate::Result<()> {
        (**self).write_message_begin(identifier)
    }

    fn write_message_end(&mut self) -> crate::Result<()> {
        (**self).write_message_end()
    }

    fn write_struct_begin(&mut self, identifier: &TStructIdentifier) -> crate::Result<()> {
        (**self).write_struct_begin(identifier)
    }

    fn write_struct_end(&mut self) -> crate::Result<()> {
        (**self).write_struct_end()
    }

    fn write_field_begin(&mut self, identifier: &TFieldIdentifier) -> crate::Result<()> {
        (**self).write_field_begin(identifier)
    }

    fn write_field_end(&mut self) -> crate::Result<()> {
        (**self).write_field_end()
    }

    fn write_field_stop(&mut self) -> crate::Result<()> {
        (**self).write_field_stop()
    }

    fn write_bool(&mut self, b: bool) -> crate::Result<()> {
        (**self).write_bool(b)
    }

    fn write_bytes(&mut self, b: &[u8]) -> crate::Result<()> {
        (**self).write_bytes(b)
    }

    fn write_i8(&mut self, i: i8) -> crate::Result<()> {
        (**self).write_i8(i)
    }

    fn write_i16(&mut self, i: i16) -> crate::Result<()> {
        (**self).write_i16(i)
    }

    fn write_i32(&mut self, i: i32) -> crate::Result<()> {
        (**self).write_i32(i)
    }

    fn write_i64(&mut self, i: i64) -> crate::Result<()> {
        (**self).write_i64(i)
    }

    fn write_double(&mut self, d: f64) -> crate::Result<()> {
        (**self).write_double(d)
    }

    fn write_string(&mut self, s: &str) -> crate::Result<()> {
        (**self).write_string(s)
    }

    fn write_list_begin(&mut self, identifier: &TListIdentifier) -> crate::Result<()> {
        (**self).write_list_begin(identifier)
    }

    fn write_list_end(&mut self) -> crate::Result<()> {
        (**self).write_list_end()
    }

    fn write_set_begin(&mut self, identifier: &TSetIdentifier) -> crate::Result<()> {
        (**self).write_set_begin(identifier)
    }

    fn write_set_end(&mut self) -> crate::Result<()> {
        (**self).write_set_end()
    }

    fn write_map_begin(&mut self, identifier: &TMapIdentifier) -> crate::Result<()> {
        (**self).write_map_begin(identifier)
    }

    fn write_map_end(&mut self) -> crate::Result<()> {
        (**self).write_map_end()
    }

    fn flush(&mut self) -> crate::Result<()> {
        (**self).flush()
    }

    fn write_byte(&mut self, b: u8) -> crate::Result<()> {
        (**self).write_byte(b)
    }
}

/// Thrift message identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TMessageIdentifier {
    /// Service call the message is associated with.
    pub name: String,
    /// Message type.
    pub message_type: TMessageType,
    /// Ordered sequence number identifying the message.
    pub sequence_number: i32,
}

impl TMessageIdentifier {
    /// Create a `TMessageIdentifier` for a service call named `name`
    /// with message type `message_type` and sequence number
    /// `sequence_number`.
    pub fn new<S: Into<String>>(
        name: S,
        message_type: TMessageType,
        sequence_number: i32,
    ) -> TMessageIdentifier {
        TMessageIdentifier {
            name: name.into(),
            message_type,
            sequence_number,
        }
    }
}

/// Thrift struct identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TStructIdentifier {
    /// Name of the encoded Thrift struct.
    pub name: String,
}

impl TStructIdentifier {
    /// Create a `TStructIdentifier` for a struct named `name`.
    pub fn new<S: Into<String>>(name: S) -> TStructIdentifier {
        TStructIdentifier { name: name.into() }
    }
}

/// Thrift field identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TFieldIdentifier {
    /// Name of the Thrift field.
    ///
    /// `None` if it's not sent over the wire.
    pub name: Option<String>,
    /// Field type. A primitive, container, or struct.
    pub field_type: TType,
    /// Thrift field id.
    ///
    /// `None` only if `field_type` is `TType::Stop`.
    pub id: Option<i16>,
}

impl TFieldIdentifier {
    /// Create a `TFieldIdentifier` for a field named `name` with type
    /// `field_type` and field id `id`.
    ///
    /// `id` should be `None` if `field_type` is `TType::Stop`.
    pub fn new<N, S, I>(name: N, field_type: TType, id: I) -> TFieldIdentifier
    where
        N: Into<Option<S>>,
        S: Into<String>,
        I: Into<Option<i16>>,
    {
        TFieldIdentifier {
            name: name.into().map(|n| n.into()),
            field_type,
            id: id.into(),
        }
    }
}

/// Thrift list identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TListIdentifier {
    /// Type of the elements in the list.
    pub element_type: TType,
    /// Number of elements in the list.
    pub size: i32,
}

impl TListIdentifier {
    /// Create a `TListIdentifier` for a list with `size` elements of
    /// type `element_type`.
    pub fn new(element_type: TType, size: i32) -> TListIdentifier {
        TListIdentifier { element_type, size }
    }
}

/// Thrift set identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TSetIdentifier {
    /// Type of the elements in the set.
    pub element_type: TType,
    /// Number of elements in the set.
    pub size: i32,
}

impl TSetIdentifier {
    /// Create a `TSetIdentifier` for a set with `size` elements of
    /// type `element_type`.
    pub fn new(element_type: TType, size: i32) -> TSetIdentifier {
        TSetIdentifier { element_type, size }
    }
}

/// Thrift map identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TMapIdentifier {
    /// Map key type.
    pub key_type: TType,
    /// Map value type.
    pub value_type: TType,
    /// Number of entries in the map.
    pub size: i32,
}

impl TMapIdentifier {
    /// Create a `TMapIdentifier` for a map with `size` entries of type
    /// `key_type -> value_type`.
    pub fn new(key_type: TType, value_type: TType, size: i32) -> TMapIdentifier {
        TMapIdentifier {
            key_type,
            value_type,
            size,
        }
    }
}

/// Thrift message types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TMessageType {
    /// Service-call request.
    Call,
    /// Service-call response.
    Reply,
    /// Unexpected error in the remote service.
    Exception,
    /// One-way service-call request (no response is expected).
    OneWay,
}

impl Display for TMessageType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            TMessageType::Call => write!(f, "Call"),
            TMessageType::Reply => write!(f, "Reply"),
            TMessageType::Exception => write!(f, "Exception"),
            TMessageType::OneWay => write!(f, "OneWay"),
        }
    }
}

impl From<TMessageType> for u8 {
    fn from(message_type: TMessageType) -> Self {
        match message_type {
            TMessageType::Call => 0x01,
            TMessageType::Reply => 0x02,
            TMessageType::Exception => 0x03,
            TMessageType::OneWay => 0x04,
        }
    }
}

impl TryFrom<u8> for TMessageType {
    type Error = crate::Error;

    fn try_from(b: u8) -> crate::Result<Self> {
        match b {
            0x01 => Ok(TMessageType::Call),
            0x02 => Ok(TMessageType::Reply),
            0x03 => Ok(TMessageType::Exception),
            0x04 => Ok(TMessageType::OneWay),
            unkn => Err(ProtocolError::new(
                ProtocolErrorKind::InvalidMessageType,
                format!("cannot convert {} to TMessageType", unkn),
            )
            .into()),
        }
    }
}

/// Thrift struct-field wire categories.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TType {
    /// Indicates that there are no more serialized fields in this
    /// Thrift struct.
    Stop,
    /// Boolean.
    Bool,
    /// Signed 8-bit int.
    I08,
    /// Double-precision number.
    Double,
    /// Signed 16-bit int.
    I16,
    /// Signed 32-bit int.
    I32,
    /// Signed 64-bit int.
    I64,
    /// Byte array or UTF-8 string.
    String,
    /// Thrift struct.
    Struct,
    /// Map.
    Map,
    /// Set.
    Set,
    /// List.
    List,
}

impl Display for TType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            TType::Stop => write!(f, "STOP"),
            TType::Bool => write!(f, "bool"),
            TType::I08 => write!(f, "i08"),
            TType::Double => write!(f, "double"),
            TType::I16 => write!(f, "i16"),
            TType::I32 => write!(f, "i32"),
            TType::I64 => write!(f, "i64"),
            TType::String => write!(f, "string"),
            TType::Struct => write!(f, "struct"),
            TType::Map => write!(f, "map"),
            TType::Set => write!(f, "set"),
            TType::List => write!(f, "list"),
        }
    }
}

/// Compare the expected message sequence number `expected` with the
/// received message sequence number `actual`.
///
/// Return `()` if `actual == expected`, `Err` otherwise.
pub fn verify_expected_sequence_number(expected: i32, actual: i32) -> crate::Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ApplicationError::new(
            ApplicationErrorKind::BadSequenceId,
            format!("expected {} got {}", expected, actual),
        )
        .into())
    }
}

/// Compare the expected service-call name `expected` with the received
/// service-call name `actual`.
///
/// Return `()` if `actual == expected`, `Err` otherwise.
pub fn verify_expected_service_call(expected: &str, actual: &str) -> crate::Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ApplicationError::new(
            ApplicationErrorKind::WrongMethodName,
            format!("expected {} got {}", expected, actual),
        )
        .into())
    }
}

/// Compare the expected message type `expected` with the received
/// message type `actual`.
///
/// Return `()` if `actual == expected`, `Err` otherwise.
pub fn verify_expected_message_type(
    expected: TMessageType,
    actual: TMessageType,
) -> crate::Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ApplicationError::new(
            ApplicationErrorKind::InvalidMessageType,
            format!("expected {} got {}", expected, actual),
        )
        .into())
    }
}

/// Extract the field id from a Thrift field identifier.
///
/// `field_ident` must *not* have a `field_type` of `TType::Stop`.
///
/// Return `TFieldIdentifier.id` if an id exists, `Err` otherwise.
pub fn field_id(field_ident: &TFieldIdentifier) -> crate::Result<i16> {
    field_ident.id.ok_or_else(|| {
        ProtocolError::new(
            ProtocolErrorKind::Unknown,
            format!("missing id in field identifier {:?}", field_ident),
        )
        .into()
    })
}
