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

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use super::{
    TFieldIdentifier, TInputProtocol, TListIdentifier, TMapIdentifier, TMessageIdentifier,
    TMessageType, TOutputProtocol, TSetIdentifier, TStructIdentifier, TType,
};
use crate::{ProtocolError, ProtocolErrorKind};

const BINARY_PROTOCOL_VERSION_1: u32 = 0x8001_0000;

/// Read messages encoded in the Thrift simple binary encoding from any
/// `io::Read` byte stream.
///
/// There are two available modes: `strict` and `non-strict`, where the
/// `non-strict` version does not check for the protocol version in the
/// received message header.
///
/// # Examples
///
/// ```
/// use std::io::Cursor;
/// use thrift_reflect::protocol::{TBinaryInputProtocol, TInputProtocol};
///
/// let bytes = [0x00, 0x00, 0x00, 0x02, 0x68, 0x69];
/// let mut protocol = TBinaryInputProtocol::new(Cursor::new(bytes), true);
/// assert_eq!(protocol.read_string().unwrap(), "hi");
/// ```
#[derive(Debug)]
pub struct TBinaryInputProtocol<R>
where
    R: Read,
{
    strict: bool,
    stream: R,
}

impl<R> TBinaryInputProtocol<R>
where
    R: Read,
{
    /// Create a `TBinaryInputProtocol` that reads bytes from `stream`.
    ///
    /// Set `strict` to `true` if all incoming messages contain the
    /// protocol version number in the protocol header.
    pub fn new(stream: R, strict: bool) -> TBinaryInputProtocol<R> {
        TBinaryInputProtocol { strict, stream }
    }

    /// Consume the protocol, returning the wrapped byte stream.
    pub fn into_inner(self) -> R {
        self.stream
    }
}

impl<R> TInputProtocol for TBinaryInputProtocol<R>
where
    R: Read,
{
    fn read_message_begin(&mut self) -> crate::Result<TMessageIdentifier> {
        let mut first_bytes = [0u8; 4];
        self.stream.read_exact(&mut first_bytes)?;

        // the strict version header is intentionally negative, so the
        // sign bit tells the two framings apart
        if first_bytes[0] >= 0x80 {
            if first_bytes[0..2] != [0x80, 0x01] {
                return Err(ProtocolError::new(
                    ProtocolErrorKind::BadVersion,
                    format!("received bad version: {:?}", &first_bytes[0..2]),
                )
                .into());
            }
            let message_type = TMessageType::try_from(first_bytes[3])?;
            let name = self.read_string()?;
            let sequence_number = self.read_i32()?;
            Ok(TMessageIdentifier::new(name, message_type, sequence_number))
        } else if self.strict {
            // strict mode always requires the version header
            Err(ProtocolError::new(
                ProtocolErrorKind::BadVersion,
                format!("received bad version: {:?}", &first_bytes[0..2]),
            )
            .into())
        } else {
            // in the non-strict framing the message starts with the
            // length-prefixed name; the length is what we just read
            let name_size = BigEndian::read_i32(&first_bytes);
            if name_size < 0 {
                return Err(ProtocolError::new(
                    ProtocolErrorKind::NegativeSize,
                    format!("negative message-name length: {}", name_size),
                )
                .into());
            }
            let mut name_buf = vec![0u8; name_size as usize];
            self.stream.read_exact(&mut name_buf)?;
            let name = String::from_utf8(name_buf)?;

            let message_type = self.read_byte().and_then(TMessageType::try_from)?;
            let sequence_number = self.read_i32()?;
            Ok(TMessageIdentifier::new(name, message_type, sequence_number))
        }
    }

    fn read_message_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> crate::Result<Option<TStructIdentifier>> {
        Ok(None)
    }

    fn read_struct_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> crate::Result<TFieldIdentifier> {
        let field_type_byte = self.read_byte()?;
        let field_type = field_type_from_u8(field_type_byte)?;
        let id = match field_type {
            TType::Stop => Ok(0),
            _ => self.read_i16(),
        }?;
        Ok(TFieldIdentifier::new::<Option<String>, String, i16>(
            None, field_type, id,
        ))
    }

    fn read_field_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn read_bool(&mut self) -> crate::Result<bool> {
        Ok(self.read_i8()? != 0)
    }

    fn read_bytes(&mut self) -> crate::Result<Vec<u8>> {
        let num_bytes = self.stream.read_i32::<BigEndian>()?;
        if num_bytes < 0 {
            return Err(ProtocolError::new(
                ProtocolErrorKind::NegativeSize,
                format!("negative byte-array length: {}", num_bytes),
            )
            .into());
        }
        let mut buf = vec![0u8; num_bytes as usize];
        self.stream.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_i8(&mut self) -> crate::Result<i8> {
        self.stream.read_i8().map_err(From::from)
    }

    fn read_i16(&mut self) -> crate::Result<i16> {
        self.stream.read_i16::<BigEndian>().map_err(From::from)
    }

    fn read_i32(&mut self) -> crate::Result<i32> {
        self.stream.read_i32::<BigEndian>().map_err(From::from)
    }

    fn read_i64(&mut self) -> crate::Result<i64> {
        self.stream.read_i64::<BigEndian>().map_err(From::from)
    }

    fn read_double(&mut self) -> crate::Result<f64> {
        self.stream.read_f64::<BigEndian>().map_err(From::from)
    }

    fn read_string(&mut self) -> crate::Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(From::from)
    }

    fn read_list_begin(&mut self) -> crate::Result<TListIdentifier> {
        let element_type = self.read_byte().and_then(field_type_from_u8)?;
        let size = self.read_i32()?;
        Ok(TListIdentifier::new(element_type, size))
    }

    fn read_list_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn read_set_begin(&mut self) -> crate::Result<TSetIdentifier> {
        let element_type = self.read_byte().and_then(field_type_from_u8)?;
        let size = self.read_i32()?;
        Ok(TSetIdentifier::new(element_type, size))
    }

    fn read_set_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> crate::Result<TMapIdentifier> {
        let key_type = self.read_byte().and_then(field_type_from_u8)?;
        let value_type = self.read_byte().and_then(field_type_from_u8)?;
        let size = self.read_i32()?;
        Ok(TMapIdentifier::new(key_type, value_type, size))
    }

    fn read_map_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    // utility
    //

    fn read_byte(&mut self) -> crate::Result<u8> {
        self.stream.read_u8().map_err(From::from)
    }
}

/// Write messages using the Thrift simple binary encoding to any
/// `io::Write` byte stream.
///
/// There are two available modes: `strict` and `non-strict`, where the
/// `strict` version writes the protocol version number in the outgoing
/// message header and the `non-strict` version does not.
///
/// # Examples
///
/// ```
/// use thrift_reflect::protocol::{TBinaryOutputProtocol, TOutputProtocol};
///
/// let mut buf = Vec::new();
/// let mut protocol = TBinaryOutputProtocol::new(&mut buf, true);
/// protocol.write_bool(true).unwrap();
/// protocol.write_string("test_string").unwrap();
/// ```
#[derive(Debug)]
pub struct TBinaryOutputProtocol<W>
where
    W: Write,
{
    strict: bool,
    stream: W,
}

impl<W> TBinaryOutputProtocol<W>
where
    W: Write,
{
    /// Create a `TBinaryOutputProtocol` that writes bytes to `stream`.
    ///
    /// Set `strict` to `true` if all outgoing messages should contain
    /// the protocol version number in the protocol header.
    pub fn new(stream: W, strict: bool) -> TBinaryOutputProtocol<W> {
        TBinaryOutputProtocol { strict, stream }
    }

    /// Consume the protocol, returning the wrapped byte stream.
    pub fn into_inner(self) -> W {
        self.stream
    }
}

impl<W> TOutputProtocol for TBinaryOutputProtocol<W>
where
    W: Write,
{
    fn write_message_begin(&mut self, identifier: &TMessageIdentifier) -> crate::Result<()> {
        if self.strict {
            let message_type: u8 = identifier.message_type.into();
            let header = BINARY_PROTOCOL_VERSION_1 | u32::from(message_type);
            self.stream.write_u32::<BigEndian>(header)?;
            self.write_string(&identifier.name)?;
            self.write_i32(identifier.sequence_number)
        } else {
            self.write_string(&identifier.name)?;
            self.write_byte(identifier.message_type.into())?;
            self.write_i32(identifier.sequence_number)
        }
    }

    fn write_message_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _: &TStructIdentifier) -> crate::Result<()> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn write_field_begin(&mut self, identifier: &TFieldIdentifier) -> crate::Result<()> {
        if identifier.id.is_none() && identifier.field_type != TType::Stop {
            return Err(ProtocolError::new(
                ProtocolErrorKind::Unknown,
                format!("cannot write identifier {:?} without an id", identifier),
            )
            .into());
        }

        self.write_byte(field_type_to_u8(identifier.field_type))?;
        if let Some(id) = identifier.id {
            self.write_i16(id)?;
        }
        Ok(())
    }

    fn write_field_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> crate::Result<()> {
        self.write_byte(field_type_to_u8(TType::Stop))
    }

    fn write_bool(&mut self, b: bool) -> crate::Result<()> {
        self.write_i8(i8::from(b))
    }

    fn write_bytes(&mut self, b: &[u8]) -> crate::Result<()> {
        self.write_i32(b.len() as i32)?;
        self.stream.write_all(b).map_err(From::from)
    }

    fn write_i8(&mut self, i: i8) -> crate::Result<()> {
        self.stream.write_i8(i).map_err(From::from)
    }

    fn write_i16(&mut self, i: i16) -> crate::Result<()> {
        self.stream.write_i16::<BigEndian>(i).map_err(From::from)
    }

    fn write_i32(&mut self, i: i32) -> crate::Result<()> {
        self.stream.write_i32::<BigEndian>(i).map_err(From::from)
    }

    fn write_i64(&mut self, i: i64) -> crate::Result<()> {
        self.stream.write_i64::<BigEndian>(i).map_err(From::from)
    }

    fn write_double(&mut self, d: f64) -> crate::Result<()> {
        self.stream.write_f64::<BigEndian>(d).map_err(From::from)
    }

    fn write_string(&mut self, s: &str) -> crate::Result<()> {
        self.write_bytes(s.as_bytes())
    }

    fn write_list_begin(&mut self, identifier: &TListIdentifier) -> crate::Result<()> {
        self.write_byte(field_type_to_u8(identifier.element_type))?;
        self.write_i32(identifier.size)
    }

    fn write_list_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn write_set_begin(&mut self, identifier: &TSetIdentifier) -> crate::Result<()> {
        self.write_byte(field_type_to_u8(identifier.element_type))?;
        self.write_i32(identifier.size)
    }

    fn write_set_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn write_map_begin(&mut self, identifier: &TMapIdentifier) -> crate::Result<()> {
        self.write_byte(field_type_to_u8(identifier.key_type))?;
        self.write_byte(field_type_to_u8(identifier.value_type))?;
        self.write_i32(identifier.size)
    }

    fn write_map_end(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> crate::Result<()> {
        self.stream.flush().map_err(From::from)
    }

    // utility
    //

    fn write_byte(&mut self, b: u8) -> crate::Result<()> {
        self.stream.write_u8(b).map_err(From::from)
    }
}

fn field_type_to_u8(field_type: TType) -> u8 {
    match field_type {
        TType::Stop => 0x00,
        TType::Bool => 0x02,
        TType::I08 => 0x03,
        TType::Double => 0x04,
        TType::I16 => 0x06,
        TType::I32 => 0x08,
        TType::I64 => 0x0A,
        TType::String => 0x0B,
        TType::Struct => 0x0C,
        TType::Map => 0x0D,
        TType::Set => 0x0E,
        TType::List => 0x0F,
    }
}

fn field_type_from_u8(b: u8) -> crate::Result<TType> {
    match b {
        0x00 => Ok(TType::Stop),
        0x02 => Ok(TType::Bool),
        0x03 => Ok(TType::I08),
        0x04 => Ok(TType::Double),
        0x06 => Ok(TType::I16),
        0x08 => Ok(TType::I32),
        0x0A => Ok(TType::I64),
        0x0B => Ok(TType::String),
        0x0C => Ok(TType::Struct),
        0x0D => Ok(TType::Map),
        0x0E => Ok(TType::Set),
        0x0F => Ok(TType::List),
        unkn => Err(ProtocolError::new(
            ProtocolErrorKind::InvalidData,
            format!("cannot convert {} to TType", unkn),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::Error;

    fn write_to_buffer<F>(write_fn: F) -> Vec<u8>
    where
        F: FnOnce(&mut TBinaryOutputProtocol<Vec<u8>>) -> crate::Result<()>,
    {
        let mut o_prot = TBinaryOutputProtocol::new(Vec::new(), true);
        write_fn(&mut o_prot).unwrap();
        o_prot.into_inner()
    }

    fn reader_for(bytes: Vec<u8>) -> TBinaryInputProtocol<Cursor<Vec<u8>>> {
        TBinaryInputProtocol::new(Cursor::new(bytes), true)
    }

    #[test]
    fn must_write_strict_message_call_begin() {
        let ident = TMessageIdentifier::new("test", TMessageType::Call, 1);
        let buf = write_to_buffer(|o| o.write_message_begin(&ident));

        #[rustfmt::skip]
        let expected: [u8; 16] = [
            0x80, 0x01, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x04,
            0x74, 0x65, 0x73, 0x74,
            0x00, 0x00, 0x00, 0x01,
        ];
        assert_eq!(buf, expected);
    }

    #[test]
    fn must_write_strict_message_reply_begin() {
        let ident = TMessageIdentifier::new("test", TMessageType::Reply, 10);
        let buf = write_to_buffer(|o| o.write_message_begin(&ident));

        #[rustfmt::skip]
        let expected: [u8; 16] = [
            0x80, 0x01, 0x00, 0x02,
            0x00, 0x00, 0x00, 0x04,
            0x74, 0x65, 0x73, 0x74,
            0x00, 0x00, 0x00, 0x0A,
        ];
        assert_eq!(buf, expected);
    }

    #[test]
    fn must_round_trip_strict_message_begin() {
        let sent_ident = TMessageIdentifier::new("test", TMessageType::Call, 1);
        let buf = write_to_buffer(|o| o.write_message_begin(&sent_ident));

        let received_ident = reader_for(buf).read_message_begin().unwrap();
        assert_eq!(received_ident, sent_ident);
    }

    #[test]
    fn must_round_trip_non_strict_message_begin() {
        let sent_ident = TMessageIdentifier::new("test", TMessageType::Call, 1);

        let mut buf = Vec::new();
        TBinaryOutputProtocol::new(&mut buf, false)
            .write_message_begin(&sent_ident)
            .unwrap();

        let mut i_prot = TBinaryInputProtocol::new(Cursor::new(buf), false);
        assert_eq!(i_prot.read_message_begin().unwrap(), sent_ident);
    }

    #[test]
    fn must_reject_non_strict_message_in_strict_mode() {
        let sent_ident = TMessageIdentifier::new("test", TMessageType::Call, 1);

        let mut buf = Vec::new();
        TBinaryOutputProtocol::new(&mut buf, false)
            .write_message_begin(&sent_ident)
            .unwrap();

        match reader_for(buf).read_message_begin() {
            Err(Error::Protocol(e)) => assert_eq!(e.kind, ProtocolErrorKind::BadVersion),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn must_write_message_end_as_noop() {
        let buf = write_to_buffer(|o| o.write_message_end());
        assert!(buf.is_empty());
    }

    #[test]
    fn must_write_struct_tokens_as_noop() {
        let buf = write_to_buffer(|o| {
            o.write_struct_begin(&TStructIdentifier::new("foo"))?;
            o.write_struct_end()
        });
        assert!(buf.is_empty());
    }

    #[test]
    fn must_write_field_begin() {
        let buf = write_to_buffer(|o| {
            o.write_field_begin(&TFieldIdentifier::new("some_field", TType::String, 22))
        });
        assert_eq!(buf, [0x0B, 0x00, 0x16]);
    }

    #[test]
    fn must_round_trip_field_begin() {
        let buf = write_to_buffer(|o| {
            o.write_field_begin(&TFieldIdentifier::new("foo", TType::I64, 20))
        });

        let received_ident = reader_for(buf).read_field_begin().unwrap();
        let expected_ident = TFieldIdentifier {
            name: None, // not sent over the wire
            field_type: TType::I64,
            id: Some(20),
        };
        assert_eq!(received_ident, expected_ident);
    }

    #[test]
    fn must_write_field_stop() {
        let buf = write_to_buffer(|o| o.write_field_stop());
        assert_eq!(buf, [0x00]);
    }

    #[test]
    fn must_read_field_stop_as_id_zero() {
        let buf = write_to_buffer(|o| o.write_field_stop());

        let received_ident = reader_for(buf).read_field_begin().unwrap();
        let expected_ident = TFieldIdentifier {
            name: None,
            field_type: TType::Stop,
            id: Some(0),
        };
        assert_eq!(received_ident, expected_ident);
    }

    #[test]
    fn must_write_list_begin() {
        let buf = write_to_buffer(|o| o.write_list_begin(&TListIdentifier::new(TType::Bool, 5)));
        assert_eq!(buf, [0x02, 0x00, 0x00, 0x00, 0x05]);
    }

    #[test]
    fn must_round_trip_list_begin() {
        let ident = TListIdentifier::new(TType::List, 900);
        let buf = write_to_buffer(|o| o.write_list_begin(&ident));
        assert_eq!(reader_for(buf).read_list_begin().unwrap(), ident);
    }

    #[test]
    fn must_write_set_begin() {
        let buf = write_to_buffer(|o| o.write_set_begin(&TSetIdentifier::new(TType::I16, 7)));
        assert_eq!(buf, [0x06, 0x00, 0x00, 0x00, 0x07]);
    }

    #[test]
    fn must_write_map_begin() {
        let buf = write_to_buffer(|o| {
            o.write_map_begin(&TMapIdentifier::new(TType::I64, TType::Struct, 32))
        });
        assert_eq!(buf, [0x0A, 0x0C, 0x00, 0x00, 0x00, 0x20]);
    }

    #[test]
    fn must_round_trip_map_begin() {
        let ident = TMapIdentifier::new(TType::Map, TType::Set, 100);
        let buf = write_to_buffer(|o| o.write_map_begin(&ident));
        assert_eq!(reader_for(buf).read_map_begin().unwrap(), ident);
    }

    #[test]
    fn must_write_bool_true_and_false() {
        let buf = write_to_buffer(|o| {
            o.write_bool(true)?;
            o.write_bool(false)
        });
        assert_eq!(buf, [0x01, 0x00]);
    }

    #[test]
    fn must_read_any_non_zero_byte_as_bool_true() {
        let mut i_prot = reader_for(vec![0xAC]);
        assert!(i_prot.read_bool().unwrap());
    }

    #[test]
    fn must_round_trip_bytes() {
        let bytes: [u8; 10] = [0x0A, 0xCC, 0xD1, 0x84, 0x99, 0x12, 0xAB, 0xBB, 0x45, 0xDF];
        let buf = write_to_buffer(|o| o.write_bytes(&bytes));

        assert_eq!(&buf[0..4], [0x00, 0x00, 0x00, 0x0A]); // length prefix
        assert_eq!(&buf[4..], bytes);

        assert_eq!(reader_for(buf).read_bytes().unwrap(), bytes);
    }

    #[test]
    fn must_reject_negative_byte_array_length() {
        let mut i_prot = reader_for(vec![0xFF, 0xFF, 0xFF, 0xFF]);
        match i_prot.read_bytes() {
            Err(Error::Protocol(e)) => assert_eq!(e.kind, ProtocolErrorKind::NegativeSize),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn must_surface_truncation_as_transport_eof() {
        // length prefix says 4 bytes, stream holds 2
        let mut i_prot = reader_for(vec![0x00, 0x00, 0x00, 0x04, 0x68, 0x69]);
        match i_prot.read_bytes() {
            Err(Error::Transport(e)) => {
                assert_eq!(e.kind, crate::TransportErrorKind::EndOfFile)
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn must_round_trip_scalars() {
        let buf = write_to_buffer(|o| {
            o.write_i8(-1)?;
            o.write_i16(-300)?;
            o.write_i32(70_000)?;
            o.write_i64(-2_000_000_000_000)?;
            o.write_double(3.141_592_653_589_793)?;
            o.write_string("over the wire")
        });

        let mut i_prot = reader_for(buf);
        assert_eq!(i_prot.read_i8().unwrap(), -1);
        assert_eq!(i_prot.read_i16().unwrap(), -300);
        assert_eq!(i_prot.read_i32().unwrap(), 70_000);
        assert_eq!(i_prot.read_i64().unwrap(), -2_000_000_000_000);
        assert_eq!(i_prot.read_double().unwrap(), 3.141_592_653_589_793);
        assert_eq!(i_prot.read_string().unwrap(), "over the wire");
    }

    #[test]
    fn must_reject_unknown_field_type_byte() {
        let mut i_prot = reader_for(vec![0x99]);
        match i_prot.read_field_begin() {
            Err(Error::Protocol(e)) => assert_eq!(e.kind, ProtocolErrorKind::InvalidData),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
