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

//! Errors that can be raised while building descriptors, compiling
//! codecs, or moving messages over a protocol.
//!
//! The taxonomy mirrors the call path:
//!
//! * [`TransportError`] — I/O failure in the byte stream a protocol
//!   wraps. The stream should be considered dead.
//! * [`ProtocolError`] — malformed or unexpected bytes while encoding
//!   or decoding. The stream is considered corrupt.
//! * [`ApplicationError`] — an exception message received from the
//!   remote endpoint (the `TApplicationException` of other Thrift
//!   runtimes).
//! * [`SchemaError`] — an invalid descriptor or an unclassifiable
//!   type, detected at build or first-compile time. Always a caller
//!   bug, never retried.
//! * [`UserError`] — a service-declared exception decoded from a
//!   reply, carrying the typed exception value.
//!
//! No error is recovered inside the runtime; everything propagates to
//! the caller.

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::string::FromUtf8Error;

use crate::protocol::{
    TFieldIdentifier, TInputProtocol, TOutputProtocol, TStructIdentifier, TType,
};
use crate::value::Value;

/// Error type returned by all runtime operations.
#[derive(Debug)]
pub enum Error {
    /// Failure in the underlying byte stream.
    Transport(TransportError),
    /// Malformed or unexpected bytes on the wire.
    Protocol(ProtocolError),
    /// Exception message received from the remote endpoint.
    Application(ApplicationError),
    /// Invalid descriptor or unclassifiable type.
    Schema(SchemaError),
    /// Service-declared exception decoded from a reply.
    User(UserError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Error::Transport(ref e) => write!(f, "transport error: {}", e),
            Error::Protocol(ref e) => write!(f, "protocol error: {}", e),
            Error::Application(ref e) => write!(f, "application error: {}", e),
            Error::Schema(ref e) => write!(f, "schema error: {}", e),
            Error::User(ref e) => write!(f, "{}", e),
        }
    }
}

impl StdError for Error {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<ApplicationError> for Error {
    fn from(e: ApplicationError) -> Self {
        Error::Application(e)
    }
}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Self {
        Error::Schema(e)
    }
}

impl From<UserError> for Error {
    fn from(e: UserError) -> Self {
        Error::User(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Transport(TransportError::from(e))
    }
}

impl From<FromUtf8Error> for Error {
    fn from(e: FromUtf8Error) -> Self {
        Error::Protocol(ProtocolError::new(
            ProtocolErrorKind::InvalidData,
            e.to_string(),
        ))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Application(ApplicationError::new(ApplicationErrorKind::Unknown, s))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Application(ApplicationError::new(
            ApplicationErrorKind::Unknown,
            s.to_owned(),
        ))
    }
}

/// I/O failure in the byte stream a protocol wraps.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportError {
    /// Transport error variant.
    pub kind: TransportErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl TransportError {
    /// Create a `TransportError`.
    pub fn new<S: Into<String>>(kind: TransportErrorKind, message: S) -> TransportError {
        TransportError {
            kind,
            message: message.into(),
        }
    }
}

/// Transport error categories.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportErrorKind {
    /// Catch-all for I/O failures with no finer classification.
    Unknown,
    /// An operation timed out.
    TimedOut,
    /// The byte stream ended before a full value could be read.
    EndOfFile,
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let kind = match self.kind {
            TransportErrorKind::Unknown => "unknown",
            TransportErrorKind::TimedOut => "timed out",
            TransportErrorKind::EndOfFile => "end of file",
        };
        write!(f, "{} ({})", self.message, kind)
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        let kind = match e.kind() {
            io::ErrorKind::UnexpectedEof => TransportErrorKind::EndOfFile,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportErrorKind::TimedOut,
            _ => TransportErrorKind::Unknown,
        };
        TransportError::new(kind, e.to_string())
    }
}

/// Malformed or unexpected bytes encountered while encoding or
/// decoding. A `ProtocolError` means the stream is corrupt and the
/// connection should be closed by whoever owns it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProtocolError {
    /// Protocol error variant.
    pub kind: ProtocolErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl ProtocolError {
    /// Create a `ProtocolError`.
    pub fn new<S: Into<String>>(kind: ProtocolErrorKind, message: S) -> ProtocolError {
        ProtocolError {
            kind,
            message: message.into(),
        }
    }

    /// Create the error raised when a required field is absent, naming
    /// the struct and field so callers can locate the offending slot.
    pub fn required_field_missing(strukt: &str, field: &str) -> ProtocolError {
        ProtocolError::new(
            ProtocolErrorKind::RequiredFieldMissing,
            format!("missing required field {}.{}", strukt, field),
        )
    }
}

/// Protocol error categories.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProtocolErrorKind {
    /// Catch-all for protocol failures with no finer classification.
    Unknown,
    /// A token, tag byte or value did not conform to the wire format.
    InvalidData,
    /// A version marker did not match what the protocol expects.
    BadVersion,
    /// A message carried an unrecognized message-type value.
    InvalidMessageType,
    /// A required field was absent, on the wire or in the value being
    /// written.
    RequiredFieldMissing,
    /// A reply for a non-void method carried neither a result nor a
    /// declared exception.
    MissingResult,
    /// A size prefix was negative.
    NegativeSize,
    /// A size prefix exceeded the configured limit.
    SizeLimit,
    /// Recursive skipping gave up beyond the maximum nesting depth.
    DepthLimit,
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let kind = match self.kind {
            ProtocolErrorKind::Unknown => "unknown",
            ProtocolErrorKind::InvalidData => "invalid data",
            ProtocolErrorKind::BadVersion => "bad version",
            ProtocolErrorKind::InvalidMessageType => "invalid message type",
            ProtocolErrorKind::RequiredFieldMissing => "required field missing",
            ProtocolErrorKind::MissingResult => "missing result",
            ProtocolErrorKind::NegativeSize => "negative size",
            ProtocolErrorKind::SizeLimit => "size limit exceeded",
            ProtocolErrorKind::DepthLimit => "depth limit exceeded",
        };
        write!(f, "{} ({})", self.message, kind)
    }
}

/// Invalid descriptor or unclassifiable type, raised while building
/// descriptors or compiling a codec for the first time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SchemaError {
    /// Schema error variant.
    pub kind: SchemaErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl SchemaError {
    /// Create a `SchemaError`.
    pub fn new<S: Into<String>>(kind: SchemaErrorKind, message: S) -> SchemaError {
        SchemaError {
            kind,
            message: message.into(),
        }
    }
}

/// Schema error categories.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaErrorKind {
    /// A declared type has no Thrift wire category.
    UnsupportedType,
    /// Two fields, parameters or throws clauses share an id.
    ConflictingIds,
    /// A descriptor violates a structural invariant.
    InvalidDescriptor,
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let kind = match self.kind {
            SchemaErrorKind::UnsupportedType => "unsupported type",
            SchemaErrorKind::ConflictingIds => "conflicting ids",
            SchemaErrorKind::InvalidDescriptor => "invalid descriptor",
        };
        write!(f, "{} ({})", self.message, kind)
    }
}

/// A service-declared exception decoded from a reply message.
///
/// Carries the exception struct's name and its decoded value; the
/// caller maps it back to a typed exception through the method's
/// throws clauses.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserError {
    /// Name of the exception struct, as declared in its descriptor.
    pub exception: String,
    /// The decoded exception value.
    pub value: Value,
}

impl Display for UserError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "service exception {}", self.exception)
    }
}

/// An exception message received from the remote endpoint, equivalent
/// to the `TApplicationException` of other Thrift runtimes.
///
/// On the wire this is a struct with fields `{1: message (string),
/// 2: type (i32)}` carried in a message of type
/// [`Exception`](crate::protocol::TMessageType::Exception).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApplicationError {
    /// Application error variant.
    pub kind: ApplicationErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl ApplicationError {
    /// Create an `ApplicationError`.
    pub fn new<S: Into<String>>(kind: ApplicationErrorKind, message: S) -> ApplicationError {
        ApplicationError {
            kind,
            message: message.into(),
        }
    }

    /// Decode an `ApplicationError` from the body of an `Exception`
    /// message. The message header must already have been consumed.
    pub fn read_from(i_prot: &mut dyn TInputProtocol) -> crate::Result<ApplicationError> {
        let mut message = String::new();
        let mut kind = ApplicationErrorKind::Unknown;

        i_prot.read_struct_begin()?;
        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            match field_ident.id {
                Some(1) => {
                    message = i_prot.read_string()?;
                }
                Some(2) => {
                    kind = ApplicationErrorKind::from(i_prot.read_i32()?);
                }
                _ => {
                    i_prot.skip(field_ident.field_type)?;
                }
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;

        Ok(ApplicationError { kind, message })
    }

    /// Encode an `ApplicationError` as the body of an `Exception`
    /// message. The caller writes the surrounding message envelope.
    pub fn write_to(&self, o_prot: &mut dyn TOutputProtocol) -> crate::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new("TApplicationException"))?;

        o_prot.write_field_begin(&TFieldIdentifier::new("message", TType::String, 1))?;
        o_prot.write_string(&self.message)?;
        o_prot.write_field_end()?;

        o_prot.write_field_begin(&TFieldIdentifier::new("type", TType::I32, 2))?;
        o_prot.write_i32(self.kind as i32)?;
        o_prot.write_field_end()?;

        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }
}

/// Application error categories, with their on-wire values.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplicationErrorKind {
    /// Catch-all.
    Unknown = 0,
    /// The remote service does not implement the requested method.
    UnknownMethod = 1,
    /// The message type was not valid for its position in the exchange.
    InvalidMessageType = 2,
    /// The reply named a different method than the request.
    WrongMethodName = 3,
    /// The reply's sequence number did not match the request's.
    BadSequenceId = 4,
    /// The reply for a non-void method carried no result.
    MissingResult = 5,
    /// The remote service failed internally.
    InternalError = 6,
    /// The remote endpoint could not encode or decode a message.
    ProtocolError = 7,
    /// The remote endpoint rejected the message contents.
    InvalidData = 8,
}

impl From<i32> for ApplicationErrorKind {
    fn from(i: i32) -> Self {
        match i {
            1 => ApplicationErrorKind::UnknownMethod,
            2 => ApplicationErrorKind::InvalidMessageType,
            3 => ApplicationErrorKind::WrongMethodName,
            4 => ApplicationErrorKind::BadSequenceId,
            5 => ApplicationErrorKind::MissingResult,
            6 => ApplicationErrorKind::InternalError,
            7 => ApplicationErrorKind::ProtocolError,
            8 => ApplicationErrorKind::InvalidData,
            _ => ApplicationErrorKind::Unknown,
        }
    }
}

impl Display for ApplicationError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let kind = match self.kind {
            ApplicationErrorKind::Unknown => "unknown",
            ApplicationErrorKind::UnknownMethod => "unknown method",
            ApplicationErrorKind::InvalidMessageType => "invalid message type",
            ApplicationErrorKind::WrongMethodName => "wrong method name",
            ApplicationErrorKind::BadSequenceId => "bad sequence id",
            ApplicationErrorKind::MissingResult => "missing result",
            ApplicationErrorKind::InternalError => "internal error",
            ApplicationErrorKind::ProtocolError => "protocol error",
            ApplicationErrorKind::InvalidData => "invalid data",
        };
        write!(f, "{} ({})", self.message, kind)
    }
}
