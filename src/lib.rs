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

//! A reflective client-side runtime for the Apache Thrift RPC system.
//!
//! Instead of relying on compiler-generated structs and clients, this
//! crate compiles *codecs* at runtime from service descriptors. A
//! descriptor describes a Thrift struct, method or service; the codec
//! engine turns it into a cached reader/writer pair that moves
//! dynamically-typed [`value::Value`]s across any Thrift protocol.
//!
//! The crate is organized bottom-up:
//!
//! * [`protocol`] — the byte-level protocol contract
//!   ([`protocol::TInputProtocol`]/[`protocol::TOutputProtocol`]) and the
//!   binary encoding that implements it
//! * [`value`] — the dynamic value representation
//! * [`schema`] — immutable descriptors for structs, fields, methods and
//!   services, plus the wire-type classifier
//! * [`codec`] — the struct codec engine, the process-wide codec cache
//!   and the message (RPC envelope) layer
//!
//! # Examples
//!
//! Describe a struct, then round-trip a value through the binary
//! protocol:
//!
//! ```
//! use thrift_reflect::codec;
//! use thrift_reflect::protocol::{TBinaryInputProtocol, TBinaryOutputProtocol};
//! use thrift_reflect::schema::{StructDescriptor, UserType};
//! use thrift_reflect::value::{StructValue, Value};
//!
//! let point = StructDescriptor::builder("Point")
//!     .required(1, "x", UserType::I32)
//!     .required(2, "y", UserType::I32)
//!     .build()
//!     .unwrap();
//!
//! let mut v = StructValue::new();
//! v.set(1, Value::from(3));
//! v.set(2, Value::from(4));
//!
//! let mut buf = Vec::new();
//! {
//!     let mut o_prot = TBinaryOutputProtocol::new(&mut buf, true);
//!     codec::struct_codec(&point).write(&mut o_prot, &v).unwrap();
//! }
//!
//! let mut i_prot = TBinaryInputProtocol::new(std::io::Cursor::new(buf), true);
//! let decoded = codec::struct_codec(&point).read(&mut i_prot).unwrap();
//! assert_eq!(decoded, v);
//! ```

pub mod codec;
mod errors;
pub mod protocol;
pub mod schema;
pub mod value;

pub use crate::errors::{
    ApplicationError, ApplicationErrorKind, Error, ProtocolError, ProtocolErrorKind, SchemaError,
    SchemaErrorKind, TransportError, TransportErrorKind, UserError,
};

/// Result type returned by all runtime operations.
pub type Result<T> = std::result::Result<T, self::Error>;
