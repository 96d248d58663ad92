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

//! The message codec: the client↔server RPC envelope around the struct
//! codec engine.
//!
//! A call is a message header, a synthesized args struct, and a flush.
//! A reply is a message header classified into one of three outcomes —
//! a remote [`ApplicationError`], a declared user exception, or a
//! result value — decoded through the method's synthesized result
//! struct (`{0: success} ∪ throws clauses`). One-way calls complete on
//! flush and never read.
//!
//! The stateless [`write_call`]/[`read_reply`] pair leaves sequence
//! numbers to the caller; [`Client`] tracks them per connection and
//! verifies each reply the way generated Thrift clients do.

use std::sync::Arc;

use super::cache;
use crate::protocol::{
    verify_expected_message_type, verify_expected_sequence_number, verify_expected_service_call,
    TInputProtocol, TMessageIdentifier, TMessageType, TOutputProtocol,
};
use crate::schema::MethodDescriptor;
use crate::value::{StructValue, Value};
use crate::{
    ApplicationError, Error, ProtocolError, ProtocolErrorKind, SchemaError, SchemaErrorKind,
    UserError,
};

/// Write a call for `method` with `args` ordered like the method's
/// parameters, then flush the protocol.
///
/// One-way methods are written with the `OneWay` message type; the
/// call is complete once the flush returns.
pub fn write_call(
    o_prot: &mut dyn TOutputProtocol,
    method: &Arc<MethodDescriptor>,
    args: &[Value],
    sequence_number: i32,
) -> crate::Result<()> {
    let parameters = method.parameters();
    if args.len() != parameters.len() {
        return Err(SchemaError::new(
            SchemaErrorKind::InvalidDescriptor,
            format!(
                "method {} takes {} arguments, {} supplied",
                method.name(),
                parameters.len(),
                args.len()
            ),
        )
        .into());
    }

    let message_type = if method.is_one_way() {
        TMessageType::OneWay
    } else {
        TMessageType::Call
    };
    o_prot.write_message_begin(&TMessageIdentifier::new(
        method.name(),
        message_type,
        sequence_number,
    ))?;

    let mut args_value = StructValue::new();
    for (parameter, arg) in parameters.iter().zip(args) {
        args_value.set(parameter.id, arg.clone());
    }
    cache::method_codecs(method).args.write(o_prot, &args_value)?;

    o_prot.write_message_end()?;
    o_prot.flush()
}

/// Read and classify the reply to a call of `method`.
///
/// Must only be invoked for two-way methods. Pass the request's
/// sequence number to have the reply's verified against it; pass
/// `None` to skip that check.
///
/// Outcomes:
///
/// * an `Exception` message decodes into
///   [`Error::Application`](crate::Error::Application)
/// * a `Reply` carrying a declared throws-clause field fails with
///   [`Error::User`](crate::Error::User)
/// * a `Reply` carrying result field 0 returns its value (or
///   [`Value::Null`] for void methods)
/// * a `Reply` carrying neither, for a non-void method, fails with
///   `ProtocolError(MissingResult)`
pub fn read_reply(
    i_prot: &mut dyn TInputProtocol,
    method: &Arc<MethodDescriptor>,
    expected_sequence_number: Option<i32>,
) -> crate::Result<Value> {
    let message_ident = i_prot.read_message_begin()?;
    if let Some(expected) = expected_sequence_number {
        verify_expected_sequence_number(expected, message_ident.sequence_number)?;
    }
    verify_expected_service_call(method.name(), &message_ident.name)?;

    if message_ident.message_type == TMessageType::Exception {
        let remote_error = ApplicationError::read_from(i_prot)?;
        i_prot.read_message_end()?;
        return Err(Error::Application(remote_error));
    }
    verify_expected_message_type(TMessageType::Reply, message_ident.message_type)?;

    let codecs = cache::method_codecs(method);
    let (mut result, present) = codecs.result.read_with_presence(i_prot)?;
    i_prot.read_message_end()?;

    // a present throws clause means the call failed remotely, even if
    // the result slot is also absent
    for clause in method.throws() {
        if present.contains(&clause.id) {
            let value = result.take(clause.id).unwrap_or(Value::Null);
            return Err(UserError {
                exception: clause.exception.name().to_owned(),
                value,
            }
            .into());
        }
    }

    match method.return_value() {
        Some(_) => {
            if present.contains(&0) {
                Ok(result.take(0).unwrap_or(Value::Null))
            } else {
                Err(ProtocolError::new(
                    ProtocolErrorKind::MissingResult,
                    format!("no result received for {}", method.name()),
                )
                .into())
            }
        }
        None => Ok(Value::Null),
    }
}

/// Perform one complete call with sequence number 0: write the request
/// and, for two-way methods, read and classify the reply.
///
/// Returns the decoded result, [`Value::Null`] for void and one-way
/// methods, or the call's failure.
pub fn call(
    i_prot: &mut dyn TInputProtocol,
    o_prot: &mut dyn TOutputProtocol,
    method: &Arc<MethodDescriptor>,
    args: &[Value],
) -> crate::Result<Value> {
    write_call(o_prot, method, args, 0)?;
    if method.is_one_way() {
        return Ok(Value::Null);
    }
    read_reply(i_prot, method, Some(0))
}

/// A dynamic service client owning an input/output protocol pair.
///
/// The runtime's analogue of a generated `*SyncClient`: it tracks a
/// per-connection sequence number, stamps each outgoing call with it,
/// and verifies each reply's name, type and sequence number.
///
/// Protocols are owned for the life of the client and never shared;
/// concurrent in-flight calls need one client (one protocol pair)
/// each.
#[derive(Debug)]
pub struct Client<IP, OP>
where
    IP: TInputProtocol,
    OP: TOutputProtocol,
{
    i_prot: IP,
    o_prot: OP,
    sequence_number: i32,
}

impl<IP, OP> Client<IP, OP>
where
    IP: TInputProtocol,
    OP: TOutputProtocol,
{
    /// Create a client over an input/output protocol pair.
    pub fn new(i_prot: IP, o_prot: OP) -> Client<IP, OP> {
        Client {
            i_prot,
            o_prot,
            sequence_number: 0,
        }
    }

    /// The sequence number the next call will be stamped with.
    pub fn sequence_number(&self) -> i32 {
        self.sequence_number
    }

    /// Invoke `method` with `args` ordered like its parameters.
    pub fn call(
        &mut self,
        method: &Arc<MethodDescriptor>,
        args: &[Value],
    ) -> crate::Result<Value> {
        let sequence_number = self.sequence_number;
        self.sequence_number = self.sequence_number.wrapping_add(1);

        write_call(&mut self.o_prot, method, args, sequence_number)?;
        if method.is_one_way() {
            return Ok(Value::Null);
        }
        read_reply(&mut self.i_prot, method, Some(sequence_number))
    }

    /// Consume the client, returning the protocol pair.
    pub fn into_protocols(self) -> (IP, OP) {
        (self.i_prot, self.o_prot)
    }
}
