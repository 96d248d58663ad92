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

//! End-to-end call-path tests over the binary protocol, with replies
//! fabricated token by token the way a server would emit them.

use std::io::{Cursor, Read};
use std::sync::{Arc, Once, Weak};

use thrift_reflect::codec::{self, Client};
use thrift_reflect::protocol::{
    TBinaryInputProtocol, TBinaryOutputProtocol, TFieldIdentifier, TInputProtocol,
    TListIdentifier, TMessageIdentifier, TMessageType, TOutputProtocol, TStructIdentifier, TType,
};
use thrift_reflect::schema::{MethodDescriptor, StructDescriptor, UserType};
use thrift_reflect::value::{StructValue, Value};
use thrift_reflect::{Error, ProtocolErrorKind};

fn init_logs() {
    static INITIALIZED: Once = Once::new();
    INITIALIZED.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn reply_writer() -> TBinaryOutputProtocol<Vec<u8>> {
    TBinaryOutputProtocol::new(Vec::new(), true)
}

fn reader_for(bytes: Vec<u8>) -> TBinaryInputProtocol<Cursor<Vec<u8>>> {
    TBinaryInputProtocol::new(Cursor::new(bytes), true)
}

fn int_foo() -> Arc<MethodDescriptor> {
    MethodDescriptor::builder("Foo")
        .returns(UserType::I32)
        .build()
        .unwrap()
}

#[test]
fn must_round_trip_required_string_struct() {
    init_logs();

    let descriptor = StructDescriptor::builder("Greeting")
        .required(1, "s", UserType::String)
        .build()
        .unwrap();
    let strukt = codec::struct_codec(&descriptor);

    let mut value = StructValue::new();
    value.set(1, Value::from("hi"));

    let mut o_prot = reply_writer();
    strukt.write(&mut o_prot, &value).unwrap();
    let bytes = o_prot.into_inner();

    // token-level wire shape: FieldBegin(id=1, tag=String); "hi"; FieldStop
    {
        let mut i_prot = reader_for(bytes.clone());
        i_prot.read_struct_begin().unwrap();
        let field_ident = i_prot.read_field_begin().unwrap();
        assert_eq!(field_ident.field_type, TType::String);
        assert_eq!(field_ident.id, Some(1));
        assert_eq!(i_prot.read_string().unwrap(), "hi");
        i_prot.read_field_end().unwrap();
        assert_eq!(
            i_prot.read_field_begin().unwrap().field_type,
            TType::Stop
        );
        i_prot.read_struct_end().unwrap();
    }

    let decoded = strukt.read(&mut reader_for(bytes)).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn must_return_reply_result_value() {
    init_logs();

    let method = int_foo();

    let mut o_prot = reply_writer();
    o_prot
        .write_message_begin(&TMessageIdentifier::new("Foo", TMessageType::Reply, 0))
        .unwrap();
    o_prot
        .write_struct_begin(&TStructIdentifier::new("Foo_result"))
        .unwrap();
    o_prot
        .write_field_begin(&TFieldIdentifier::new("success", TType::I32, 0))
        .unwrap();
    o_prot.write_i32(42).unwrap();
    o_prot.write_field_end().unwrap();
    o_prot.write_field_stop().unwrap();
    o_prot.write_struct_end().unwrap();
    o_prot.write_message_end().unwrap();

    let mut i_prot = reader_for(o_prot.into_inner());
    let result = codec::read_reply(&mut i_prot, &method, Some(0)).unwrap();
    assert_eq!(result, Value::from(42));
}

#[test]
fn must_raise_missing_result_for_empty_reply_struct() {
    init_logs();

    let method = int_foo();

    let mut o_prot = reply_writer();
    o_prot
        .write_message_begin(&TMessageIdentifier::new("Foo", TMessageType::Reply, 0))
        .unwrap();
    o_prot
        .write_struct_begin(&TStructIdentifier::new("Foo_result"))
        .unwrap();
    o_prot.write_field_stop().unwrap();
    o_prot.write_struct_end().unwrap();
    o_prot.write_message_end().unwrap();

    let mut i_prot = reader_for(o_prot.into_inner());
    match codec::read_reply(&mut i_prot, &method, Some(0)) {
        Err(Error::Protocol(e)) => assert_eq!(e.kind, ProtocolErrorKind::MissingResult),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn must_raise_declared_exception_over_missing_result() {
    init_logs();

    let foo_exception = StructDescriptor::builder("FooException")
        .optional(1, "reason", UserType::option(UserType::String))
        .build()
        .unwrap();
    let method = MethodDescriptor::builder("Foo")
        .returns(UserType::I32)
        .throws(1, "ouch", &foo_exception)
        .build()
        .unwrap();

    // reply carries only the throws-clause field; result slot absent
    let mut o_prot = reply_writer();
    o_prot
        .write_message_begin(&TMessageIdentifier::new("Foo", TMessageType::Reply, 0))
        .unwrap();
    o_prot
        .write_struct_begin(&TStructIdentifier::new("Foo_result"))
        .unwrap();
    o_prot
        .write_field_begin(&TFieldIdentifier::new("ouch", TType::Struct, 1))
        .unwrap();
    o_prot
        .write_struct_begin(&TStructIdentifier::new("FooException"))
        .unwrap();
    o_prot
        .write_field_begin(&TFieldIdentifier::new("reason", TType::String, 1))
        .unwrap();
    o_prot.write_string("you asked for it").unwrap();
    o_prot.write_field_end().unwrap();
    o_prot.write_field_stop().unwrap();
    o_prot.write_struct_end().unwrap();
    o_prot.write_field_end().unwrap();
    o_prot.write_field_stop().unwrap();
    o_prot.write_struct_end().unwrap();
    o_prot.write_message_end().unwrap();

    let mut i_prot = reader_for(o_prot.into_inner());
    match codec::read_reply(&mut i_prot, &method, Some(0)) {
        Err(Error::User(e)) => {
            assert_eq!(e.exception, "FooException");
            let fields = e.value.as_struct().unwrap();
            assert_eq!(fields.get(1), Some(&Value::from("you asked for it")));
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn must_write_one_way_call_and_never_read() {
    init_logs();

    let method = MethodDescriptor::builder("Bar")
        .one_way()
        .param(1, "x", UserType::I32)
        .build()
        .unwrap();

    // the input protocol wraps an empty stream: any attempted read
    // would fail with EOF
    let i_prot = reader_for(Vec::new());
    let o_prot = reply_writer();
    let mut client = Client::new(i_prot, o_prot);

    let result = client.call(&method, &[Value::from(7)]).unwrap();
    assert_eq!(result, Value::Null);

    let (_, o_prot) = client.into_protocols();
    let mut i_prot = reader_for(o_prot.into_inner());

    let message_ident = i_prot.read_message_begin().unwrap();
    assert_eq!(
        message_ident,
        TMessageIdentifier::new("Bar", TMessageType::OneWay, 0)
    );
    i_prot.read_struct_begin().unwrap();
    let field_ident = i_prot.read_field_begin().unwrap();
    assert_eq!(field_ident.field_type, TType::I32);
    assert_eq!(field_ident.id, Some(1));
    assert_eq!(i_prot.read_i32().unwrap(), 7);
    i_prot.read_field_end().unwrap();
    assert_eq!(i_prot.read_field_begin().unwrap().field_type, TType::Stop);
    i_prot.read_struct_end().unwrap();
    i_prot.read_message_end().unwrap();
}

#[test]
fn must_skip_unknown_list_of_struct_field_entirely() {
    init_logs();

    let method = int_foo();

    let mut o_prot = reply_writer();
    o_prot
        .write_message_begin(&TMessageIdentifier::new("Foo", TMessageType::Reply, 0))
        .unwrap();
    o_prot
        .write_struct_begin(&TStructIdentifier::new("Foo_result"))
        .unwrap();

    // unknown field 99: a list of two structs, nested content and all
    o_prot
        .write_field_begin(&TFieldIdentifier::new("mystery", TType::List, 99))
        .unwrap();
    o_prot
        .write_list_begin(&TListIdentifier::new(TType::Struct, 2))
        .unwrap();
    for n in 0..2 {
        o_prot
            .write_struct_begin(&TStructIdentifier::new("Mystery"))
            .unwrap();
        o_prot
            .write_field_begin(&TFieldIdentifier::new("n", TType::I64, 1))
            .unwrap();
        o_prot.write_i64(n).unwrap();
        o_prot.write_field_end().unwrap();
        o_prot.write_field_stop().unwrap();
        o_prot.write_struct_end().unwrap();
    }
    o_prot.write_list_end().unwrap();
    o_prot.write_field_end().unwrap();

    // the known result field follows the skipped one
    o_prot
        .write_field_begin(&TFieldIdentifier::new("success", TType::I32, 0))
        .unwrap();
    o_prot.write_i32(42).unwrap();
    o_prot.write_field_end().unwrap();
    o_prot.write_field_stop().unwrap();
    o_prot.write_struct_end().unwrap();
    o_prot.write_message_end().unwrap();

    let mut i_prot = reader_for(o_prot.into_inner());
    let result = codec::read_reply(&mut i_prot, &method, Some(0)).unwrap();
    assert_eq!(result, Value::from(42));
}

#[test]
fn must_track_sequence_numbers_across_calls() {
    init_logs();

    let method = int_foo();

    // two consecutive replies, stamped 0 and 1
    let mut o_prot = reply_writer();
    for sequence_number in 0..2 {
        o_prot
            .write_message_begin(&TMessageIdentifier::new(
                "Foo",
                TMessageType::Reply,
                sequence_number,
            ))
            .unwrap();
        o_prot
            .write_struct_begin(&TStructIdentifier::new("Foo_result"))
            .unwrap();
        o_prot
            .write_field_begin(&TFieldIdentifier::new("success", TType::I32, 0))
            .unwrap();
        o_prot.write_i32(sequence_number * 10).unwrap();
        o_prot.write_field_end().unwrap();
        o_prot.write_field_stop().unwrap();
        o_prot.write_struct_end().unwrap();
        o_prot.write_message_end().unwrap();
    }

    let i_prot = reader_for(o_prot.into_inner());
    let mut client = Client::new(i_prot, reply_writer());

    assert_eq!(client.call(&method, &[]).unwrap(), Value::from(0));
    assert_eq!(client.call(&method, &[]).unwrap(), Value::from(10));
    assert_eq!(client.sequence_number(), 2);
}

/// A byte stream carrying a liveness probe, to show the runtime holds
/// no references to a protocol once a call returns.
struct ProbeStream {
    inner: Cursor<Vec<u8>>,
    probe: Arc<()>,
}

impl Read for ProbeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

#[test]
fn must_not_retain_protocols_after_call_returns() {
    init_logs();

    let method = int_foo();

    let mut o_prot = reply_writer();
    o_prot
        .write_message_begin(&TMessageIdentifier::new("Foo", TMessageType::Reply, 0))
        .unwrap();
    o_prot
        .write_struct_begin(&TStructIdentifier::new("Foo_result"))
        .unwrap();
    o_prot
        .write_field_begin(&TFieldIdentifier::new("success", TType::I32, 0))
        .unwrap();
    o_prot.write_i32(1).unwrap();
    o_prot.write_field_end().unwrap();
    o_prot.write_field_stop().unwrap();
    o_prot.write_struct_end().unwrap();
    o_prot.write_message_end().unwrap();

    let probe = Arc::new(());
    let weak: Weak<()> = Arc::downgrade(&probe);

    let stream = ProbeStream {
        inner: Cursor::new(o_prot.into_inner()),
        probe,
    };
    let mut i_prot = TBinaryInputProtocol::new(stream, true);
    let mut call_writer = reply_writer();

    let result = codec::call(&mut i_prot, &mut call_writer, &method, &[]).unwrap();
    assert_eq!(result, Value::from(1));

    // the caller holds the only reference; dropping the protocol kills
    // the probe
    drop(i_prot);
    assert!(weak.upgrade().is_none());

    // and the memoized codec keeps serving calls without recompiling
    let mut o_prot = reply_writer();
    assert!(codec::write_call(&mut o_prot, &method, &[], 0).is_ok());
}
