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

//! The struct codec engine: compiles descriptors into cached
//! reader/writer pairs.
//!
//! A [`StructCodec`] is compiled once per descriptor — on first use,
//! through the process-wide cache behind [`struct_codec`] — and then
//! moves [`StructValue`]s across any protocol. Internally every
//! readable/writable slot (struct property, method parameter, return
//! value, throws clause) is normalized into a `WireField`, so the read
//! and write loops are written exactly once.
//!
//! Reading follows Thrift's forward-compatibility rules: unknown field
//! ids and fields whose wire type does not match the descriptor are
//! skipped, never errors. Missing *required* fields are errors, on
//! both read and write.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use ordered_float::OrderedFloat;

use crate::protocol::{
    field_id, TFieldIdentifier, TInputProtocol, TListIdentifier, TMapIdentifier, TOutputProtocol,
    TSetIdentifier, TStructIdentifier, TType,
};
use crate::schema::{
    CollectionShape, FieldDescriptor, MethodDescriptor, ParameterDescriptor, ReturnDescriptor,
    ThriftType, ThrowsDescriptor, TypeKind,
};
use crate::value::{StructValue, Value};
use crate::{ProtocolError, ProtocolErrorKind};

mod cache;
mod message;

pub use self::cache::struct_codec;
pub use self::message::{call, read_reply, write_call, Client};

/// A uniform view of one readable/writable slot.
///
/// Struct properties, method parameters, return values and throws
/// clauses all read and write the same way once normalized; the
/// constructors encode what "presence" means for each site.
#[derive(Debug)]
pub(crate) struct WireField {
    id: i16,
    name: String,
    required: bool,
    default: Option<Value>,
    ty: ThriftType,
}

impl WireField {
    /// A struct property: present when its slot holds a non-null
    /// value.
    pub(crate) fn for_field(field: &FieldDescriptor) -> WireField {
        WireField {
            id: field.id,
            name: field.name.clone(),
            required: field.required,
            default: field.default.clone(),
            ty: field.ty.clone(),
        }
    }

    /// A method parameter: always supplied by the closed argument
    /// tuple, so required unless its type admits absence.
    pub(crate) fn for_parameter(param: &ParameterDescriptor) -> WireField {
        WireField {
            id: param.id,
            name: param.name.clone(),
            required: !param.ty.nullable,
            default: None,
            ty: param.ty.clone(),
        }
    }

    /// A return value: reply-struct field 0, whose presence is tracked
    /// separately from its value because null can be a legal result.
    pub(crate) fn for_return_value(ret: &ReturnDescriptor) -> WireField {
        WireField {
            id: 0,
            name: "success".to_owned(),
            required: false,
            default: None,
            ty: ret.ty.clone(),
        }
    }

    /// A throws clause: presence means the call failed remotely.
    pub(crate) fn for_throws_clause(clause: &ThrowsDescriptor) -> WireField {
        WireField {
            id: clause.id,
            name: clause.name.clone(),
            required: false,
            default: None,
            ty: ThriftType {
                kind: TypeKind::Struct(clause.exception.clone()),
                nullable: true,
                converter: None,
            },
        }
    }
}

/// A compiled reader/writer pair for one struct descriptor.
///
/// Obtained through [`struct_codec`], which compiles on first request
/// and memoizes for the life of the process.
#[derive(Debug)]
pub struct StructCodec {
    name: String,
    fields: Vec<WireField>,
    index: BTreeMap<i16, usize>,
}

impl StructCodec {
    pub(crate) fn compile(descriptor: &crate::schema::StructDescriptor) -> StructCodec {
        StructCodec::from_wire_fields(
            descriptor.name(),
            descriptor.fields().iter().map(WireField::for_field).collect(),
        )
    }

    pub(crate) fn from_wire_fields(name: &str, fields: Vec<WireField>) -> StructCodec {
        let index = fields
            .iter()
            .enumerate()
            .map(|(position, field)| (field.id, position))
            .collect();
        StructCodec {
            name: name.to_owned(),
            fields,
            index,
        }
    }

    /// The name written in struct-begin tokens.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write `value` in descriptor field order.
    ///
    /// Optional fields equal to their default, and absent optional
    /// fields, are elided. An absent required field fails with
    /// `RequiredFieldMissing`.
    pub fn write(
        &self,
        o_prot: &mut dyn TOutputProtocol,
        value: &StructValue,
    ) -> crate::Result<()> {
        o_prot.write_struct_begin(&TStructIdentifier::new(self.name.as_str()))?;
        for field in &self.fields {
            let slot = value.get(field.id);

            if !field.required {
                if let (Some(held), Some(default)) = (slot, field.default.as_ref()) {
                    if held == default {
                        continue;
                    }
                }
            }

            match slot {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(ProtocolError::required_field_missing(
                            &self.name,
                            &field.name,
                        )
                        .into());
                    }
                }
                Some(held) => {
                    o_prot.write_field_begin(&TFieldIdentifier::new(
                        field.name.as_str(),
                        field.ty.wire_type(),
                        field.id,
                    ))?;
                    write_value(o_prot, &field.ty, held)?;
                    o_prot.write_field_end()?;
                }
            }
        }
        o_prot.write_field_stop()?;
        o_prot.write_struct_end()
    }

    /// Read a struct value, skipping unknown and type-mismatched
    /// fields, and enforcing required fields once the stop marker is
    /// reached.
    pub fn read(&self, i_prot: &mut dyn TInputProtocol) -> crate::Result<StructValue> {
        self.read_with_presence(i_prot).map(|(value, _)| value)
    }

    /// Like [`StructCodec::read`], but also report which field ids
    /// were actually present on the wire. Defaults restored for absent
    /// fields do not count as present.
    pub(crate) fn read_with_presence(
        &self,
        i_prot: &mut dyn TInputProtocol,
    ) -> crate::Result<(StructValue, BTreeSet<i16>)> {
        i_prot.read_struct_begin()?;

        let mut value = StructValue::new();
        let mut present = BTreeSet::new();
        for field in &self.fields {
            if !field.required {
                if let Some(default) = &field.default {
                    value.set(field.id, default.clone());
                }
            }
        }

        loop {
            let field_ident = i_prot.read_field_begin()?;
            if field_ident.field_type == TType::Stop {
                break;
            }
            let id = field_id(&field_ident)?;
            match self.index.get(&id).map(|position| &self.fields[*position]) {
                Some(field) if field.ty.wire_type() == field_ident.field_type => {
                    let decoded = read_value(i_prot, &field.ty)?;
                    // duplicate ids on the wire: last one wins
                    value.set(id, decoded);
                    present.insert(id);
                }
                Some(field) => {
                    warn!(
                        "skipping field {}.{}: wire type {} does not match descriptor",
                        self.name, field.name, field_ident.field_type
                    );
                    i_prot.skip(field_ident.field_type)?;
                }
                None => {
                    i_prot.skip(field_ident.field_type)?;
                }
            }
            i_prot.read_field_end()?;
        }
        i_prot.read_struct_end()?;

        for field in &self.fields {
            if field.required && !present.contains(&field.id) {
                return Err(
                    ProtocolError::required_field_missing(&self.name, &field.name).into(),
                );
            }
        }
        Ok((value, present))
    }
}

/// The compiled codecs for one method: its synthesized args struct and
/// its synthesized result struct (`{0: success} ∪ throws clauses`).
#[derive(Debug)]
pub(crate) struct MethodCodecs {
    pub(crate) args: StructCodec,
    pub(crate) result: StructCodec,
}

impl MethodCodecs {
    pub(crate) fn compile(method: &MethodDescriptor) -> MethodCodecs {
        let args = StructCodec::from_wire_fields(
            &format!("{}_args", method.name()),
            method
                .parameters()
                .iter()
                .map(WireField::for_parameter)
                .collect(),
        );

        let mut result_fields = Vec::new();
        if let Some(ret) = method.return_value() {
            result_fields.push(WireField::for_return_value(ret));
        }
        for clause in method.throws() {
            result_fields.push(WireField::for_throws_clause(clause));
        }
        let result =
            StructCodec::from_wire_fields(&format!("{}_result", method.name()), result_fields);

        MethodCodecs { args, result }
    }
}

/// Write one value of type `ty`, applying its converter first so the
/// wire always carries the converter's wire shape.
pub(crate) fn write_value(
    o_prot: &mut dyn TOutputProtocol,
    ty: &ThriftType,
    value: &Value,
) -> crate::Result<()> {
    if let Some(converter) = &ty.converter {
        let wire = converter.to_wire(value)?;
        return write_wire_value(o_prot, ty, &wire);
    }
    write_wire_value(o_prot, ty, value)
}

fn write_wire_value(
    o_prot: &mut dyn TOutputProtocol,
    ty: &ThriftType,
    value: &Value,
) -> crate::Result<()> {
    match (&ty.kind, value) {
        (TypeKind::Bool, Value::Bool(b)) => o_prot.write_bool(*b),
        (TypeKind::Byte, Value::Byte(i)) => o_prot.write_i8(*i),
        (TypeKind::I16, Value::I16(i)) => o_prot.write_i16(*i),
        (TypeKind::I32, Value::I32(i)) => o_prot.write_i32(*i),
        (TypeKind::I64, Value::I64(i)) => o_prot.write_i64(*i),
        (TypeKind::Double, Value::Double(d)) => o_prot.write_double(d.0),
        (TypeKind::String { .. }, Value::String(s)) => o_prot.write_string(s),
        (TypeKind::String { .. }, Value::Binary(b)) => o_prot.write_bytes(b),
        (TypeKind::Struct(descriptor), Value::Struct(fields)) => {
            cache::struct_codec(descriptor).write(o_prot, fields)
        }
        (TypeKind::List { element, .. }, _) => {
            let items = element_iter(value, ty)?;
            o_prot.write_list_begin(&TListIdentifier::new(
                element.wire_type(),
                items.len() as i32,
            ))?;
            for item in items {
                write_value(o_prot, element, item)?;
            }
            o_prot.write_list_end()
        }
        (TypeKind::Set { element, .. }, _) => {
            let items = element_iter(value, ty)?;
            o_prot.write_set_begin(&TSetIdentifier::new(
                element.wire_type(),
                items.len() as i32,
            ))?;
            for item in items {
                write_value(o_prot, element, item)?;
            }
            o_prot.write_set_end()
        }
        (TypeKind::Map { key, value: val, .. }, Value::Map(entries)) => {
            o_prot.write_map_begin(&TMapIdentifier::new(
                key.wire_type(),
                val.wire_type(),
                entries.len() as i32,
            ))?;
            for (entry_key, entry_value) in entries {
                write_value(o_prot, key, entry_key)?;
                write_value(o_prot, val, entry_value)?;
            }
            o_prot.write_map_end()
        }
        (_, unexpected) => Err(encode_mismatch(ty, unexpected)),
    }
}

// Collect the elements of a list- or set-shaped value. Both container
// values are admitted for both wire categories so that a slot's
// collection shape can differ from its wire category.
fn element_iter<'v>(value: &'v Value, ty: &ThriftType) -> crate::Result<Vec<&'v Value>> {
    match value {
        Value::List(items) => Ok(items.iter().collect()),
        Value::Set(items) => Ok(items.iter().collect()),
        unexpected => Err(encode_mismatch(ty, unexpected)),
    }
}

fn encode_mismatch(ty: &ThriftType, value: &Value) -> crate::Error {
    ProtocolError::new(
        ProtocolErrorKind::InvalidData,
        format!("cannot encode {:?} as wire type {}", value, ty.wire_type()),
    )
    .into()
}

/// Read one value of type `ty`, applying its converter after decoding.
pub(crate) fn read_value(
    i_prot: &mut dyn TInputProtocol,
    ty: &ThriftType,
) -> crate::Result<Value> {
    let wire = read_wire_value(i_prot, ty)?;
    match &ty.converter {
        Some(converter) => converter.to_user(wire),
        None => Ok(wire),
    }
}

fn read_wire_value(i_prot: &mut dyn TInputProtocol, ty: &ThriftType) -> crate::Result<Value> {
    match &ty.kind {
        TypeKind::Bool => Ok(Value::Bool(i_prot.read_bool()?)),
        TypeKind::Byte => Ok(Value::Byte(i_prot.read_i8()?)),
        TypeKind::I16 => Ok(Value::I16(i_prot.read_i16()?)),
        TypeKind::I32 => Ok(Value::I32(i_prot.read_i32()?)),
        TypeKind::I64 => Ok(Value::I64(i_prot.read_i64()?)),
        TypeKind::Double => Ok(Value::Double(OrderedFloat(i_prot.read_double()?))),
        TypeKind::String { binary: true } => Ok(Value::Binary(i_prot.read_bytes()?)),
        TypeKind::String { binary: false } => Ok(Value::String(i_prot.read_string()?)),
        TypeKind::Struct(descriptor) => {
            Ok(Value::Struct(cache::struct_codec(descriptor).read(i_prot)?))
        }
        TypeKind::List { element, shape } => {
            let list_ident = i_prot.read_list_begin()?;
            expect_element_type(element.wire_type(), list_ident.element_type)?;
            let size = checked_size(list_ident.size)?;
            let mut items = Vec::with_capacity(size);
            for _ in 0..size {
                items.push(read_value(i_prot, element)?);
            }
            i_prot.read_list_end()?;
            materialize_elements(items, *shape)
        }
        TypeKind::Set { element, shape } => {
            let set_ident = i_prot.read_set_begin()?;
            expect_element_type(element.wire_type(), set_ident.element_type)?;
            let size = checked_size(set_ident.size)?;
            let mut items = Vec::with_capacity(size);
            for _ in 0..size {
                items.push(read_value(i_prot, element)?);
            }
            i_prot.read_set_end()?;
            materialize_elements(items, *shape)
        }
        TypeKind::Map { key, value, shape } => {
            let map_ident = i_prot.read_map_begin()?;
            let size = checked_size(map_ident.size)?;
            if size > 0 {
                expect_element_type(key.wire_type(), map_ident.key_type)?;
                expect_element_type(value.wire_type(), map_ident.value_type)?;
            }
            if *shape != CollectionShape::Map {
                return Err(ProtocolError::new(
                    ProtocolErrorKind::InvalidData,
                    "map wire values can only materialize as maps",
                )
                .into());
            }
            let mut entries = BTreeMap::new();
            for _ in 0..size {
                let entry_key = read_value(i_prot, key)?;
                let entry_value = read_value(i_prot, value)?;
                entries.insert(entry_key, entry_value);
            }
            i_prot.read_map_end()?;
            Ok(Value::Map(entries))
        }
    }
}

fn expect_element_type(expected: TType, actual: TType) -> crate::Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ProtocolError::new(
            ProtocolErrorKind::InvalidData,
            format!("expected element type {} got {}", expected, actual),
        )
        .into())
    }
}

fn checked_size(size: i32) -> crate::Result<usize> {
    usize::try_from(size).map_err(|_| {
        crate::Error::from(ProtocolError::new(
            ProtocolErrorKind::NegativeSize,
            format!("negative container size: {}", size),
        ))
    })
}

fn materialize_elements(items: Vec<Value>, shape: CollectionShape) -> crate::Result<Value> {
    match shape {
        CollectionShape::List => Ok(Value::List(items)),
        CollectionShape::Set => Ok(Value::Set(items.into_iter().collect())),
        CollectionShape::Map => Err(ProtocolError::new(
            ProtocolErrorKind::InvalidData,
            "element sequences cannot materialize as maps",
        )
        .into()),
    }
}
