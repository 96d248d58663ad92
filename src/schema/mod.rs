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

//! Immutable descriptors for Thrift structs, methods and services.
//!
//! Descriptors are the input to the codec engine: an upstream layer
//! (an IDL loader, an attribute parser, or plain code) builds them
//! once at service-registration time through the fluent builders in
//! this module, and the engine compiles them into cached codecs on
//! first use.
//!
//! Builders validate the structural invariants — unique positive field
//! ids, one-way methods with no result or throws — and fail with a
//! [`SchemaError`](crate::SchemaError) on violation. Once built,
//! descriptors are immutable and shared behind [`Arc`]s.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::protocol::TType;
use crate::value::Value;
use crate::{SchemaError, SchemaErrorKind};

mod classify;

pub use self::classify::{classify, UserType};

/// A user-pluggable transformation between a wire-shape value and a
/// user-shape value, attached to a field, parameter or return value at
/// descriptor-build time.
///
/// Both directions are pure functions: `to_user` runs after wire
/// decoding, `to_wire` runs before wire encoding, so the on-wire bytes
/// always reflect [`Converter::wire_shape`].
pub struct Converter {
    name: String,
    wire_shape: UserType,
    to_user: Box<dyn Fn(Value) -> crate::Result<Value> + Send + Sync>,
    to_wire: Box<dyn Fn(&Value) -> crate::Result<Value> + Send + Sync>,
}

impl Converter {
    /// Create a converter named `name` whose on-wire representation is
    /// `wire_shape`.
    pub fn new<U, W>(name: &str, wire_shape: UserType, to_user: U, to_wire: W) -> Arc<Converter>
    where
        U: Fn(Value) -> crate::Result<Value> + Send + Sync + 'static,
        W: Fn(&Value) -> crate::Result<Value> + Send + Sync + 'static,
    {
        Arc::new(Converter {
            name: name.to_owned(),
            wire_shape,
            to_user: Box::new(to_user),
            to_wire: Box::new(to_wire),
        })
    }

    /// The converter's name, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared on-wire shape.
    pub fn wire_shape(&self) -> &UserType {
        &self.wire_shape
    }

    /// Transform a freshly-decoded wire value into its user shape.
    pub fn to_user(&self, wire: Value) -> crate::Result<Value> {
        (self.to_user)(wire)
    }

    /// Transform a user value into its wire shape for encoding.
    pub fn to_wire(&self, user: &Value) -> crate::Result<Value> {
        (self.to_wire)(user)
    }
}

impl Debug for Converter {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Converter")
            .field("name", &self.name)
            .field("wire_shape", &self.wire_shape)
            .finish()
    }
}

/// The user-facing container a collection-typed slot materializes into
/// on read.
///
/// The wire category of a collection (list, set or map tokens) is
/// fixed by [`TypeKind`]; the shape records which container the
/// decoded value should land in, so a wire set can for example be
/// surfaced as an ordered list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CollectionShape {
    /// Materialize as [`Value::List`], preserving wire order.
    List,
    /// Materialize as [`Value::Set`], deduplicating elements.
    Set,
    /// Materialize as [`Value::Map`].
    Map,
}

/// The normalized classification of a slot's wire shape: a wire
/// category plus nullability and an optional converter.
///
/// Produced by [`classify`]; consumed by the codec engine.
#[derive(Clone, Debug)]
pub struct ThriftType {
    /// The wire category.
    pub kind: TypeKind,
    /// Whether the slot admits absence. A nullable slot is encoded by
    /// omitting its field; there is no null on the wire.
    pub nullable: bool,
    /// Converter applied after decoding and before encoding.
    pub converter: Option<Arc<Converter>>,
}

impl ThriftType {
    pub(crate) fn new(kind: TypeKind) -> ThriftType {
        ThriftType {
            kind,
            nullable: false,
            converter: None,
        }
    }

    /// The wire-type tag written in field, list, set and map headers.
    pub fn wire_type(&self) -> TType {
        match self.kind {
            TypeKind::Bool => TType::Bool,
            TypeKind::Byte => TType::I08,
            TypeKind::I16 => TType::I16,
            TypeKind::I32 => TType::I32,
            TypeKind::I64 => TType::I64,
            TypeKind::Double => TType::Double,
            TypeKind::String { .. } => TType::String,
            TypeKind::Struct(_) => TType::Struct,
            TypeKind::List { .. } => TType::List,
            TypeKind::Set { .. } => TType::Set,
            TypeKind::Map { .. } => TType::Map,
        }
    }

    /// Deep shape check: `true` if `value` can be written to a slot of
    /// this type. A converter makes the user shape opaque, so any
    /// value is admitted and the converter arbitrates at write time.
    pub fn accepts(&self, value: &Value) -> bool {
        if self.converter.is_some() {
            return true;
        }
        match (&self.kind, value) {
            (_, Value::Null) => self.nullable,
            (TypeKind::Bool, Value::Bool(_)) => true,
            (TypeKind::Byte, Value::Byte(_)) => true,
            (TypeKind::I16, Value::I16(_)) => true,
            (TypeKind::I32, Value::I32(_)) => true,
            (TypeKind::I64, Value::I64(_)) => true,
            (TypeKind::Double, Value::Double(_)) => true,
            (TypeKind::String { binary: false }, Value::String(_)) => true,
            (TypeKind::String { binary: true }, Value::Binary(_)) => true,
            (TypeKind::Struct(_), Value::Struct(_)) => true,
            (TypeKind::List { element, .. }, Value::List(items)) => {
                items.iter().all(|v| element.accepts(v))
            }
            (TypeKind::Set { element, .. }, Value::Set(items)) => {
                items.iter().all(|v| element.accepts(v))
            }
            (TypeKind::Map { key, value: val, .. }, Value::Map(entries)) => entries
                .iter()
                .all(|(k, v)| key.accepts(k) && val.accepts(v)),
            _ => false,
        }
    }
}

/// The closed set of Thrift wire categories a slot can have.
#[derive(Clone, Debug)]
pub enum TypeKind {
    /// Boolean.
    Bool,
    /// Signed 8-bit int.
    Byte,
    /// Signed 16-bit int.
    I16,
    /// Signed 32-bit int.
    I32,
    /// Signed 64-bit int.
    I64,
    /// Double-precision number.
    Double,
    /// Thrift string: UTF-8 text, or a raw byte array when `binary`.
    String {
        /// Materialize as [`Value::Binary`] instead of [`Value::String`].
        binary: bool,
    },
    /// Nested struct.
    Struct(Arc<StructDescriptor>),
    /// List of elements.
    List {
        /// Element type.
        element: Box<ThriftType>,
        /// Container to materialize on read.
        shape: CollectionShape,
    },
    /// Set of unique elements.
    Set {
        /// Element type.
        element: Box<ThriftType>,
        /// Container to materialize on read.
        shape: CollectionShape,
    },
    /// Mapping from keys to values.
    Map {
        /// Key type.
        key: Box<ThriftType>,
        /// Value type.
        value: Box<ThriftType>,
        /// Container to materialize on read.
        shape: CollectionShape,
    },
}

/// Immutable description of one struct field.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    /// Field id, unique and positive within its struct.
    pub id: i16,
    /// Field name. Informational; never matched on the wire.
    pub name: String,
    /// Whether the field must be present on read and write.
    pub required: bool,
    /// Declared default, restored when the field is absent on the wire
    /// and elided when the written value equals it.
    pub default: Option<Value>,
    /// The field's wire classification.
    pub ty: ThriftType,
}

/// Immutable description of a Thrift struct.
///
/// Built once through [`StructDescriptor::builder`]; the codec engine
/// caches one compiled codec per descriptor instance, so descriptors
/// should be built at registration time and shared.
#[derive(Debug)]
pub struct StructDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl StructDescriptor {
    /// Start building a struct descriptor named `name`.
    pub fn builder(name: &str) -> StructBuilder {
        StructBuilder {
            name: name.to_owned(),
            fields: Vec::new(),
        }
    }

    /// The struct's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fields, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// Fluent builder for [`StructDescriptor`].
#[derive(Debug)]
pub struct StructBuilder {
    name: String,
    fields: Vec<PendingField>,
}

#[derive(Debug)]
struct PendingField {
    id: i16,
    name: String,
    required: Option<bool>,
    default: Option<Value>,
    ty: UserType,
}

impl StructBuilder {
    /// Declare a required field. Reading a stream that omits it, or
    /// writing a value that lacks it, fails with
    /// `RequiredFieldMissing`.
    pub fn required(mut self, id: i16, name: &str, ty: UserType) -> StructBuilder {
        self.fields.push(PendingField {
            id,
            name: name.to_owned(),
            required: Some(true),
            default: None,
            ty,
        });
        self
    }

    /// Declare an optional field with no default.
    pub fn optional(mut self, id: i16, name: &str, ty: UserType) -> StructBuilder {
        self.fields.push(PendingField {
            id,
            name: name.to_owned(),
            required: Some(false),
            default: None,
            ty,
        });
        self
    }

    /// Declare an optional field with a default value. The default is
    /// elided on write and restored when absent on read.
    pub fn optional_with_default(
        mut self,
        id: i16,
        name: &str,
        ty: UserType,
        default: Value,
    ) -> StructBuilder {
        self.fields.push(PendingField {
            id,
            name: name.to_owned(),
            required: Some(false),
            default: Some(default),
            ty,
        });
        self
    }

    /// Declare a field without stating requiredness: nullable slots
    /// become optional, everything else required.
    pub fn field(mut self, id: i16, name: &str, ty: UserType) -> StructBuilder {
        self.fields.push(PendingField {
            id,
            name: name.to_owned(),
            required: None,
            default: None,
            ty,
        });
        self
    }

    /// Classify every field, validate the struct invariants, and
    /// produce the immutable descriptor.
    pub fn build(self) -> crate::Result<Arc<StructDescriptor>> {
        if self.name.is_empty() {
            return Err(SchemaError::new(
                SchemaErrorKind::InvalidDescriptor,
                "struct name cannot be empty",
            )
            .into());
        }

        let mut seen = BTreeMap::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        for pending in self.fields {
            if pending.id <= 0 {
                return Err(SchemaError::new(
                    SchemaErrorKind::InvalidDescriptor,
                    format!(
                        "field {}.{} has non-positive id {}",
                        self.name, pending.name, pending.id
                    ),
                )
                .into());
            }
            if let Some(previous) = seen.insert(pending.id, pending.name.clone()) {
                return Err(SchemaError::new(
                    SchemaErrorKind::ConflictingIds,
                    format!(
                        "fields {}.{} and {}.{} share id {}",
                        self.name, previous, self.name, pending.name, pending.id
                    ),
                )
                .into());
            }

            let ty = classify(&pending.ty)?;
            let required = pending.required.unwrap_or(!ty.nullable);
            if let Some(ref default) = pending.default {
                if !ty.accepts(default) {
                    return Err(SchemaError::new(
                        SchemaErrorKind::InvalidDescriptor,
                        format!(
                            "default for {}.{} does not match its declared type",
                            self.name, pending.name
                        ),
                    )
                    .into());
                }
            }
            fields.push(FieldDescriptor {
                id: pending.id,
                name: pending.name,
                required,
                default: pending.default,
                ty,
            });
        }

        Ok(Arc::new(StructDescriptor {
            name: self.name,
            fields,
        }))
    }
}

/// Immutable description of one method parameter.
#[derive(Clone, Debug)]
pub struct ParameterDescriptor {
    /// Field id the parameter occupies in the synthesized args struct.
    pub id: i16,
    /// Parameter name.
    pub name: String,
    /// The parameter's wire classification.
    pub ty: ThriftType,
}

/// Immutable description of a method's return value.
#[derive(Clone, Debug)]
pub struct ReturnDescriptor {
    /// The return value's wire classification. Carried as field 0 of
    /// the reply struct.
    pub ty: ThriftType,
}

/// Immutable description of one declared exception on a method.
#[derive(Clone, Debug)]
pub struct ThrowsDescriptor {
    /// Field id the exception occupies in the reply struct.
    pub id: i16,
    /// Clause name.
    pub name: String,
    /// The exception struct's descriptor.
    pub exception: Arc<StructDescriptor>,
}

/// Immutable description of a service method.
///
/// Invariant: a one-way method has no return value and no throws
/// clauses.
#[derive(Debug)]
pub struct MethodDescriptor {
    name: String,
    one_way: bool,
    ret: Option<ReturnDescriptor>,
    throws: Vec<ThrowsDescriptor>,
    parameters: Vec<ParameterDescriptor>,
}

impl MethodDescriptor {
    /// Start building a method descriptor named `name`.
    pub fn builder(name: &str) -> MethodBuilder {
        MethodBuilder {
            name: name.to_owned(),
            one_way: false,
            ret: None,
            throws: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// The method's wire name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` if no reply is read for this method.
    pub fn is_one_way(&self) -> bool {
        self.one_way
    }

    /// The return descriptor, or `None` for void.
    pub fn return_value(&self) -> Option<&ReturnDescriptor> {
        self.ret.as_ref()
    }

    /// Declared exceptions, in declaration order.
    pub fn throws(&self) -> &[ThrowsDescriptor] {
        &self.throws
    }

    /// Parameters, in id order.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }
}

/// Fluent builder for [`MethodDescriptor`].
#[derive(Debug)]
pub struct MethodBuilder {
    name: String,
    one_way: bool,
    ret: Option<UserType>,
    throws: Vec<(i16, String, Arc<StructDescriptor>)>,
    parameters: Vec<(i16, String, UserType)>,
}

impl MethodBuilder {
    /// Declare a parameter occupying args-struct field `id`.
    pub fn param(mut self, id: i16, name: &str, ty: UserType) -> MethodBuilder {
        self.parameters.push((id, name.to_owned(), ty));
        self
    }

    /// Declare the return type. Omit for void.
    pub fn returns(mut self, ty: UserType) -> MethodBuilder {
        self.ret = Some(ty);
        self
    }

    /// Declare an exception carried as reply-struct field `id`.
    pub fn throws(mut self, id: i16, name: &str, exception: &Arc<StructDescriptor>) -> MethodBuilder {
        self.throws.push((id, name.to_owned(), exception.clone()));
        self
    }

    /// Mark the method one-way: the call completes on flush and no
    /// reply is ever read.
    pub fn one_way(mut self) -> MethodBuilder {
        self.one_way = true;
        self
    }

    /// Validate the method invariants and produce the immutable
    /// descriptor.
    pub fn build(self) -> crate::Result<Arc<MethodDescriptor>> {
        if self.one_way && (self.ret.is_some() || !self.throws.is_empty()) {
            return Err(SchemaError::new(
                SchemaErrorKind::InvalidDescriptor,
                format!(
                    "one-way method {} cannot declare a return value or throws clauses",
                    self.name
                ),
            )
            .into());
        }

        let mut parameters = Vec::with_capacity(self.parameters.len());
        let mut seen = BTreeMap::new();
        for (id, name, ty) in self.parameters {
            if id <= 0 {
                return Err(SchemaError::new(
                    SchemaErrorKind::InvalidDescriptor,
                    format!("parameter {}.{} has non-positive id {}", self.name, name, id),
                )
                .into());
            }
            if let Some(previous) = seen.insert(id, name.clone()) {
                return Err(SchemaError::new(
                    SchemaErrorKind::ConflictingIds,
                    format!(
                        "parameters {}.{} and {}.{} share id {}",
                        self.name, previous, self.name, name, id
                    ),
                )
                .into());
            }
            parameters.push(ParameterDescriptor {
                id,
                name,
                ty: classify(&ty)?,
            });
        }
        // arguments are serialized in strict id order
        parameters.sort_by_key(|p| p.id);

        let mut throws = Vec::with_capacity(self.throws.len());
        let mut seen = BTreeMap::new();
        for (id, name, exception) in self.throws {
            if id <= 0 {
                return Err(SchemaError::new(
                    SchemaErrorKind::InvalidDescriptor,
                    format!(
                        "throws clause {}.{} has non-positive id {} (0 is the result slot)",
                        self.name, name, id
                    ),
                )
                .into());
            }
            if let Some(previous) = seen.insert(id, name.clone()) {
                return Err(SchemaError::new(
                    SchemaErrorKind::ConflictingIds,
                    format!(
                        "throws clauses {}.{} and {}.{} share id {}",
                        self.name, previous, self.name, name, id
                    ),
                )
                .into());
            }
            throws.push(ThrowsDescriptor {
                id,
                name,
                exception,
            });
        }

        let ret = match self.ret {
            Some(ty) => Some(ReturnDescriptor { ty: classify(&ty)? }),
            None => None,
        };

        Ok(Arc::new(MethodDescriptor {
            name: self.name,
            one_way: self.one_way,
            ret,
            throws,
            parameters,
        }))
    }
}

/// Immutable description of a service: a named set of methods.
#[derive(Debug)]
pub struct ServiceDescriptor {
    name: String,
    methods: BTreeMap<String, Arc<MethodDescriptor>>,
}

impl ServiceDescriptor {
    /// Start building a service descriptor named `name`.
    pub fn builder(name: &str) -> ServiceBuilder {
        ServiceBuilder {
            name: name.to_owned(),
            methods: Vec::new(),
        }
    }

    /// The service's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a method by its user-facing name.
    pub fn method(&self, name: &str) -> Option<&Arc<MethodDescriptor>> {
        self.methods.get(name)
    }

    /// Iterate over the methods in name order.
    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodDescriptor>> {
        self.methods.values()
    }
}

/// Fluent builder for [`ServiceDescriptor`].
#[derive(Debug)]
pub struct ServiceBuilder {
    name: String,
    methods: Vec<Arc<MethodDescriptor>>,
}

impl ServiceBuilder {
    /// Register a method.
    pub fn method(mut self, method: Arc<MethodDescriptor>) -> ServiceBuilder {
        self.methods.push(method);
        self
    }

    /// Validate and produce the immutable descriptor.
    pub fn build(self) -> crate::Result<Arc<ServiceDescriptor>> {
        let mut methods = BTreeMap::new();
        for method in self.methods {
            let name = method.name().to_owned();
            if methods.insert(name.clone(), method).is_some() {
                return Err(SchemaError::new(
                    SchemaErrorKind::InvalidDescriptor,
                    format!("service {} declares method {} twice", self.name, name),
                )
                .into());
            }
        }
        Ok(Arc::new(ServiceDescriptor {
            name: self.name,
            methods,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn assert_schema_error<T: Debug>(result: crate::Result<T>, kind: SchemaErrorKind) {
        match result {
            Err(Error::Schema(e)) => assert_eq!(e.kind, kind),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn must_reject_duplicate_field_ids() {
        let result = StructDescriptor::builder("Dup")
            .required(1, "a", UserType::I32)
            .optional(1, "b", UserType::String)
            .build();
        assert_schema_error(result, SchemaErrorKind::ConflictingIds);
    }

    #[test]
    fn must_reject_non_positive_field_ids() {
        let result = StructDescriptor::builder("Zero")
            .required(0, "a", UserType::I32)
            .build();
        assert_schema_error(result, SchemaErrorKind::InvalidDescriptor);
    }

    #[test]
    fn must_reject_default_of_wrong_shape() {
        let result = StructDescriptor::builder("Bad")
            .optional_with_default(1, "n", UserType::I32, Value::from("nope"))
            .build();
        assert_schema_error(result, SchemaErrorKind::InvalidDescriptor);
    }

    #[test]
    fn must_infer_requiredness_from_nullability() {
        let desc = StructDescriptor::builder("Infer")
            .field(1, "plain", UserType::I32)
            .field(2, "wrapped", UserType::option(UserType::I32))
            .build()
            .unwrap();
        assert!(desc.fields()[0].required);
        assert!(!desc.fields()[1].required);
    }

    #[test]
    fn must_reject_one_way_method_with_return() {
        let result = MethodDescriptor::builder("fire")
            .one_way()
            .returns(UserType::I32)
            .build();
        assert_schema_error(result, SchemaErrorKind::InvalidDescriptor);
    }

    #[test]
    fn must_reject_throws_clause_on_result_slot() {
        let boom = StructDescriptor::builder("Boom")
            .optional(1, "message", UserType::String)
            .build()
            .unwrap();
        let result = MethodDescriptor::builder("go")
            .returns(UserType::I32)
            .throws(0, "boom", &boom)
            .build();
        assert_schema_error(result, SchemaErrorKind::InvalidDescriptor);
    }

    #[test]
    fn must_order_parameters_by_id() {
        let method = MethodDescriptor::builder("swap")
            .param(2, "b", UserType::I32)
            .param(1, "a", UserType::I32)
            .build()
            .unwrap();
        let ids: Vec<i16> = method.parameters().iter().map(|p| p.id).collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn must_look_up_service_methods_by_name() {
        let ping = MethodDescriptor::builder("ping").build().unwrap();
        let service = ServiceDescriptor::builder("Health")
            .method(ping)
            .build()
            .unwrap();
        assert!(service.method("ping").is_some());
        assert!(service.method("pong").is_none());
    }
}
