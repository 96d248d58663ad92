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

//! The wire-type classifier: maps a declared user-facing type to its
//! normalized Thrift wire classification.

use std::sync::Arc;

use super::{CollectionShape, Converter, StructDescriptor, ThriftType, TypeKind};
use crate::{SchemaError, SchemaErrorKind};

/// A declared user-facing type, as produced by whatever upstream layer
/// turns user declarations into descriptors.
///
/// `UserType` is the input to [`classify`]; [`ThriftType`] is its
/// normalized output.
#[derive(Clone, Debug)]
pub enum UserType {
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
    /// UTF-8 text.
    String,
    /// Raw byte array.
    Binary,
    /// Nullable wrapper over another type.
    Option(Box<UserType>),
    /// Ordered iterable of elements.
    List(Box<UserType>),
    /// Unordered set of unique elements.
    Set(Box<UserType>),
    /// Keyed mapping.
    Map(Box<UserType>, Box<UserType>),
    /// A registered struct.
    Struct(Arc<StructDescriptor>),
    /// A converter-bearing slot, classified by the converter's wire
    /// shape.
    Converted(Arc<Converter>),
}

impl UserType {
    /// Nullable wrapper over `inner`.
    pub fn option(inner: UserType) -> UserType {
        UserType::Option(Box::new(inner))
    }

    /// Ordered iterable of `element`.
    pub fn list(element: UserType) -> UserType {
        UserType::List(Box::new(element))
    }

    /// Unordered set of `element`.
    pub fn set(element: UserType) -> UserType {
        UserType::Set(Box::new(element))
    }

    /// Keyed mapping from `key` to `value`.
    pub fn map(key: UserType, value: UserType) -> UserType {
        UserType::Map(Box::new(key), Box::new(value))
    }
}

/// Classify a declared type into its normalized wire shape.
///
/// Rules, in order:
///
/// 1. a converter-bearing slot is classified by the converter's
///    declared wire shape; the user shape plays no part
/// 2. a nullable wrapper is removed and the result marked nullable, so
///    absence can be encoded through field presence
/// 3. strings and byte arrays both map to the Thrift string category
/// 4. containers are recognized by their element contract and record
///    the [`CollectionShape`] to materialize on read
/// 5. any other composite must be a registered struct
///
/// Anything else — null container elements, nullable map keys, doubly
/// wrapped options, converters nested in converters — fails with
/// `SchemaError(UnsupportedType)`.
pub fn classify(ty: &UserType) -> crate::Result<ThriftType> {
    match ty {
        UserType::Bool => Ok(ThriftType::new(TypeKind::Bool)),
        UserType::Byte => Ok(ThriftType::new(TypeKind::Byte)),
        UserType::I16 => Ok(ThriftType::new(TypeKind::I16)),
        UserType::I32 => Ok(ThriftType::new(TypeKind::I32)),
        UserType::I64 => Ok(ThriftType::new(TypeKind::I64)),
        UserType::Double => Ok(ThriftType::new(TypeKind::Double)),
        UserType::String => Ok(ThriftType::new(TypeKind::String { binary: false })),
        UserType::Binary => Ok(ThriftType::new(TypeKind::String { binary: true })),
        UserType::Option(inner) => {
            if matches!(**inner, UserType::Option(_)) {
                return Err(unsupported("Option cannot wrap another Option"));
            }
            let mut classified = classify(inner)?;
            classified.nullable = true;
            Ok(classified)
        }
        UserType::List(element) => {
            let element = classify_element(element, "list")?;
            Ok(ThriftType::new(TypeKind::List {
                element: Box::new(element),
                shape: CollectionShape::List,
            }))
        }
        UserType::Set(element) => {
            let element = classify_element(element, "set")?;
            Ok(ThriftType::new(TypeKind::Set {
                element: Box::new(element),
                shape: CollectionShape::Set,
            }))
        }
        UserType::Map(key, value) => {
            let key = classify_element(key, "map key")?;
            let value = classify_element(value, "map value")?;
            Ok(ThriftType::new(TypeKind::Map {
                key: Box::new(key),
                value: Box::new(value),
                shape: CollectionShape::Map,
            }))
        }
        UserType::Struct(descriptor) => {
            Ok(ThriftType::new(TypeKind::Struct(descriptor.clone())))
        }
        UserType::Converted(converter) => {
            if matches!(converter.wire_shape(), UserType::Converted(_)) {
                return Err(unsupported(format!(
                    "wire shape of converter {} cannot itself be converted",
                    converter.name()
                )));
            }
            let mut classified = classify(converter.wire_shape())?;
            classified.converter = Some(converter.clone());
            Ok(classified)
        }
    }
}

// Containers have no field-presence mechanism, so their elements can
// never be nullable.
fn classify_element(ty: &UserType, position: &str) -> crate::Result<ThriftType> {
    let classified = classify(ty)?;
    if classified.nullable {
        return Err(unsupported(format!("{} cannot be nullable", position)));
    }
    Ok(classified)
}

fn unsupported<S: Into<String>>(message: S) -> crate::Error {
    SchemaError::new(SchemaErrorKind::UnsupportedType, message).into()
}
