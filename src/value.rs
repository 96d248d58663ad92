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

//! The dynamic value representation moved by compiled codecs.
//!
//! Every Thrift wire shape has a [`Value`] variant. Doubles are stored
//! as [`OrderedFloat`] so that values have a total order and can be
//! hashed, which lets any value act as a set element or map key the
//! way the Thrift type system allows.
//!
//! [`Value::Null`] represents *absence*: an optional field that was
//! never set, or the unit result of a void method. There is no null on
//! the wire — absence is encoded by omitting the field entirely.

use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;

/// A dynamically-typed Thrift value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 8-bit int.
    Byte(i8),
    /// Signed 16-bit int.
    I16(i16),
    /// Signed 32-bit int.
    I32(i32),
    /// Signed 64-bit int.
    I64(i64),
    /// Double-precision number, totally ordered.
    Double(OrderedFloat<f64>),
    /// UTF-8 string.
    String(String),
    /// Raw byte array.
    Binary(Vec<u8>),
    /// Ordered sequence of elements.
    List(Vec<Value>),
    /// Sorted set of unique elements.
    Set(BTreeSet<Value>),
    /// Sorted mapping from keys to values.
    Map(BTreeMap<Value, Value>),
    /// Struct value: fields keyed by field id.
    Struct(StructValue),
}

impl Value {
    /// `true` if this value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Extract a `bool`, if this value holds one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract an `i32`, if this value holds one.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract an `i64`, if this value holds one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract an `f64`, if this value holds one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(d.0),
            _ => None,
        }
    }

    /// Extract a string slice, if this value holds a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extract a struct value, if this value holds one.
    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i8> for Value {
    fn from(i: i8) -> Self {
        Value::Byte(i)
    }
}

impl From<i16> for Value {
    fn from(i: i16) -> Self {
        Value::I16(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::I32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::I64(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(OrderedFloat(d))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

/// A struct value: a sparse mapping from field id to field value.
///
/// A field that was never set has no entry; a decoded stream that
/// carries the same id twice keeps the later value.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructValue {
    fields: BTreeMap<i16, Value>,
}

impl StructValue {
    /// Create an empty struct value.
    pub fn new() -> StructValue {
        StructValue {
            fields: BTreeMap::new(),
        }
    }

    /// Set field `id` to `value`, replacing any previous value.
    pub fn set(&mut self, id: i16, value: Value) {
        self.fields.insert(id, value);
    }

    /// The value of field `id`, if set.
    pub fn get(&self, id: i16) -> Option<&Value> {
        self.fields.get(&id)
    }

    /// Remove and return the value of field `id`, if set.
    pub fn take(&mut self, id: i16) -> Option<Value> {
        self.fields.remove(&id)
    }

    /// `true` if field `id` has been set.
    pub fn contains(&self, id: i16) -> bool {
        self.fields.contains_key(&id)
    }

    /// Iterate over `(id, value)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (i16, &Value)> {
        self.fields.iter().map(|(id, v)| (*id, v))
    }

    /// Number of fields that have been set.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if no field has been set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
