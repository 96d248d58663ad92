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

//! The process-wide codec cache: descriptor identity → compiled codec.
//!
//! Codecs are compiled on first request and never evicted. The cache
//! is keyed by descriptor *identity* (the `Arc` allocation), not by
//! structural equality, and it retains the descriptor so a key can
//! never be reused by a later allocation. Racing threads may each
//! compile the same descriptor; whichever insert lands first wins, and
//! all compilations are semantically identical, so the race is benign.
//!
//! This is the only mutable state in the runtime.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use log::debug;

use super::{MethodCodecs, StructCodec};
use crate::schema::{MethodDescriptor, StructDescriptor};

type StructCache = RwLock<HashMap<usize, (Arc<StructDescriptor>, Arc<StructCodec>)>>;
type MethodCache = RwLock<HashMap<usize, (Arc<MethodDescriptor>, Arc<MethodCodecs>)>>;

static STRUCT_CODECS: OnceLock<StructCache> = OnceLock::new();
static METHOD_CODECS: OnceLock<MethodCache> = OnceLock::new();

/// The compiled codec for `descriptor`, compiling and memoizing it on
/// first request.
pub fn struct_codec(descriptor: &Arc<StructDescriptor>) -> Arc<StructCodec> {
    let cache = STRUCT_CODECS.get_or_init(Default::default);
    let key = Arc::as_ptr(descriptor) as usize;

    if let Some((_, codec)) = cache.read().unwrap().get(&key) {
        return codec.clone();
    }

    debug!("compiling struct codec for {}", descriptor.name());
    let compiled = Arc::new(StructCodec::compile(descriptor));
    let mut map = cache.write().unwrap();
    let (_, codec) = map
        .entry(key)
        .or_insert_with(|| (descriptor.clone(), compiled));
    codec.clone()
}

/// The compiled args/result codec pair for `method`, compiling and
/// memoizing it on first request.
pub(crate) fn method_codecs(method: &Arc<MethodDescriptor>) -> Arc<MethodCodecs> {
    let cache = METHOD_CODECS.get_or_init(Default::default);
    let key = Arc::as_ptr(method) as usize;

    if let Some((_, codecs)) = cache.read().unwrap().get(&key) {
        return codecs.clone();
    }

    debug!("compiling method codecs for {}", method.name());
    let compiled = Arc::new(MethodCodecs::compile(method));
    let mut map = cache.write().unwrap();
    let (_, codecs) = map.entry(key).or_insert_with(|| (method.clone(), compiled));
    codecs.clone()
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::schema::UserType;

    #[test]
    fn must_compile_each_descriptor_at_most_once() {
        let descriptor = StructDescriptor::builder("CachedOnce")
            .required(1, "n", UserType::I32)
            .build()
            .unwrap();

        let first = struct_codec(&descriptor);
        let second = struct_codec(&descriptor);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn must_compile_identical_codecs_under_concurrent_first_use() {
        let descriptor = StructDescriptor::builder("Raced")
            .required(1, "n", UserType::I32)
            .build()
            .unwrap();

        let codecs: Vec<Arc<StructCodec>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| struct_codec(&descriptor)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // every racer observes one winning compilation
        let winner = struct_codec(&descriptor);
        for codec in codecs {
            assert!(Arc::ptr_eq(&codec, &winner));
        }
    }

    #[test]
    fn must_key_by_descriptor_identity_not_structure() {
        let a = StructDescriptor::builder("Twin")
            .required(1, "n", UserType::I32)
            .build()
            .unwrap();
        let b = StructDescriptor::builder("Twin")
            .required(1, "n", UserType::I32)
            .build()
            .unwrap();

        assert!(!Arc::ptr_eq(&struct_codec(&a), &struct_codec(&b)));
    }
}
