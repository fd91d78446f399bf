// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Per-type dispatch table shared by the read and write paths.

use arrow_schema::DataType;

use crate::append::{array_appender, value_appender, AppendArrayFn, AppendValueFn};
use crate::decode::{decoder, DecodeFn};
use crate::engine::NativeEngine;
use crate::types::TypeTag;

/// Everything the bridge does with one type.
#[derive(Clone)]
pub struct Codec {
    pub type_tag: TypeTag,
    pub data_type: DataType,
    pub decode: DecodeFn,
    pub append_value: AppendValueFn,
    pub append_array: AppendArrayFn,
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("type_tag", &self.type_tag)
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}

impl TypeTag {
    /// The dispatch entry of this tag for engine `E`.
    pub fn codec<E: NativeEngine>(&self) -> Codec {
        Codec {
            type_tag: *self,
            data_type: self.data_type(),
            decode: decoder(*self),
            append_value: value_appender::<E>(*self),
            append_array: array_appender::<E>(*self),
        }
    }
}
