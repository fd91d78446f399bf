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

//! Arrow schemas of results and append targets.

use std::sync::Arc;

use arrow_schema::{Field, Schema, SchemaRef};

use crate::error::Result;
use crate::types::{ColumnDescriptor, TypeTag};

/// Schema of the record batches produced for a result with `columns`.
///
/// Every field is nullable: the engine does not report column
/// constraints through the result.
pub fn result_schema(columns: &[ColumnDescriptor]) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|column| Field::new(&column.name, column.type_tag.data_type(), true))
            .collect::<Vec<_>>(),
    ))
}

/// Column descriptors for appending batches of `schema`.
///
/// Fails with [crate::error::Status::UnsupportedType] on the first field
/// with no engine counterpart.
pub fn columns_from_schema(schema: &Schema) -> Result<Vec<ColumnDescriptor>> {
    schema
        .fields()
        .iter()
        .map(|field| {
            Ok(ColumnDescriptor::new(
                field.name(),
                TypeTag::from_data_type(field.data_type())?,
            ))
        })
        .collect()
}
