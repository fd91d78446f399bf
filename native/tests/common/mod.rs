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

#![allow(dead_code)]

use arrow_array::RecordBatch;
use arrow_select::concat::concat_batches;
use duckview_core::decode::ColumnValues;
use duckview_core::{Chunk, ColumnBatch, ColumnDescriptor, TypeTag, Value};
use duckview_native::{Connection, Database};

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn get_connection() -> (Database, Connection) {
    init_logging();
    let database = Database::open_in_memory().unwrap();
    let connection = database.connect().unwrap();
    (database, connection)
}

pub fn sql_type(tag: TypeTag) -> &'static str {
    match tag {
        TypeTag::Boolean => "BOOLEAN",
        TypeTag::Int8 => "TINYINT",
        TypeTag::Int16 => "SMALLINT",
        TypeTag::Int32 => "INTEGER",
        TypeTag::Int64 => "BIGINT",
        TypeTag::UInt8 => "UTINYINT",
        TypeTag::UInt16 => "USMALLINT",
        TypeTag::UInt32 => "UINTEGER",
        TypeTag::UInt64 => "UBIGINT",
        TypeTag::Float32 => "FLOAT",
        TypeTag::Float64 => "DOUBLE",
        TypeTag::Date => "DATE",
        TypeTag::Time => "TIME",
        TypeTag::Timestamp => "TIMESTAMP",
        TypeTag::Varchar => "VARCHAR",
    }
}

pub fn all_type_columns() -> Vec<ColumnDescriptor> {
    TypeTag::ALL
        .iter()
        .map(|tag| ColumnDescriptor::new(format!("c_{}", sql_type(*tag).to_lowercase()), *tag))
        .collect()
}

pub fn create_table(connection: &mut Connection, name: &str, columns: &[ColumnDescriptor]) {
    let definition = columns
        .iter()
        .map(|column| format!("{} {}", column.name, sql_type(column.type_tag)))
        .collect::<Vec<_>>()
        .join(", ");
    connection
        .execute(&format!("CREATE TABLE {name} ({definition})"))
        .unwrap();
}

/// Column `c` of row `r` is missing when `(r + c) % 5 == 0`.
pub fn all_type_rows(count: usize) -> Vec<Vec<Value>> {
    (0..count)
        .map(|r| {
            TypeTag::ALL
                .iter()
                .enumerate()
                .map(|(c, tag)| match (r + c) % 5 {
                    0 => Value::Null,
                    _ => sample_value(*tag, r),
                })
                .collect()
        })
        .collect()
}

fn sample_value(tag: TypeTag, r: usize) -> Value {
    let i = r as i64;
    match tag {
        TypeTag::Boolean => Value::Boolean(r % 3 == 0),
        TypeTag::Int8 => Value::Int8((i % 127) as i8),
        TypeTag::Int16 => Value::Int16(-(i as i16)),
        TypeTag::Int32 => Value::Int32(i as i32 * 17),
        TypeTag::Int64 => Value::Int64(i * -1_000_000_007),
        TypeTag::UInt8 => Value::UInt8((r % 256) as u8),
        TypeTag::UInt16 => Value::UInt16(r as u16 * 3),
        TypeTag::UInt32 => Value::UInt32(r as u32 * 100_003),
        TypeTag::UInt64 => Value::UInt64(u64::MAX - r as u64),
        TypeTag::Float32 => Value::Float32(r as f32 * 0.25),
        TypeTag::Float64 => Value::Float64(i as f64 / 8.0),
        TypeTag::Date => Value::Date(i as i32 - 1500),
        TypeTag::Time => Value::Time(i * 28_800_000 % 86_400_000_000),
        TypeTag::Timestamp => Value::Timestamp(1_600_000_000_000_000 + i * 1_000),
        TypeTag::Varchar => match r % 3 {
            0 => Value::Varchar(String::new()),
            1 => Value::Varchar(format!("r{r}")),
            _ => Value::Varchar(format!("row number {r} with a long tail")),
        },
    }
}

pub fn query_one_batch(connection: &mut Connection, sql: &str) -> RecordBatch {
    let result = connection.query(sql).unwrap();
    let schema = result.schema();
    let batches = result.into_record_batches().unwrap();
    concat_batches(&schema, &batches).unwrap()
}

pub fn cell(column: &ColumnBatch, row: usize) -> Value {
    if column.is_missing(row) {
        return Value::Null;
    }
    match &column.values {
        ColumnValues::Boolean(v) => Value::Boolean(v[row] != 0),
        ColumnValues::Int8(v) => Value::Int8(v[row]),
        ColumnValues::Int16(v) => Value::Int16(v[row]),
        ColumnValues::Int32(v) => Value::Int32(v[row]),
        ColumnValues::Int64(v) => Value::Int64(v[row]),
        ColumnValues::UInt8(v) => Value::UInt8(v[row]),
        ColumnValues::UInt16(v) => Value::UInt16(v[row]),
        ColumnValues::UInt32(v) => Value::UInt32(v[row]),
        ColumnValues::UInt64(v) => Value::UInt64(v[row]),
        ColumnValues::Float32(v) => Value::Float32(v[row]),
        ColumnValues::Float64(v) => Value::Float64(v[row]),
        ColumnValues::Date(v) => Value::Date(v[row]),
        ColumnValues::Time(v) => Value::Time(v[row]),
        ColumnValues::Timestamp(v) => Value::Timestamp(v[row]),
        ColumnValues::Varchar(v) => Value::Varchar(v.str(row).unwrap().unwrap().to_string()),
    }
}

/// Reads every chunk back into rows of values.
pub fn chunk_rows(chunks: &[Chunk]) -> Vec<Vec<Value>> {
    chunks
        .iter()
        .flat_map(|chunk| {
            (0..chunk.row_count())
                .map(move |row| chunk.columns().iter().map(|c| cell(c, row)).collect())
        })
        .collect()
}
