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

//! Runtime type tags and their Arrow counterparts.

use arrow_schema::{DataType, TimeUnit};

use crate::constants::{self, TypeCode};
use crate::error::{Error, Result, Status};

/// Engine column types the bridge can decode and append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Days since 1970-01-01, 4 bytes.
    Date,
    /// Microseconds since midnight, 8 bytes.
    Time,
    /// Microseconds since 1970-01-01, 8 bytes.
    Timestamp,
    /// 16-byte string cells.
    Varchar,
}

impl TypeTag {
    pub const ALL: [TypeTag; 15] = [
        TypeTag::Boolean,
        TypeTag::Int8,
        TypeTag::Int16,
        TypeTag::Int32,
        TypeTag::Int64,
        TypeTag::UInt8,
        TypeTag::UInt16,
        TypeTag::UInt32,
        TypeTag::UInt64,
        TypeTag::Float32,
        TypeTag::Float64,
        TypeTag::Date,
        TypeTag::Time,
        TypeTag::Timestamp,
        TypeTag::Varchar,
    ];

    /// The engine's type code.
    pub fn code(&self) -> TypeCode {
        match self {
            TypeTag::Boolean => constants::DUCKDB_TYPE_BOOLEAN,
            TypeTag::Int8 => constants::DUCKDB_TYPE_TINYINT,
            TypeTag::Int16 => constants::DUCKDB_TYPE_SMALLINT,
            TypeTag::Int32 => constants::DUCKDB_TYPE_INTEGER,
            TypeTag::Int64 => constants::DUCKDB_TYPE_BIGINT,
            TypeTag::UInt8 => constants::DUCKDB_TYPE_UTINYINT,
            TypeTag::UInt16 => constants::DUCKDB_TYPE_USMALLINT,
            TypeTag::UInt32 => constants::DUCKDB_TYPE_UINTEGER,
            TypeTag::UInt64 => constants::DUCKDB_TYPE_UBIGINT,
            TypeTag::Float32 => constants::DUCKDB_TYPE_FLOAT,
            TypeTag::Float64 => constants::DUCKDB_TYPE_DOUBLE,
            TypeTag::Date => constants::DUCKDB_TYPE_DATE,
            TypeTag::Time => constants::DUCKDB_TYPE_TIME,
            TypeTag::Timestamp => constants::DUCKDB_TYPE_TIMESTAMP,
            TypeTag::Varchar => constants::DUCKDB_TYPE_VARCHAR,
        }
    }

    /// Width in bytes of one value in a vector's data buffer.
    pub fn width(&self) -> usize {
        match self {
            TypeTag::Boolean | TypeTag::Int8 | TypeTag::UInt8 => 1,
            TypeTag::Int16 | TypeTag::UInt16 => 2,
            TypeTag::Int32 | TypeTag::UInt32 | TypeTag::Float32 | TypeTag::Date => 4,
            TypeTag::Int64
            | TypeTag::UInt64
            | TypeTag::Float64
            | TypeTag::Time
            | TypeTag::Timestamp => 8,
            TypeTag::Varchar => 16,
        }
    }

    /// The Arrow type a decoded column converts to.
    pub fn data_type(&self) -> DataType {
        match self {
            TypeTag::Boolean => DataType::Boolean,
            TypeTag::Int8 => DataType::Int8,
            TypeTag::Int16 => DataType::Int16,
            TypeTag::Int32 => DataType::Int32,
            TypeTag::Int64 => DataType::Int64,
            TypeTag::UInt8 => DataType::UInt8,
            TypeTag::UInt16 => DataType::UInt16,
            TypeTag::UInt32 => DataType::UInt32,
            TypeTag::UInt64 => DataType::UInt64,
            TypeTag::Float32 => DataType::Float32,
            TypeTag::Float64 => DataType::Float64,
            TypeTag::Date => DataType::Date32,
            TypeTag::Time => DataType::Time64(TimeUnit::Microsecond),
            TypeTag::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            TypeTag::Varchar => DataType::Utf8,
        }
    }

    /// The tag used to append an Arrow column, if it has one.
    pub fn from_data_type(data_type: &DataType) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|tag| &tag.data_type() == data_type)
            .copied()
            .ok_or_else(|| {
                Error::with_message_and_status(
                    format!("No engine type for Arrow type {data_type}"),
                    Status::UnsupportedType,
                )
            })
    }
}

impl TryFrom<TypeCode> for TypeTag {
    type Error = Error;

    fn try_from(value: TypeCode) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|tag| tag.code() == value)
            .copied()
            .ok_or_else(|| {
                Error::with_message_and_status(
                    format!("Unsupported engine type code: {value}"),
                    Status::UnsupportedType,
                )
            })
    }
}

/// Name and type of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_tag: TypeTag,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
        }
    }
}
