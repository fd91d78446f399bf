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

//! Numeric codes of the engine C API (`duckdb.h`).

/// Return value of every fallible engine call.
pub type StateCode = u32;
/// Runtime type code of a logical type (`duckdb_type`).
pub type TypeCode = u32;

pub const DUCKDB_SUCCESS: StateCode = 0;
pub const DUCKDB_ERROR: StateCode = 1;

pub const DUCKDB_TYPE_INVALID: TypeCode = 0;
pub const DUCKDB_TYPE_BOOLEAN: TypeCode = 1;
pub const DUCKDB_TYPE_TINYINT: TypeCode = 2;
pub const DUCKDB_TYPE_SMALLINT: TypeCode = 3;
pub const DUCKDB_TYPE_INTEGER: TypeCode = 4;
pub const DUCKDB_TYPE_BIGINT: TypeCode = 5;
pub const DUCKDB_TYPE_UTINYINT: TypeCode = 6;
pub const DUCKDB_TYPE_USMALLINT: TypeCode = 7;
pub const DUCKDB_TYPE_UINTEGER: TypeCode = 8;
pub const DUCKDB_TYPE_UBIGINT: TypeCode = 9;
pub const DUCKDB_TYPE_FLOAT: TypeCode = 10;
pub const DUCKDB_TYPE_DOUBLE: TypeCode = 11;
pub const DUCKDB_TYPE_TIMESTAMP: TypeCode = 12;
pub const DUCKDB_TYPE_DATE: TypeCode = 13;
pub const DUCKDB_TYPE_TIME: TypeCode = 14;
pub const DUCKDB_TYPE_INTERVAL: TypeCode = 15;
pub const DUCKDB_TYPE_HUGEINT: TypeCode = 16;
pub const DUCKDB_TYPE_VARCHAR: TypeCode = 17;
pub const DUCKDB_TYPE_BLOB: TypeCode = 18;

/// Rows per validity word.
pub const VALIDITY_WORD_BITS: usize = 64;

/// Strings up to this many bytes are stored inside the string cell.
pub const STRING_INLINE_LENGTH: usize = 12;

/// Default schema the appender binds to when none is configured.
pub const DEFAULT_SCHEMA: &str = "main";

pub const OPTION_TRUST_NATIVE_TYPES: &str = "duckview.decode.trust_native_types";
pub const OPTION_ZERO_COPY: &str = "duckview.decode.zero_copy";
pub const OPTION_APPEND_SCHEMA: &str = "duckview.append.schema";
pub const OPTION_FLUSH_EVERY: &str = "duckview.append.flush_every_rows";
