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

//! [NativeEngine] over the DuckDB library linked by `libduckdb-sys`.

use std::ffi::CStr;
use std::mem::{align_of, offset_of, size_of};
use std::os::raw::{c_char, c_void};
use std::sync::OnceLock;

use duckview_core::constants::{StateCode, TypeCode};
use duckview_core::layout::{DateCell, LayoutSignature, ResultLayout, TimeCell, TimestampCell};
use duckview_core::{Error, NativeEngine, RawHandle, Result, TypeTag};
use libduckdb_sys as ffi;
use tracing::debug;

/// The linked DuckDB engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDb;

static BOUND: OnceLock<Result<()>> = OnceLock::new();

/// Layouts and type codes as declared by the bindings.
pub fn measured_signature() -> LayoutSignature {
    let code = |tag: TypeTag| -> TypeCode {
        match tag {
            TypeTag::Boolean => ffi::DUCKDB_TYPE_DUCKDB_TYPE_BOOLEAN,
            TypeTag::Int8 => ffi::DUCKDB_TYPE_DUCKDB_TYPE_TINYINT,
            TypeTag::Int16 => ffi::DUCKDB_TYPE_DUCKDB_TYPE_SMALLINT,
            TypeTag::Int32 => ffi::DUCKDB_TYPE_DUCKDB_TYPE_INTEGER,
            TypeTag::Int64 => ffi::DUCKDB_TYPE_DUCKDB_TYPE_BIGINT,
            TypeTag::UInt8 => ffi::DUCKDB_TYPE_DUCKDB_TYPE_UTINYINT,
            TypeTag::UInt16 => ffi::DUCKDB_TYPE_DUCKDB_TYPE_USMALLINT,
            TypeTag::UInt32 => ffi::DUCKDB_TYPE_DUCKDB_TYPE_UINTEGER,
            TypeTag::UInt64 => ffi::DUCKDB_TYPE_DUCKDB_TYPE_UBIGINT,
            TypeTag::Float32 => ffi::DUCKDB_TYPE_DUCKDB_TYPE_FLOAT,
            TypeTag::Float64 => ffi::DUCKDB_TYPE_DUCKDB_TYPE_DOUBLE,
            TypeTag::Date => ffi::DUCKDB_TYPE_DUCKDB_TYPE_DATE,
            TypeTag::Time => ffi::DUCKDB_TYPE_DUCKDB_TYPE_TIME,
            TypeTag::Timestamp => ffi::DUCKDB_TYPE_DUCKDB_TYPE_TIMESTAMP,
            TypeTag::Varchar => ffi::DUCKDB_TYPE_DUCKDB_TYPE_VARCHAR,
        }
    };
    LayoutSignature {
        result_size: size_of::<ffi::duckdb_result>(),
        result_rows_changed_offset: offset_of!(ffi::duckdb_result, deprecated_rows_changed),
        result_error_message_offset: offset_of!(ffi::duckdb_result, deprecated_error_message),
        result_internal_data_offset: offset_of!(ffi::duckdb_result, internal_data),
        handle_size: size_of::<ffi::_duckdb_data_chunk>(),
        string_cell_size: size_of::<ffi::duckdb_string_t>(),
        string_cell_align: align_of::<ffi::duckdb_string_t>(),
        string_pointer_offset: offset_of!(ffi::duckdb_string_t__bindgen_ty_1__bindgen_ty_1, ptr),
        date_size: size_of::<ffi::duckdb_date>(),
        time_size: size_of::<ffi::duckdb_time>(),
        timestamp_size: size_of::<ffi::duckdb_timestamp>(),
        validity_word_size: size_of::<u64>(),
        type_codes: TypeTag::ALL.iter().map(|tag| (*tag, code(*tag))).collect(),
    }
}

fn library_version() -> String {
    // SAFETY: the library returns a static NUL-terminated string.
    unsafe {
        let version = ffi::duckdb_library_version();
        match version.is_null() {
            true => "unknown".to_string(),
            false => CStr::from_ptr(version).to_string_lossy().into_owned(),
        }
    }
}

/// Reads a result passed by value to the chunk calls.
///
/// # Safety
///
/// `result` must point to a result filled by `duckdb_query`. The copy
/// shares the result's internals and must not be destroyed.
unsafe fn by_value(result: *mut ResultLayout) -> ffi::duckdb_result {
    std::ptr::read(result as *const ffi::duckdb_result)
}

fn result_ptr(result: *mut ResultLayout) -> *mut ffi::duckdb_result {
    result as *mut ffi::duckdb_result
}

impl NativeEngine for DuckDb {
    const NAME: &'static str = "duckdb";

    fn bind() -> Result<()> {
        BOUND
            .get_or_init(|| {
                LayoutSignature::expected().verify(&measured_signature())?;
                if ffi::DuckDBSuccess as StateCode != duckview_core::constants::DUCKDB_SUCCESS {
                    return Err(Error::with_message_and_status(
                        format!("Unexpected success state code {}", ffi::DuckDBSuccess),
                        duckview_core::Status::AbiMismatch,
                    ));
                }
                debug!(version = library_version(), "DuckDB bound");
                Ok(())
            })
            .clone()
    }

    unsafe fn open(path: *const c_char, out_database: *mut RawHandle) -> StateCode {
        ffi::duckdb_open(path, out_database as *mut ffi::duckdb_database)
    }

    unsafe fn close(database: RawHandle) {
        let mut database = database as ffi::duckdb_database;
        ffi::duckdb_close(&mut database);
    }

    unsafe fn connect(database: RawHandle, out_connection: *mut RawHandle) -> StateCode {
        ffi::duckdb_connect(
            database as ffi::duckdb_database,
            out_connection as *mut ffi::duckdb_connection,
        )
    }

    unsafe fn disconnect(connection: RawHandle) {
        let mut connection = connection as ffi::duckdb_connection;
        ffi::duckdb_disconnect(&mut connection);
    }

    unsafe fn query(
        connection: RawHandle,
        sql: *const c_char,
        out_result: *mut ResultLayout,
    ) -> StateCode {
        ffi::duckdb_query(
            connection as ffi::duckdb_connection,
            sql,
            result_ptr(out_result),
        )
    }

    unsafe fn destroy_result(result: *mut ResultLayout) {
        ffi::duckdb_destroy_result(result_ptr(result));
    }

    unsafe fn result_error(result: *mut ResultLayout) -> *const c_char {
        ffi::duckdb_result_error(result_ptr(result))
    }

    unsafe fn column_count(result: *mut ResultLayout) -> u64 {
        ffi::duckdb_column_count(result_ptr(result))
    }

    unsafe fn column_name(result: *mut ResultLayout, column: u64) -> *const c_char {
        ffi::duckdb_column_name(result_ptr(result), column)
    }

    unsafe fn column_logical_type(result: *mut ResultLayout, column: u64) -> RawHandle {
        ffi::duckdb_column_logical_type(result_ptr(result), column) as RawHandle
    }

    unsafe fn logical_type_id(logical_type: RawHandle) -> TypeCode {
        ffi::duckdb_get_type_id(logical_type as ffi::duckdb_logical_type)
    }

    unsafe fn destroy_logical_type(logical_type: RawHandle) {
        let mut logical_type = logical_type as ffi::duckdb_logical_type;
        ffi::duckdb_destroy_logical_type(&mut logical_type);
    }

    unsafe fn result_is_streaming(result: *mut ResultLayout) -> bool {
        ffi::duckdb_result_is_streaming(by_value(result))
    }

    unsafe fn result_chunk_count(result: *mut ResultLayout) -> u64 {
        ffi::duckdb_result_chunk_count(by_value(result))
    }

    unsafe fn rows_changed(result: *mut ResultLayout) -> u64 {
        ffi::duckdb_rows_changed(result_ptr(result))
    }

    unsafe fn result_get_chunk(result: *mut ResultLayout, chunk_index: u64) -> RawHandle {
        ffi::duckdb_result_get_chunk(by_value(result), chunk_index) as RawHandle
    }

    unsafe fn destroy_chunk(chunk: RawHandle) {
        let mut chunk = chunk as ffi::duckdb_data_chunk;
        ffi::duckdb_destroy_data_chunk(&mut chunk);
    }

    unsafe fn chunk_size(chunk: RawHandle) -> u64 {
        ffi::duckdb_data_chunk_get_size(chunk as ffi::duckdb_data_chunk)
    }

    unsafe fn chunk_vector(chunk: RawHandle, column: u64) -> RawHandle {
        ffi::duckdb_data_chunk_get_vector(chunk as ffi::duckdb_data_chunk, column) as RawHandle
    }

    unsafe fn vector_data(vector: RawHandle) -> *const c_void {
        ffi::duckdb_vector_get_data(vector as ffi::duckdb_vector) as *const c_void
    }

    unsafe fn vector_validity(vector: RawHandle) -> *const u64 {
        ffi::duckdb_vector_get_validity(vector as ffi::duckdb_vector) as *const u64
    }

    unsafe fn appender_create(
        connection: RawHandle,
        schema: *const c_char,
        table: *const c_char,
        out_appender: *mut RawHandle,
    ) -> StateCode {
        ffi::duckdb_appender_create(
            connection as ffi::duckdb_connection,
            schema,
            table,
            out_appender as *mut ffi::duckdb_appender,
        )
    }

    unsafe fn appender_error(appender: RawHandle) -> *const c_char {
        ffi::duckdb_appender_error(appender as ffi::duckdb_appender)
    }

    unsafe fn appender_flush(appender: RawHandle) -> StateCode {
        ffi::duckdb_appender_flush(appender as ffi::duckdb_appender)
    }

    unsafe fn appender_close(appender: RawHandle) -> StateCode {
        ffi::duckdb_appender_close(appender as ffi::duckdb_appender)
    }

    unsafe fn appender_destroy(appender: RawHandle) {
        let mut appender = appender as ffi::duckdb_appender;
        ffi::duckdb_appender_destroy(&mut appender);
    }

    unsafe fn appender_end_row(appender: RawHandle) -> StateCode {
        ffi::duckdb_appender_end_row(appender as ffi::duckdb_appender)
    }

    unsafe fn append_null(appender: RawHandle) -> StateCode {
        ffi::duckdb_append_null(appender as ffi::duckdb_appender)
    }

    unsafe fn append_bool(appender: RawHandle, value: bool) -> StateCode {
        ffi::duckdb_append_bool(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_int8(appender: RawHandle, value: i8) -> StateCode {
        ffi::duckdb_append_int8(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_int16(appender: RawHandle, value: i16) -> StateCode {
        ffi::duckdb_append_int16(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_int32(appender: RawHandle, value: i32) -> StateCode {
        ffi::duckdb_append_int32(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_int64(appender: RawHandle, value: i64) -> StateCode {
        ffi::duckdb_append_int64(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_uint8(appender: RawHandle, value: u8) -> StateCode {
        ffi::duckdb_append_uint8(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_uint16(appender: RawHandle, value: u16) -> StateCode {
        ffi::duckdb_append_uint16(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_uint32(appender: RawHandle, value: u32) -> StateCode {
        ffi::duckdb_append_uint32(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_uint64(appender: RawHandle, value: u64) -> StateCode {
        ffi::duckdb_append_uint64(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_float(appender: RawHandle, value: f32) -> StateCode {
        ffi::duckdb_append_float(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_double(appender: RawHandle, value: f64) -> StateCode {
        ffi::duckdb_append_double(appender as ffi::duckdb_appender, value)
    }

    unsafe fn append_date(appender: RawHandle, value: DateCell) -> StateCode {
        ffi::duckdb_append_date(
            appender as ffi::duckdb_appender,
            ffi::duckdb_date { days: value.days },
        )
    }

    unsafe fn append_time(appender: RawHandle, value: TimeCell) -> StateCode {
        ffi::duckdb_append_time(
            appender as ffi::duckdb_appender,
            ffi::duckdb_time {
                micros: value.micros,
            },
        )
    }

    unsafe fn append_timestamp(appender: RawHandle, value: TimestampCell) -> StateCode {
        ffi::duckdb_append_timestamp(
            appender as ffi::duckdb_appender,
            ffi::duckdb_timestamp {
                micros: value.micros,
            },
        )
    }

    unsafe fn append_varchar(appender: RawHandle, value: *const c_char, length: u64) -> StateCode {
        ffi::duckdb_append_varchar_length(appender as ffi::duckdb_appender, value, length)
    }
}
