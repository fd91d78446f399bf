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

//! The engine call contract.
//!
//! [NativeEngine] lists the C entry points the bridge consumes, one
//! associated function per call of `duckdb.h`. Implementations forward to
//! the linked engine; they do no bookkeeping of their own. Handle lifetimes
//! are the business of [crate::tracker], which stores the destroy calls
//! below as plain [Disposer]s.
//!
//! Every function is `unsafe`: arguments are raw handles whose validity the
//! caller must guarantee, exactly as with the C API.

use std::os::raw::{c_char, c_void};

use crate::constants::{StateCode, TypeCode};
use crate::error::Result;
use crate::layout::{DateCell, ResultLayout, TimeCell, TimestampCell};

/// Address of a native handle.
pub type RawHandle = *mut c_void;

/// Releases the native object at an address. Must tolerate nothing but a
/// single call per address.
pub type Disposer = unsafe fn(RawHandle);

/// The subset of the engine C API used by the bridge.
pub trait NativeEngine: 'static {
    /// Human readable engine name, used in logs.
    const NAME: &'static str;

    /// Binds the native library and verifies its binary layouts.
    ///
    /// Runs the bind step once per process; later calls return the
    /// outcome of the first one.
    fn bind() -> Result<()>;

    unsafe fn open(path: *const c_char, out_database: *mut RawHandle) -> StateCode;
    unsafe fn close(database: RawHandle);
    unsafe fn connect(database: RawHandle, out_connection: *mut RawHandle) -> StateCode;
    unsafe fn disconnect(connection: RawHandle);

    /// Runs `sql` and fills `out_result`. The result must be destroyed even
    /// when the call fails.
    unsafe fn query(
        connection: RawHandle,
        sql: *const c_char,
        out_result: *mut ResultLayout,
    ) -> StateCode;
    unsafe fn destroy_result(result: *mut ResultLayout);
    unsafe fn result_error(result: *mut ResultLayout) -> *const c_char;
    unsafe fn column_count(result: *mut ResultLayout) -> u64;
    unsafe fn column_name(result: *mut ResultLayout, column: u64) -> *const c_char;
    /// Returns a logical type handle to be released with
    /// [NativeEngine::destroy_logical_type].
    unsafe fn column_logical_type(result: *mut ResultLayout, column: u64) -> RawHandle;
    unsafe fn logical_type_id(logical_type: RawHandle) -> TypeCode;
    unsafe fn destroy_logical_type(logical_type: RawHandle);
    unsafe fn result_is_streaming(result: *mut ResultLayout) -> bool;
    unsafe fn result_chunk_count(result: *mut ResultLayout) -> u64;
    /// Rows inserted, updated or deleted by the statement. The
    /// `rows_changed` field of the layout is not filled by the engine.
    unsafe fn rows_changed(result: *mut ResultLayout) -> u64;
    /// Returns a chunk handle to be released with [NativeEngine::destroy_chunk].
    unsafe fn result_get_chunk(result: *mut ResultLayout, chunk_index: u64) -> RawHandle;
    unsafe fn destroy_chunk(chunk: RawHandle);
    unsafe fn chunk_size(chunk: RawHandle) -> u64;
    unsafe fn chunk_vector(chunk: RawHandle, column: u64) -> RawHandle;
    unsafe fn vector_data(vector: RawHandle) -> *const c_void;
    /// Null when every row of the vector is valid.
    unsafe fn vector_validity(vector: RawHandle) -> *const u64;

    /// Creates an appender. The appender must be destroyed even when the
    /// call fails.
    unsafe fn appender_create(
        connection: RawHandle,
        schema: *const c_char,
        table: *const c_char,
        out_appender: *mut RawHandle,
    ) -> StateCode;
    unsafe fn appender_error(appender: RawHandle) -> *const c_char;
    unsafe fn appender_flush(appender: RawHandle) -> StateCode;
    unsafe fn appender_close(appender: RawHandle) -> StateCode;
    unsafe fn appender_destroy(appender: RawHandle);
    unsafe fn appender_end_row(appender: RawHandle) -> StateCode;
    unsafe fn append_null(appender: RawHandle) -> StateCode;
    unsafe fn append_bool(appender: RawHandle, value: bool) -> StateCode;
    unsafe fn append_int8(appender: RawHandle, value: i8) -> StateCode;
    unsafe fn append_int16(appender: RawHandle, value: i16) -> StateCode;
    unsafe fn append_int32(appender: RawHandle, value: i32) -> StateCode;
    unsafe fn append_int64(appender: RawHandle, value: i64) -> StateCode;
    unsafe fn append_uint8(appender: RawHandle, value: u8) -> StateCode;
    unsafe fn append_uint16(appender: RawHandle, value: u16) -> StateCode;
    unsafe fn append_uint32(appender: RawHandle, value: u32) -> StateCode;
    unsafe fn append_uint64(appender: RawHandle, value: u64) -> StateCode;
    unsafe fn append_float(appender: RawHandle, value: f32) -> StateCode;
    unsafe fn append_double(appender: RawHandle, value: f64) -> StateCode;
    unsafe fn append_date(appender: RawHandle, value: DateCell) -> StateCode;
    unsafe fn append_time(appender: RawHandle, value: TimeCell) -> StateCode;
    unsafe fn append_timestamp(appender: RawHandle, value: TimestampCell) -> StateCode;
    unsafe fn append_varchar(appender: RawHandle, value: *const c_char, length: u64)
        -> StateCode;
}
