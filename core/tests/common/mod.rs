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

//! An engine living in Rust memory, laid out like the real one.
//!
//! State is per thread, so tests running in parallel do not see each
//! other's tables or events.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::ptr::null_mut;
use std::sync::Arc;

use duckview_core::constants::{StateCode, TypeCode, DUCKDB_ERROR, DUCKDB_SUCCESS};
use duckview_core::layout::{
    DateCell, LayoutSignature, PointerString, ResultLayout, StringCell, TimeCell, TimestampCell,
};
use duckview_core::lifecycle;
use duckview_core::tracker::SharedHandle;
use duckview_core::{ColumnDescriptor, NativeEngine, RawHandle, Result, TypeTag, Value};

pub const CHUNK_SIZE: usize = 2048;

pub struct FakeVector {
    data: Vec<u64>,
    validity: Option<Vec<u64>>,
    // Out-of-line string bytes referenced by pointer cells.
    heap: Vec<Box<[u8]>>,
}

pub struct FakeChunk {
    rows: usize,
    vectors: Vec<FakeVector>,
}

pub struct FakeResult {
    columns: Vec<(CString, TypeCode)>,
    chunks: Vec<Arc<FakeChunk>>,
    rows_changed: u64,
}

impl FakeResult {
    /// A result holding `rows`, split into chunks of [CHUNK_SIZE].
    pub fn new(columns: &[ColumnDescriptor], rows: &[Vec<Value>]) -> Self {
        let chunks = rows
            .chunks(CHUNK_SIZE)
            .map(|chunk| {
                let vectors = columns
                    .iter()
                    .enumerate()
                    .map(|(index, column)| {
                        let values: Vec<&Value> = chunk.iter().map(|row| &row[index]).collect();
                        encode_vector(column.type_tag, &values)
                    })
                    .collect();
                Arc::new(FakeChunk {
                    rows: chunk.len(),
                    vectors,
                })
            })
            .collect();
        Self {
            columns: columns
                .iter()
                .map(|c| (CString::new(c.name.as_str()).unwrap(), c.type_tag.code()))
                .collect(),
            chunks,
            rows_changed: 0,
        }
    }

    /// A result with one column of an arbitrary type code and no rows.
    pub fn with_type_code(name: &str, code: TypeCode) -> Self {
        Self {
            columns: vec![(CString::new(name).unwrap(), code)],
            chunks: Vec::new(),
            rows_changed: 0,
        }
    }

    pub fn rows_changed(rows_changed: u64) -> Self {
        Self {
            columns: Vec::new(),
            chunks: Vec::new(),
            rows_changed,
        }
    }
}

unsafe fn put<T>(base: *mut u8, offset: usize, value: T) {
    (base.add(offset) as *mut T).write(value)
}

/// A pointer cell that must never be followed.
fn garbage_cell() -> StringCell {
    StringCell {
        pointer: PointerString {
            length: 1 << 30,
            prefix: *b"junk",
            ptr: 0x8 as *const u8,
        },
    }
}

fn encode_vector(tag: TypeTag, values: &[&Value]) -> FakeVector {
    let width = tag.width();
    let mut data = vec![0u64; (values.len() * width).div_ceil(8).max(1)];
    let mut validity = vec![u64::MAX; values.len().div_ceil(64)];
    let mut heap = Vec::new();
    let base = data.as_mut_ptr() as *mut u8;
    for (row, value) in values.iter().enumerate() {
        let offset = row * width;
        unsafe {
            match value {
                Value::Null => {
                    validity[row / 64] &= !(1u64 << (row % 64));
                    if tag == TypeTag::Varchar {
                        put(base, offset, garbage_cell());
                    }
                }
                Value::Boolean(v) => put(base, offset, *v as u8),
                Value::Int8(v) => put(base, offset, *v),
                Value::Int16(v) => put(base, offset, *v),
                Value::Int32(v) => put(base, offset, *v),
                Value::Int64(v) => put(base, offset, *v),
                Value::UInt8(v) => put(base, offset, *v),
                Value::UInt16(v) => put(base, offset, *v),
                Value::UInt32(v) => put(base, offset, *v),
                Value::UInt64(v) => put(base, offset, *v),
                Value::Float32(v) => put(base, offset, *v),
                Value::Float64(v) => put(base, offset, *v),
                Value::Date(days) => put(base, offset, DateCell { days: *days }),
                Value::Time(micros) => put(base, offset, TimeCell { micros: *micros }),
                Value::Timestamp(micros) => put(base, offset, TimestampCell { micros: *micros }),
                Value::Varchar(text) => {
                    let cell = match StringCell::inline(text.as_bytes()) {
                        Ok(cell) => cell,
                        Err(_) => {
                            let bytes: Box<[u8]> = text.as_bytes().into();
                            let cell = StringCell::pointer(&bytes);
                            heap.push(bytes);
                            cell
                        }
                    };
                    put(base, offset, cell);
                }
            }
        }
    }
    let validity = match validity.iter().all(|word| *word == u64::MAX) {
        true => None,
        false => Some(validity),
    };
    FakeVector {
        data,
        validity,
        heap,
    }
}

pub struct FakeTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Vec<Value>>,
}

struct FakeAppender {
    table: String,
    current: Vec<Value>,
    error: Option<CString>,
}

#[derive(Default)]
struct FakeState {
    events: Vec<&'static str>,
    tables: HashMap<String, FakeTable>,
    next_result: Option<FakeResult>,
    streaming: bool,
    query_error: Option<String>,
    append_failure: Option<(usize, String)>,
    cells_appended: usize,
}

thread_local! {
    static STATE: RefCell<FakeState> = RefCell::new(FakeState::default());
}

fn with_state<T>(f: impl FnOnce(&mut FakeState) -> T) -> T {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

fn record(event: &'static str) {
    with_state(|state| state.events.push(event));
}

pub fn reset() {
    with_state(|state| *state = FakeState::default());
}

pub fn events() -> Vec<&'static str> {
    with_state(|state| state.events.clone())
}

pub fn count(event: &str) -> usize {
    with_state(|state| state.events.iter().filter(|e| **e == event).count())
}

pub fn install_result(result: FakeResult) {
    with_state(|state| state.next_result = Some(result));
}

pub fn set_streaming(streaming: bool) {
    with_state(|state| state.streaming = streaming);
}

pub fn fail_next_query(message: &str) {
    with_state(|state| state.query_error = Some(message.to_string()));
}

/// Makes the append of cell number `cell` (counting from zero across the
/// thread) fail with `message`.
pub fn fail_append_at(cell: usize, message: &str) {
    with_state(|state| state.append_failure = Some((cell, message.to_string())));
}

pub fn create_table(name: &str, columns: Vec<ColumnDescriptor>) {
    with_state(|state| {
        state.tables.insert(
            name.to_string(),
            FakeTable {
                columns,
                rows: Vec::new(),
            },
        )
    });
}

pub fn table_rows(name: &str) -> Vec<Vec<Value>> {
    with_state(|state| {
        state
            .tables
            .get(name)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    })
}

/// Every creation event has exactly one matching destroy event.
pub fn assert_balanced() {
    for (create, destroy) in [
        ("open", "close"),
        ("connect", "disconnect"),
        ("query", "destroy_result"),
        ("logical_type", "destroy_logical_type"),
        ("get_chunk", "destroy_chunk"),
        ("appender_create", "appender_destroy"),
    ] {
        assert_eq!(
            count(create),
            count(destroy),
            "{create} / {destroy} in {:?}",
            events()
        );
    }
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn open() -> (SharedHandle, SharedHandle) {
    init_logging();
    let database = lifecycle::open_database::<FakeEngine>(None).unwrap();
    let connection = lifecycle::connect::<FakeEngine>(&database).unwrap();
    (database, connection)
}

/// One column of every supported type.
pub fn all_type_columns() -> Vec<ColumnDescriptor> {
    TypeTag::ALL
        .iter()
        .map(|tag| ColumnDescriptor::new(format!("{tag:?}").to_lowercase(), *tag))
        .collect()
}

/// Rows for [all_type_columns]. Column `c` of row `r` is missing when
/// `(r + c) % 7 == 0`; strings alternate between inline and pointer cells.
pub fn all_type_rows(count: usize) -> Vec<Vec<Value>> {
    (0..count)
        .map(|r| {
            TypeTag::ALL
                .iter()
                .enumerate()
                .map(|(c, tag)| match (r + c) % 7 {
                    0 => Value::Null,
                    _ => sample_value(*tag, r),
                })
                .collect()
        })
        .collect()
}

pub fn sample_value(tag: TypeTag, r: usize) -> Value {
    let i = r as i64;
    match tag {
        TypeTag::Boolean => Value::Boolean(r % 2 == 0),
        TypeTag::Int8 => Value::Int8((i % 100) as i8 - 50),
        TypeTag::Int16 => Value::Int16(-(i as i16)),
        TypeTag::Int32 => Value::Int32(i as i32 * 3),
        TypeTag::Int64 => Value::Int64(i * 1_000_000_007),
        TypeTag::UInt8 => Value::UInt8((r % 256) as u8),
        TypeTag::UInt16 => Value::UInt16(r as u16),
        TypeTag::UInt32 => Value::UInt32(r as u32 * 7),
        TypeTag::UInt64 => Value::UInt64(u64::MAX - r as u64),
        TypeTag::Float32 => Value::Float32(r as f32 / 4.0),
        TypeTag::Float64 => Value::Float64(i as f64 * -0.5),
        TypeTag::Date => Value::Date(19_000 + i as i32),
        TypeTag::Time => Value::Time(i * 1_000_000 % 86_400_000_000),
        TypeTag::Timestamp => Value::Timestamp(1_700_000_000_000_000 + i),
        TypeTag::Varchar => match r % 2 {
            0 => Value::Varchar(format!("s{r}")),
            _ => Value::Varchar(format!("a longer string, row {r:08}")),
        },
    }
}

pub struct FakeEngine;

unsafe fn as_appender<'a>(appender: RawHandle) -> &'a mut FakeAppender {
    &mut *(appender as *mut FakeAppender)
}

unsafe fn as_result<'a>(result: *mut ResultLayout) -> &'a FakeResult {
    &*((*result).internal_data as *const FakeResult)
}

unsafe fn as_chunk<'a>(chunk: RawHandle) -> &'a Arc<FakeChunk> {
    &*(chunk as *const Arc<FakeChunk>)
}

unsafe fn push_cell(appender: RawHandle, value: Value) -> StateCode {
    let failure = with_state(|state| {
        let cell = state.cells_appended;
        state.cells_appended += 1;
        match &state.append_failure {
            Some((at, message)) if *at == cell => Some(message.clone()),
            _ => None,
        }
    });
    let appender = as_appender(appender);
    match failure {
        Some(message) => {
            appender.error = Some(CString::new(message).unwrap());
            DUCKDB_ERROR
        }
        None => {
            appender.current.push(value);
            DUCKDB_SUCCESS
        }
    }
}

fn marker() -> RawHandle {
    Box::into_raw(Box::new(0u64)) as RawHandle
}

unsafe fn drop_marker(handle: RawHandle) {
    drop(Box::from_raw(handle as *mut u64));
}

impl NativeEngine for FakeEngine {
    const NAME: &'static str = "fake";

    fn bind() -> Result<()> {
        LayoutSignature::expected().verify(&LayoutSignature::expected())
    }

    unsafe fn open(_path: *const c_char, out_database: *mut RawHandle) -> StateCode {
        record("open");
        *out_database = marker();
        DUCKDB_SUCCESS
    }

    unsafe fn close(database: RawHandle) {
        record("close");
        drop_marker(database);
    }

    unsafe fn connect(_database: RawHandle, out_connection: *mut RawHandle) -> StateCode {
        record("connect");
        *out_connection = marker();
        DUCKDB_SUCCESS
    }

    unsafe fn disconnect(connection: RawHandle) {
        record("disconnect");
        drop_marker(connection);
    }

    unsafe fn query(
        _connection: RawHandle,
        sql: *const c_char,
        out_result: *mut ResultLayout,
    ) -> StateCode {
        record("query");
        let sql = CStr::from_ptr(sql).to_string_lossy().into_owned();
        let outcome = with_state(|state| {
            if let Some(message) = state.query_error.take() {
                return Err(message);
            }
            if let Some(result) = state.next_result.take() {
                return Ok(result);
            }
            match sql.strip_prefix("SELECT * FROM ") {
                Some(name) => match state.tables.get(name.trim()) {
                    Some(table) => Ok(FakeResult::new(&table.columns, &table.rows)),
                    None => Err(format!(
                        "Catalog Error: Table with name {} does not exist!",
                        name.trim()
                    )),
                },
                None => Err(format!("Parser Error: syntax error in \"{sql}\"")),
            }
        });
        match outcome {
            Ok(result) => {
                (*out_result).column_count = result.columns.len() as u64;
                (*out_result).internal_data = Box::into_raw(Box::new(result)) as *mut c_void;
                DUCKDB_SUCCESS
            }
            Err(message) => {
                (*out_result).error_message = CString::new(message).unwrap().into_raw();
                DUCKDB_ERROR
            }
        }
    }

    unsafe fn destroy_result(result: *mut ResultLayout) {
        record("destroy_result");
        if !(*result).error_message.is_null() {
            drop(CString::from_raw((*result).error_message));
            (*result).error_message = null_mut();
        }
        if !(*result).internal_data.is_null() {
            drop(Box::from_raw((*result).internal_data as *mut FakeResult));
            (*result).internal_data = null_mut();
        }
    }

    unsafe fn result_error(result: *mut ResultLayout) -> *const c_char {
        (*result).error_message
    }

    unsafe fn column_count(result: *mut ResultLayout) -> u64 {
        as_result(result).columns.len() as u64
    }

    unsafe fn column_name(result: *mut ResultLayout, column: u64) -> *const c_char {
        as_result(result).columns[column as usize].0.as_ptr()
    }

    unsafe fn column_logical_type(result: *mut ResultLayout, column: u64) -> RawHandle {
        record("logical_type");
        let code = as_result(result).columns[column as usize].1;
        Box::into_raw(Box::new(code)) as RawHandle
    }

    unsafe fn logical_type_id(logical_type: RawHandle) -> TypeCode {
        *(logical_type as *const TypeCode)
    }

    unsafe fn destroy_logical_type(logical_type: RawHandle) {
        record("destroy_logical_type");
        drop(Box::from_raw(logical_type as *mut TypeCode));
    }

    unsafe fn result_is_streaming(_result: *mut ResultLayout) -> bool {
        with_state(|state| state.streaming)
    }

    unsafe fn result_chunk_count(result: *mut ResultLayout) -> u64 {
        as_result(result).chunks.len() as u64
    }

    unsafe fn rows_changed(result: *mut ResultLayout) -> u64 {
        as_result(result).rows_changed
    }

    unsafe fn result_get_chunk(result: *mut ResultLayout, chunk_index: u64) -> RawHandle {
        match as_result(result).chunks.get(chunk_index as usize) {
            Some(chunk) => {
                record("get_chunk");
                Box::into_raw(Box::new(Arc::clone(chunk))) as RawHandle
            }
            None => null_mut(),
        }
    }

    unsafe fn destroy_chunk(chunk: RawHandle) {
        record("destroy_chunk");
        drop(Box::from_raw(chunk as *mut Arc<FakeChunk>));
    }

    unsafe fn chunk_size(chunk: RawHandle) -> u64 {
        as_chunk(chunk).rows as u64
    }

    unsafe fn chunk_vector(chunk: RawHandle, column: u64) -> RawHandle {
        match as_chunk(chunk).vectors.get(column as usize) {
            Some(vector) => vector as *const FakeVector as RawHandle,
            None => null_mut(),
        }
    }

    unsafe fn vector_data(vector: RawHandle) -> *const c_void {
        (*(vector as *const FakeVector)).data.as_ptr() as *const c_void
    }

    unsafe fn vector_validity(vector: RawHandle) -> *const u64 {
        match &(*(vector as *const FakeVector)).validity {
            Some(words) => words.as_ptr(),
            None => std::ptr::null(),
        }
    }

    unsafe fn appender_create(
        _connection: RawHandle,
        _schema: *const c_char,
        table: *const c_char,
        out_appender: *mut RawHandle,
    ) -> StateCode {
        record("appender_create");
        let table = CStr::from_ptr(table).to_string_lossy().into_owned();
        let exists = with_state(|state| state.tables.contains_key(&table));
        let error = match exists {
            true => None,
            false => Some(
                CString::new(format!("Catalog Error: Table with name {table} does not exist!"))
                    .unwrap(),
            ),
        };
        let state = match error {
            Some(_) => DUCKDB_ERROR,
            None => DUCKDB_SUCCESS,
        };
        *out_appender = Box::into_raw(Box::new(FakeAppender {
            table,
            current: Vec::new(),
            error,
        })) as RawHandle;
        state
    }

    unsafe fn appender_error(appender: RawHandle) -> *const c_char {
        match &as_appender(appender).error {
            Some(message) => message.as_ptr(),
            None => std::ptr::null(),
        }
    }

    unsafe fn appender_flush(_appender: RawHandle) -> StateCode {
        record("flush");
        DUCKDB_SUCCESS
    }

    unsafe fn appender_close(_appender: RawHandle) -> StateCode {
        record("appender_close");
        DUCKDB_SUCCESS
    }

    unsafe fn appender_destroy(appender: RawHandle) {
        record("appender_destroy");
        drop(Box::from_raw(appender as *mut FakeAppender));
    }

    unsafe fn appender_end_row(appender: RawHandle) -> StateCode {
        record("end_row");
        let appender = as_appender(appender);
        let row = std::mem::take(&mut appender.current);
        with_state(|state| {
            if let Some(table) = state.tables.get_mut(&appender.table) {
                table.rows.push(row);
            }
        });
        DUCKDB_SUCCESS
    }

    unsafe fn append_null(appender: RawHandle) -> StateCode {
        push_cell(appender, Value::Null)
    }

    unsafe fn append_bool(appender: RawHandle, value: bool) -> StateCode {
        push_cell(appender, Value::Boolean(value))
    }

    unsafe fn append_int8(appender: RawHandle, value: i8) -> StateCode {
        push_cell(appender, Value::Int8(value))
    }

    unsafe fn append_int16(appender: RawHandle, value: i16) -> StateCode {
        push_cell(appender, Value::Int16(value))
    }

    unsafe fn append_int32(appender: RawHandle, value: i32) -> StateCode {
        push_cell(appender, Value::Int32(value))
    }

    unsafe fn append_int64(appender: RawHandle, value: i64) -> StateCode {
        push_cell(appender, Value::Int64(value))
    }

    unsafe fn append_uint8(appender: RawHandle, value: u8) -> StateCode {
        push_cell(appender, Value::UInt8(value))
    }

    unsafe fn append_uint16(appender: RawHandle, value: u16) -> StateCode {
        push_cell(appender, Value::UInt16(value))
    }

    unsafe fn append_uint32(appender: RawHandle, value: u32) -> StateCode {
        push_cell(appender, Value::UInt32(value))
    }

    unsafe fn append_uint64(appender: RawHandle, value: u64) -> StateCode {
        push_cell(appender, Value::UInt64(value))
    }

    unsafe fn append_float(appender: RawHandle, value: f32) -> StateCode {
        push_cell(appender, Value::Float32(value))
    }

    unsafe fn append_double(appender: RawHandle, value: f64) -> StateCode {
        push_cell(appender, Value::Float64(value))
    }

    unsafe fn append_date(appender: RawHandle, value: DateCell) -> StateCode {
        push_cell(appender, Value::Date(value.days))
    }

    unsafe fn append_time(appender: RawHandle, value: TimeCell) -> StateCode {
        push_cell(appender, Value::Time(value.micros))
    }

    unsafe fn append_timestamp(appender: RawHandle, value: TimestampCell) -> StateCode {
        push_cell(appender, Value::Timestamp(value.micros))
    }

    unsafe fn append_varchar(appender: RawHandle, value: *const c_char, length: u64) -> StateCode {
        let bytes = std::slice::from_raw_parts(value as *const u8, length as usize);
        push_cell(
            appender,
            Value::Varchar(String::from_utf8_lossy(bytes).into_owned()),
        )
    }
}
