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

//! The bulk append path.
//!
//! An [AppenderSession] binds one native appender to one table and pushes
//! rows through it, one native call per cell and one per row commit. Rows
//! come either as slices of [Value] or as Arrow record batches.
//!
//! Any failed native call poisons the session: the engine's error text is
//! returned, later appends fail with [Status::InvalidState], and the
//! appender is destroyed when the session is dropped.

use std::ffi::CString;
use std::marker::PhantomData;

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    Time64MicrosecondType, TimestampMicrosecondType, UInt16Type, UInt32Type, UInt64Type,
    UInt8Type,
};
use arrow_array::{Array, RecordBatch};
use tracing::{debug, trace};

use crate::codec::Codec;
use crate::constants::{StateCode, DUCKDB_SUCCESS};
use crate::engine::{Disposer, NativeEngine, RawHandle};
use crate::error::{Error, Result, Status};
use crate::layout::{DateCell, TimeCell, TimestampCell};
use crate::options::AppendOptions;
use crate::tracker::{HandleId, ResourceScope, SharedHandle};
use crate::types::{ColumnDescriptor, TypeTag};

/// A host value appended to one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    /// Days since 1970-01-01.
    Date(i32),
    /// Microseconds since midnight.
    Time(i64),
    /// Microseconds since 1970-01-01.
    Timestamp(i64),
    Varchar(String),
}

impl Value {
    /// The type tag of the value, `None` for [Value::Null].
    pub fn type_tag(&self) -> Option<TypeTag> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::Int8(_) => TypeTag::Int8,
            Value::Int16(_) => TypeTag::Int16,
            Value::Int32(_) => TypeTag::Int32,
            Value::Int64(_) => TypeTag::Int64,
            Value::UInt8(_) => TypeTag::UInt8,
            Value::UInt16(_) => TypeTag::UInt16,
            Value::UInt32(_) => TypeTag::UInt32,
            Value::UInt64(_) => TypeTag::UInt64,
            Value::Float32(_) => TypeTag::Float32,
            Value::Float64(_) => TypeTag::Float64,
            Value::Date(_) => TypeTag::Date,
            Value::Time(_) => TypeTag::Time,
            Value::Timestamp(_) => TypeTag::Timestamp,
            Value::Varchar(_) => TypeTag::Varchar,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! value_from {
    ($($native:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$native> for Value {
                fn from(value: $native) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from!(
    bool => Boolean,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => Varchar,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Appends one non-null [Value]. Returns `None` when the value does not
/// match the function's type.
pub type AppendValueFn = unsafe fn(appender: RawHandle, value: &Value) -> Option<StateCode>;

/// Appends the non-null value at `row` of an Arrow array whose data type
/// matches the function's type.
pub type AppendArrayFn = unsafe fn(appender: RawHandle, array: &dyn Array, row: usize) -> StateCode;

macro_rules! append_value_fn {
    ($name:ident, $variant:ident, $call:ident) => {
        unsafe fn $name<E: NativeEngine>(appender: RawHandle, value: &Value) -> Option<StateCode> {
            match value {
                Value::$variant(value) => Some(E::$call(appender, *value)),
                _ => None,
            }
        }
    };
}

append_value_fn!(append_bool_value, Boolean, append_bool);
append_value_fn!(append_int8_value, Int8, append_int8);
append_value_fn!(append_int16_value, Int16, append_int16);
append_value_fn!(append_int32_value, Int32, append_int32);
append_value_fn!(append_int64_value, Int64, append_int64);
append_value_fn!(append_uint8_value, UInt8, append_uint8);
append_value_fn!(append_uint16_value, UInt16, append_uint16);
append_value_fn!(append_uint32_value, UInt32, append_uint32);
append_value_fn!(append_uint64_value, UInt64, append_uint64);
append_value_fn!(append_float_value, Float32, append_float);
append_value_fn!(append_double_value, Float64, append_double);

unsafe fn append_date_value<E: NativeEngine>(appender: RawHandle, value: &Value) -> Option<StateCode> {
    match value {
        Value::Date(days) => Some(E::append_date(appender, DateCell { days: *days })),
        _ => None,
    }
}

unsafe fn append_time_value<E: NativeEngine>(appender: RawHandle, value: &Value) -> Option<StateCode> {
    match value {
        Value::Time(micros) => Some(E::append_time(appender, TimeCell { micros: *micros })),
        _ => None,
    }
}

unsafe fn append_timestamp_value<E: NativeEngine>(
    appender: RawHandle,
    value: &Value,
) -> Option<StateCode> {
    match value {
        Value::Timestamp(micros) => Some(E::append_timestamp(
            appender,
            TimestampCell { micros: *micros },
        )),
        _ => None,
    }
}

unsafe fn append_varchar_value<E: NativeEngine>(
    appender: RawHandle,
    value: &Value,
) -> Option<StateCode> {
    match value {
        Value::Varchar(text) => Some(E::append_varchar(
            appender,
            text.as_ptr().cast(),
            text.len() as u64,
        )),
        _ => None,
    }
}

/// The [Value] append function of a type tag.
pub fn value_appender<E: NativeEngine>(tag: TypeTag) -> AppendValueFn {
    match tag {
        TypeTag::Boolean => append_bool_value::<E>,
        TypeTag::Int8 => append_int8_value::<E>,
        TypeTag::Int16 => append_int16_value::<E>,
        TypeTag::Int32 => append_int32_value::<E>,
        TypeTag::Int64 => append_int64_value::<E>,
        TypeTag::UInt8 => append_uint8_value::<E>,
        TypeTag::UInt16 => append_uint16_value::<E>,
        TypeTag::UInt32 => append_uint32_value::<E>,
        TypeTag::UInt64 => append_uint64_value::<E>,
        TypeTag::Float32 => append_float_value::<E>,
        TypeTag::Float64 => append_double_value::<E>,
        TypeTag::Date => append_date_value::<E>,
        TypeTag::Time => append_time_value::<E>,
        TypeTag::Timestamp => append_timestamp_value::<E>,
        TypeTag::Varchar => append_varchar_value::<E>,
    }
}

macro_rules! append_array_fn {
    ($name:ident, $arrow:ty, $call:ident) => {
        unsafe fn $name<E: NativeEngine>(appender: RawHandle, array: &dyn Array, row: usize) -> StateCode {
            E::$call(appender, array.as_primitive::<$arrow>().value(row))
        }
    };
}

append_array_fn!(append_int8_array, Int8Type, append_int8);
append_array_fn!(append_int16_array, Int16Type, append_int16);
append_array_fn!(append_int32_array, Int32Type, append_int32);
append_array_fn!(append_int64_array, Int64Type, append_int64);
append_array_fn!(append_uint8_array, UInt8Type, append_uint8);
append_array_fn!(append_uint16_array, UInt16Type, append_uint16);
append_array_fn!(append_uint32_array, UInt32Type, append_uint32);
append_array_fn!(append_uint64_array, UInt64Type, append_uint64);
append_array_fn!(append_float_array, Float32Type, append_float);
append_array_fn!(append_double_array, Float64Type, append_double);

unsafe fn append_bool_array<E: NativeEngine>(appender: RawHandle, array: &dyn Array, row: usize) -> StateCode {
    E::append_bool(appender, array.as_boolean().value(row))
}

unsafe fn append_date_array<E: NativeEngine>(appender: RawHandle, array: &dyn Array, row: usize) -> StateCode {
    let days = array.as_primitive::<Date32Type>().value(row);
    E::append_date(appender, DateCell { days })
}

unsafe fn append_time_array<E: NativeEngine>(appender: RawHandle, array: &dyn Array, row: usize) -> StateCode {
    let micros = array.as_primitive::<Time64MicrosecondType>().value(row);
    E::append_time(appender, TimeCell { micros })
}

unsafe fn append_timestamp_array<E: NativeEngine>(
    appender: RawHandle,
    array: &dyn Array,
    row: usize,
) -> StateCode {
    let micros = array.as_primitive::<TimestampMicrosecondType>().value(row);
    E::append_timestamp(appender, TimestampCell { micros })
}

unsafe fn append_varchar_array<E: NativeEngine>(
    appender: RawHandle,
    array: &dyn Array,
    row: usize,
) -> StateCode {
    let text = array.as_string::<i32>().value(row);
    E::append_varchar(appender, text.as_ptr().cast(), text.len() as u64)
}

/// The Arrow append function of a type tag.
pub fn array_appender<E: NativeEngine>(tag: TypeTag) -> AppendArrayFn {
    match tag {
        TypeTag::Boolean => append_bool_array::<E>,
        TypeTag::Int8 => append_int8_array::<E>,
        TypeTag::Int16 => append_int16_array::<E>,
        TypeTag::Int32 => append_int32_array::<E>,
        TypeTag::Int64 => append_int64_array::<E>,
        TypeTag::UInt8 => append_uint8_array::<E>,
        TypeTag::UInt16 => append_uint16_array::<E>,
        TypeTag::UInt32 => append_uint32_array::<E>,
        TypeTag::UInt64 => append_uint64_array::<E>,
        TypeTag::Float32 => append_float_array::<E>,
        TypeTag::Float64 => append_double_array::<E>,
        TypeTag::Date => append_date_array::<E>,
        TypeTag::Time => append_time_array::<E>,
        TypeTag::Timestamp => append_timestamp_array::<E>,
        TypeTag::Varchar => append_varchar_array::<E>,
    }
}

/// State of an [AppenderSession].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppenderState {
    /// Rows can be appended.
    Open,
    /// A native call failed. Only dropping the session is allowed.
    Failed,
}

/// A native appender bound to one table.
pub struct AppenderSession<E: NativeEngine> {
    // Declared first so the appender is destroyed before the connection
    // reference is released.
    scope: ResourceScope,
    appender: HandleId,
    _connection: SharedHandle,
    table: String,
    columns: Vec<ColumnDescriptor>,
    codecs: Vec<Codec>,
    options: AppendOptions,
    state: AppenderState,
    rows_appended: u64,
    _engine: PhantomData<fn() -> E>,
}

impl<E: NativeEngine> AppenderSession<E> {
    /// Creates an appender on `table` of the schema in `options`.
    ///
    /// `columns` lists the table's columns in table order. Fails with
    /// [Status::NativeCallFailure] and the engine's error text if the
    /// appender cannot be created, for instance when the table does not
    /// exist.
    pub fn open(
        connection: &SharedHandle,
        table: &str,
        columns: Vec<ColumnDescriptor>,
        options: AppendOptions,
    ) -> Result<Self> {
        let schema = CString::new(options.schema.as_str())?;
        let table_name = CString::new(table)?;
        let mut scope = ResourceScope::new("appender");
        let appender = scope.acquire("appender", E::appender_destroy as Disposer, |slot| {
            // SAFETY: the connection is alive and the names are NUL-terminated.
            unsafe {
                let state =
                    E::appender_create(connection.address(), schema.as_ptr(), table_name.as_ptr(), slot);
                if state != DUCKDB_SUCCESS {
                    let message = match slot.is_null() {
                        true => std::ptr::null(),
                        false => E::appender_error(*slot),
                    };
                    return Err(Error::from_native("duckdb_appender_create", message));
                }
            }
            Ok(())
        })?;
        debug!(
            engine = E::NAME,
            schema = options.schema.as_str(),
            table,
            columns = columns.len(),
            "appender opened"
        );
        Ok(Self {
            scope,
            appender,
            _connection: connection.clone(),
            table: table.to_string(),
            codecs: columns.iter().map(|c| c.type_tag.codec::<E>()).collect(),
            columns,
            options,
            state: AppenderState::Open,
            rows_appended: 0,
            _engine: PhantomData,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn state(&self) -> AppenderState {
        self.state
    }

    /// Rows committed so far.
    pub fn rows_appended(&self) -> u64 {
        self.rows_appended
    }

    /// Appends one row. Values must follow the column order and either be
    /// [Value::Null] or match the column's type.
    pub fn append_row(&mut self, row: &[Value]) -> Result<()> {
        let appender = self.live_appender()?;
        if row.len() != self.columns.len() {
            return Err(Error::with_message_and_status(
                format!(
                    "Row has {} values but table '{}' has {} columns",
                    row.len(),
                    self.table,
                    self.columns.len()
                ),
                Status::InvalidArguments,
            ));
        }
        for (value, column) in row.iter().zip(&self.columns) {
            if let Some(tag) = value.type_tag() {
                if tag != column.type_tag {
                    return Err(Error::with_message_and_status(
                        format!(
                            "Column '{}' expects {:?}, found {value:?}",
                            column.name, column.type_tag
                        ),
                        Status::InvalidArguments,
                    ));
                }
            }
        }

        for (column, value) in row.iter().enumerate() {
            let append = self.codecs[column].append_value;
            // SAFETY: the appender is live.
            let state = match value {
                Value::Null => unsafe { E::append_null(appender) },
                value => unsafe { append(appender, value) }.ok_or_else(|| {
                    Error::with_message_and_status(
                        format!("No append function for {value:?}"),
                        Status::Internal,
                    )
                })?,
            };
            self.check(appender, "duckdb_append", state)?;
        }
        self.end_row(appender)
    }

    /// Appends every row of `batch`, whose columns must match the session's
    /// columns in order and type.
    pub fn append_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let appender = self.live_appender()?;
        if batch.num_columns() != self.columns.len() {
            return Err(Error::with_message_and_status(
                format!(
                    "Batch has {} columns but table '{}' has {}",
                    batch.num_columns(),
                    self.table,
                    self.columns.len()
                ),
                Status::InvalidArguments,
            ));
        }
        let mut append_fns = Vec::with_capacity(self.columns.len());
        for ((array, column), codec) in batch.columns().iter().zip(&self.columns).zip(&self.codecs) {
            if array.data_type() != &codec.data_type {
                return Err(Error::with_message_and_status(
                    format!(
                        "Column '{}' expects Arrow type {}, found {}",
                        column.name,
                        codec.data_type,
                        array.data_type()
                    ),
                    Status::InvalidArguments,
                ));
            }
            append_fns.push(codec.append_array);
        }

        for row in 0..batch.num_rows() {
            for (array, append) in batch.columns().iter().zip(&append_fns) {
                // SAFETY: the appender is live; array types were checked above.
                let state = unsafe {
                    match array.is_null(row) {
                        true => E::append_null(appender),
                        false => append(appender, array.as_ref(), row),
                    }
                };
                self.check(appender, "duckdb_append", state)?;
            }
            self.end_row(appender)?;
        }
        trace!(table = self.table.as_str(), rows = batch.num_rows(), "appended batch");
        Ok(())
    }

    /// Writes buffered rows to the table.
    pub fn flush(&mut self) -> Result<()> {
        let appender = self.live_appender()?;
        // SAFETY: the appender is live.
        let state = unsafe { E::appender_flush(appender) };
        self.check(appender, "duckdb_appender_flush", state)?;
        trace!(table = self.table.as_str(), rows = self.rows_appended, "appender flushed");
        Ok(())
    }

    /// Flushes and closes the appender, then destroys it. Returns the number
    /// of rows appended.
    pub fn close(mut self) -> Result<u64> {
        let appender = self.live_appender()?;
        // SAFETY: the appender is live.
        let state = unsafe { E::appender_close(appender) };
        self.check(appender, "duckdb_appender_close", state)?;
        debug!(
            engine = E::NAME,
            table = self.table.as_str(),
            rows = self.rows_appended,
            "appender closed"
        );
        Ok(self.rows_appended)
    }

    fn live_appender(&self) -> Result<RawHandle> {
        match self.state {
            AppenderState::Open => self.scope.address(self.appender),
            AppenderState::Failed => Err(Error::with_message_and_status(
                format!("Appender on '{}' failed earlier and must be dropped", self.table),
                Status::InvalidState,
            )),
        }
    }

    fn end_row(&mut self, appender: RawHandle) -> Result<()> {
        // SAFETY: the appender is live.
        let state = unsafe { E::appender_end_row(appender) };
        self.check(appender, "duckdb_appender_end_row", state)?;
        self.rows_appended += 1;
        let every = self.options.flush_every_rows;
        if every > 0 && self.rows_appended % every == 0 {
            self.flush()?;
        }
        Ok(())
    }

    fn check(&mut self, appender: RawHandle, call: &str, state: StateCode) -> Result<()> {
        if state == DUCKDB_SUCCESS {
            return Ok(());
        }
        self.state = AppenderState::Failed;
        // SAFETY: the appender is still live; its error text is read before
        // it can be destroyed.
        Err(unsafe { Error::from_native(call, E::appender_error(appender)) })
    }
}

impl<E: NativeEngine> std::fmt::Debug for AppenderSession<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppenderSession")
            .field("engine", &E::NAME)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("state", &self.state)
            .field("rows_appended", &self.rows_appended)
            .finish()
    }
}

/// Opens an appender, appends `rows` and closes it. Returns the number of
/// rows appended. The appender is destroyed exactly once on every path.
pub fn bulk_load<E, I, R>(
    connection: &SharedHandle,
    table: &str,
    columns: Vec<ColumnDescriptor>,
    rows: I,
    options: AppendOptions,
) -> Result<u64>
where
    E: NativeEngine,
    I: IntoIterator<Item = R>,
    R: AsRef<[Value]>,
{
    let mut session = AppenderSession::<E>::open(connection, table, columns, options)?;
    for row in rows {
        session.append_row(row.as_ref())?;
    }
    session.close()
}

/// Opens an appender, appends every batch and closes it. The columns are
/// derived from the first batch's schema.
pub fn bulk_load_batches<E: NativeEngine>(
    connection: &SharedHandle,
    table: &str,
    batches: &[RecordBatch],
    options: AppendOptions,
) -> Result<u64> {
    let Some(first) = batches.first() else {
        return Ok(0);
    };
    let columns = crate::schemas::columns_from_schema(&first.schema())?;
    let mut session = AppenderSession::<E>::open(connection, table, columns, options)?;
    for batch in batches {
        session.append_batch(batch)?;
    }
    session.close()
}
