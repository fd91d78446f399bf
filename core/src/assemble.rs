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

//! Query execution and result assembly.
//!
//! [query] runs a statement and returns a [QueryResult], which owns the
//! native result object and yields one [Chunk] per engine data chunk, in
//! engine order. Chunks are decoded lazily as the result is iterated; each
//! chunk keeps its own native handle, and through it the result, alive.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch, RecordBatchOptions, RecordBatchReader};
use arrow_schema::{ArrowError, SchemaRef};
use tracing::debug;

use crate::constants::DUCKDB_SUCCESS;
use crate::decode::ColumnValues;
use crate::engine::{Disposer, NativeEngine, RawHandle};
use crate::error::{Error, Result, Status};
use crate::layout::ResultLayout;
use crate::options::DecodeOptions;
use crate::schemas::result_schema;
use crate::tracker::{ResourceScope, SharedHandle};
use crate::types::{ColumnDescriptor, TypeTag};
use crate::validity::{decode_validity, MissingRows};

/// Progress of a result through assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// Columns are described, no chunk was read yet.
    Created,
    /// At least one chunk was read and more remain.
    Decoding,
    /// Every chunk was read, or assembly stopped on an error.
    Done,
    /// The engine produced a streaming result, which is never decoded.
    StreamingRejected,
}

/// One decoded column of a chunk.
#[derive(Debug)]
pub struct ColumnBatch {
    pub name: String,
    pub type_tag: TypeTag,
    pub missing: Arc<MissingRows>,
    pub values: ColumnValues,
}

impl ColumnBatch {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_missing(&self, row: usize) -> bool {
        self.missing.contains(row)
    }

    pub fn to_array(&self, options: &DecodeOptions) -> Result<ArrayRef> {
        self.values.to_array(&self.missing, options)
    }
}

/// The decoded columns of one engine data chunk.
///
/// Column views are valid for as long as the chunk, or any array built
/// from it, is alive.
#[derive(Debug)]
pub struct Chunk {
    index: usize,
    row_count: usize,
    columns: Vec<ColumnBatch>,
    schema: SchemaRef,
    options: DecodeOptions,
    handle: SharedHandle,
}

impl Chunk {
    /// Position of the chunk in the result.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[ColumnBatch] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnBatch> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn into_columns(self) -> Vec<ColumnBatch> {
        self.columns
    }

    /// The native data chunk backing the columns.
    pub fn handle(&self) -> &SharedHandle {
        &self.handle
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let arrays = self
            .columns
            .iter()
            .map(|column| column.to_array(&self.options))
            .collect::<Result<Vec<_>>>()?;
        let options = RecordBatchOptions::new().with_row_count(Some(self.row_count));
        Ok(RecordBatch::try_new_with_options(
            self.schema.clone(),
            arrays,
            &options,
        )?)
    }
}

/// Destroys a result object and frees the memory holding its layout.
unsafe fn release_result<E: NativeEngine>(address: RawHandle) {
    let layout = address as *mut ResultLayout;
    E::destroy_result(layout);
    drop(Box::from_raw(layout));
}

/// Runs `sql` on `connection` and describes the materialized result.
///
/// Streaming results are rejected with [Status::UnsupportedFeature] before
/// any chunk is acquired. On failure the result object is destroyed and the
/// engine's error text is returned with [Status::NativeCallFailure].
pub fn query<E: NativeEngine>(
    connection: &SharedHandle,
    sql: &str,
    options: DecodeOptions,
) -> Result<QueryResult<E>> {
    let statement = CString::new(sql)?;
    debug!(engine = E::NAME, sql, "executing query");
    let result = SharedHandle::acquire(
        "result",
        release_result::<E>,
        Some(connection),
        |slot| {
            let layout = Box::into_raw(Box::new(ResultLayout::zeroed()));
            *slot = layout.cast();
            // SAFETY: `connection` is live while we hold a reference to it and
            // `layout` points to a zeroed result structure.
            unsafe {
                if E::query(connection.address(), statement.as_ptr(), layout) != DUCKDB_SUCCESS {
                    let mut message = ResultLayout::error_message_at(layout);
                    if message.is_null() {
                        message = E::result_error(layout);
                    }
                    return Err(Error::from_native("duckdb_query", message));
                }
            }
            Ok(())
        },
    )?;
    QueryResult::from_raw(result, options)
}

/// A materialized query result, iterated one [Chunk] at a time.
///
/// Decoding errors end the iteration: the failing chunk yields the error
/// and no chunk follows it.
pub struct QueryResult<E: NativeEngine> {
    result: SharedHandle,
    columns: Vec<ColumnDescriptor>,
    schema: SchemaRef,
    chunk_count: usize,
    next_chunk: usize,
    rows_changed: u64,
    state: AssemblyState,
    options: DecodeOptions,
    _engine: PhantomData<fn() -> E>,
}

impl<E: NativeEngine> QueryResult<E> {
    /// Describes the result held by `result`, which must be a handle created
    /// by [NativeEngine::query] whose address is a [ResultLayout].
    pub(crate) fn from_raw(result: SharedHandle, options: DecodeOptions) -> Result<Self> {
        let layout = result.address() as *mut ResultLayout;
        // SAFETY: `result` keeps the layout alive.
        if unsafe { E::result_is_streaming(layout) } {
            debug!(
                engine = E::NAME,
                state = ?AssemblyState::StreamingRejected,
                "refusing streaming result"
            );
            return Err(Error::with_message_and_status(
                "Streaming results are not supported, materialize the query instead",
                Status::UnsupportedFeature,
            ));
        }

        let columns = describe_columns::<E>(layout)?;
        // SAFETY: as above.
        let (chunk_count, rows_changed) = unsafe {
            (
                E::result_chunk_count(layout) as usize,
                E::rows_changed(layout),
            )
        };
        debug!(
            engine = E::NAME,
            columns = columns.len(),
            chunk_count,
            rows_changed,
            "result materialized"
        );
        Ok(Self {
            result,
            schema: result_schema(&columns),
            columns,
            chunk_count,
            next_chunk: 0,
            rows_changed,
            state: AssemblyState::Created,
            options,
            _engine: PhantomData,
        })
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Rows inserted, updated or deleted by the statement.
    pub fn rows_changed(&self) -> u64 {
        self.rows_changed
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// The native result handle.
    pub fn handle(&self) -> &SharedHandle {
        &self.result
    }

    /// Reads every remaining chunk. Fails on the first decoding error.
    pub fn collect_chunks(self) -> Result<Vec<Chunk>> {
        self.collect()
    }

    /// Reads every remaining chunk as an Arrow record batch.
    pub fn into_record_batches(self) -> Result<Vec<RecordBatch>> {
        self.map(|chunk| chunk?.to_record_batch()).collect()
    }

    /// An Arrow reader over the remaining chunks.
    pub fn into_reader(self) -> QueryReader<E> {
        QueryReader { inner: self }
    }

    fn read_chunk(&self, index: usize) -> Result<Chunk> {
        let layout = self.result.address() as *mut ResultLayout;
        let chunk = SharedHandle::acquire(
            "data_chunk",
            E::destroy_chunk as Disposer,
            Some(&self.result),
            |slot| {
                // SAFETY: the result is alive and `index` is below the chunk count.
                *slot = unsafe { E::result_get_chunk(layout, index as u64) };
                Ok(())
            },
        )?;

        // SAFETY: `chunk` is a live data chunk; vectors belong to it and are
        // not released separately.
        let row_count = unsafe { E::chunk_size(chunk.address()) } as usize;
        let mut columns = Vec::with_capacity(self.columns.len());
        for (position, column) in self.columns.iter().enumerate() {
            let vector = unsafe { E::chunk_vector(chunk.address(), position as u64) };
            if vector.is_null() {
                return Err(Error::with_message_and_status(
                    format!("Chunk {index} has no vector for column '{}'", column.name),
                    Status::NativeCallFailure,
                ));
            }
            let missing = Arc::new(unsafe { decode_validity(row_count, E::vector_validity(vector)) });
            let decode = column.type_tag.codec::<E>().decode;
            let values = unsafe { decode(E::vector_data(vector), row_count, &chunk, &missing)? };
            columns.push(ColumnBatch {
                name: column.name.clone(),
                type_tag: column.type_tag,
                missing,
                values,
            });
        }

        Ok(Chunk {
            index,
            row_count,
            columns,
            schema: self.schema.clone(),
            options: self.options,
            handle: chunk,
        })
    }
}

impl<E: NativeEngine> Iterator for QueryResult<E> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == AssemblyState::Done || self.next_chunk >= self.chunk_count {
            self.state = AssemblyState::Done;
            return None;
        }
        let index = self.next_chunk;
        self.next_chunk += 1;
        let chunk = self.read_chunk(index);
        self.state = match (&chunk, self.next_chunk < self.chunk_count) {
            (Ok(_), true) => AssemblyState::Decoding,
            _ => AssemblyState::Done,
        };
        Some(chunk)
    }
}

impl<E: NativeEngine> std::fmt::Debug for QueryResult<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("engine", &E::NAME)
            .field("columns", &self.columns)
            .field("chunk_count", &self.chunk_count)
            .field("next_chunk", &self.next_chunk)
            .field("state", &self.state)
            .finish()
    }
}

fn describe_columns<E: NativeEngine>(layout: *mut ResultLayout) -> Result<Vec<ColumnDescriptor>> {
    // SAFETY: the caller holds the result handle owning `layout`.
    let column_count = unsafe { E::column_count(layout) };
    let mut scope = ResourceScope::new("describe_columns");
    let mut columns = Vec::with_capacity(column_count as usize);
    for column in 0..column_count {
        let name = unsafe { E::column_name(layout, column) };
        let name = match name.is_null() {
            true => format!("column{column}"),
            false => unsafe { CStr::from_ptr(name) }.to_str()?.to_string(),
        };
        let logical_type = scope.acquire(
            "logical_type",
            E::destroy_logical_type as Disposer,
            |slot| {
                *slot = unsafe { E::column_logical_type(layout, column) };
                Ok(())
            },
        )?;
        let code = unsafe { E::logical_type_id(scope.address(logical_type)?) };
        scope.dispose(logical_type);
        let type_tag = TypeTag::try_from(code).map_err(|error| {
            Error::with_message_and_status(
                format!("Column '{name}': {}", error.message),
                error.status,
            )
        })?;
        columns.push(ColumnDescriptor::new(name, type_tag));
    }
    Ok(columns)
}

/// Adapts a [QueryResult] to Arrow's [RecordBatchReader].
pub struct QueryReader<E: NativeEngine> {
    inner: QueryResult<E>,
}

impl<E: NativeEngine> Iterator for QueryReader<E> {
    type Item = std::result::Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|chunk| Ok(chunk?.to_record_batch()?))
    }
}

impl<E: NativeEngine> RecordBatchReader for QueryReader<E> {
    fn schema(&self) -> SchemaRef {
        self.inner.schema()
    }
}
