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

use std::path::Path;

use arrow_array::RecordBatch;
use duckview_core::append::{self, AppenderSession, Value};
use duckview_core::assemble::{self, QueryResult};
use duckview_core::lifecycle;
use duckview_core::options::{
    AppendOptions, DecodeOptions, OptionAppender, OptionQuery, OptionValue,
};
use duckview_core::tracker::SharedHandle;
use duckview_core::{ColumnDescriptor, Error, Result, Status};

use crate::engine::DuckDb;

/// An open DuckDB database.
///
/// Closed when the last of the database, its connections and their
/// results is dropped.
#[derive(Debug, Clone)]
pub struct Database {
    handle: SharedHandle,
}

impl Database {
    /// Opens or creates the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path = path.to_str().ok_or_else(|| {
            Error::with_message_and_status(
                format!("Database path is not valid UTF-8: {}", path.display()),
                Status::InvalidArguments,
            )
        })?;
        Ok(Self {
            handle: lifecycle::open_database::<DuckDb>(Some(path))?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            handle: lifecycle::open_database::<DuckDb>(None)?,
        })
    }

    pub fn connect(&self) -> Result<Connection> {
        Ok(Connection {
            handle: lifecycle::connect::<DuckDb>(&self.handle)?,
            decode_options: DecodeOptions::default(),
            append_options: AppendOptions::default(),
        })
    }
}

/// A connection to a [Database].
///
/// Methods take `&mut self`: a connection runs one statement at a time.
#[derive(Debug)]
pub struct Connection {
    handle: SharedHandle,
    decode_options: DecodeOptions,
    append_options: AppendOptions,
}

impl Connection {
    /// Sets a decode option for later queries.
    pub fn set_option(&mut self, key: OptionQuery, value: OptionValue) -> Result<()> {
        self.decode_options.set_option(key, value)
    }

    /// Sets an appender option for later appends.
    pub fn set_appender_option(&mut self, key: OptionAppender, value: OptionValue) -> Result<()> {
        self.append_options.set_option(key, value)
    }

    /// Runs `sql` and returns its materialized result.
    pub fn query(&mut self, sql: &str) -> Result<QueryResult<DuckDb>> {
        assemble::query::<DuckDb>(&self.handle, sql, self.decode_options)
    }

    /// Runs `sql` and returns the number of rows it changed.
    pub fn execute(&mut self, sql: &str) -> Result<u64> {
        Ok(self.query(sql)?.rows_changed())
    }

    /// Runs `sql` and reads the whole result as Arrow record batches.
    pub fn query_arrow(&mut self, sql: &str) -> Result<Vec<RecordBatch>> {
        self.query(sql)?.into_record_batches()
    }

    /// Opens an appender on `table`, whose columns are `columns` in table
    /// order.
    pub fn appender(
        &mut self,
        table: &str,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<AppenderSession<DuckDb>> {
        AppenderSession::open(&self.handle, table, columns, self.append_options.clone())
    }

    /// Appends `rows` to `table` and returns the number of rows appended.
    pub fn bulk_load<I, R>(
        &mut self,
        table: &str,
        columns: Vec<ColumnDescriptor>,
        rows: I,
    ) -> Result<u64>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[Value]>,
    {
        append::bulk_load::<DuckDb, _, _>(
            &self.handle,
            table,
            columns,
            rows,
            self.append_options.clone(),
        )
    }

    /// Appends every row of `batch` to `table`.
    pub fn append_record_batch(&mut self, table: &str, batch: &RecordBatch) -> Result<u64> {
        append::bulk_load_batches::<DuckDb>(
            &self.handle,
            table,
            std::slice::from_ref(batch),
            self.append_options.clone(),
        )
    }
}
