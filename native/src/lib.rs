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

//! DuckDB for duckview.
//!
//! Implements [NativeEngine][duckview_core::NativeEngine] over the DuckDB
//! library built and linked by `libduckdb-sys`, and wraps it in
//! [Database] and [Connection].
//!
//! ```no_run
//! # use duckview_native::Database;
//! # fn main() -> duckview_core::Result<()> {
//! let database = Database::open_in_memory()?;
//! let mut connection = database.connect()?;
//! let batches = connection.query_arrow("SELECT 42 AS answer")?;
//! assert_eq!(batches[0].num_rows(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! The library's binary layouts are verified against the ones
//! `duckview_core` reads the first time a database is opened.

pub mod connection;
pub mod engine;

pub use connection::{Connection, Database};
pub use engine::DuckDb;
