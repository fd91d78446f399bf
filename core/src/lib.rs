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

//! duckview: Arrow views over an embedded DuckDB
//!
//! The core library reads DuckDB query results straight out of the engine's
//! memory and writes host data back through the engine's appender, using
//! only the engine's C call interface.
//!
//! Reading goes through [query][assemble::query]: the result is walked one
//! data chunk at a time, each column becomes a typed view over the engine's
//! vector buffer ([decode::ColumnValues]) plus the set of missing rows
//! ([validity::MissingRows]), and chunks convert to Arrow record batches
//! without copying fixed-width data.
//!
//! Writing goes through [AppenderSession][append::AppenderSession], which
//! accepts rows of [Value][append::Value] or Arrow record batches.
//!
//! Every native handle is owned by the [tracker]. Views keep the handles
//! they read from alive; handles are destroyed exactly once, in order,
//! on success and failure paths alike.
//!
//! The engine itself is abstracted by [NativeEngine][engine::NativeEngine];
//! the `duckview_native` crate implements it over the linked DuckDB
//! library.

pub mod append;
pub mod assemble;
pub mod codec;
pub mod constants;
pub mod decode;
pub mod engine;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod options;
pub mod schemas;
pub mod tracker;
pub mod types;
pub mod validity;

pub use append::{bulk_load, bulk_load_batches, AppenderSession, AppenderState, Value};
pub use assemble::{query, AssemblyState, Chunk, ColumnBatch, QueryReader, QueryResult};
pub use engine::{Disposer, NativeEngine, RawHandle};
pub use error::{Error, Result, Status};
pub use types::{ColumnDescriptor, TypeTag};
