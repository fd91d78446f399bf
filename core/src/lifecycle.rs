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

//! Database and connection handles.

use std::ffi::CString;

use tracing::debug;

use crate::constants::DUCKDB_SUCCESS;
use crate::engine::{Disposer, NativeEngine};
use crate::error::{Error, Result, Status};
use crate::tracker::SharedHandle;

/// Opens a database file, or an in-memory database when `path` is `None`.
///
/// Binds the engine first.
pub fn open_database<E: NativeEngine>(path: Option<&str>) -> Result<SharedHandle> {
    E::bind()?;
    let path_c = path.map(CString::new).transpose()?;
    let database = SharedHandle::acquire("database", E::close as Disposer, None, |slot| {
        let path_ptr = path_c.as_ref().map_or(std::ptr::null(), |p| p.as_ptr());
        // SAFETY: `path_ptr` is null or NUL-terminated; `slot` is writable.
        match unsafe { E::open(path_ptr, slot) } {
            DUCKDB_SUCCESS => Ok(()),
            _ => Err(Error::with_message_and_status(
                format!("duckdb_open: cannot open '{}'", path.unwrap_or(":memory:")),
                Status::NativeCallFailure,
            )),
        }
    })?;
    debug!(engine = E::NAME, path = path.unwrap_or(":memory:"), "database opened");
    Ok(database)
}

/// Opens a connection. The connection keeps `database` alive.
pub fn connect<E: NativeEngine>(database: &SharedHandle) -> Result<SharedHandle> {
    SharedHandle::acquire(
        "connection",
        E::disconnect as Disposer,
        Some(database),
        |slot| {
            // SAFETY: the database is alive while referenced.
            match unsafe { E::connect(database.address(), slot) } {
                DUCKDB_SUCCESS => Ok(()),
                _ => Err(Error::with_message_and_status(
                    "duckdb_connect: cannot connect to database",
                    Status::NativeCallFailure,
                )),
            }
        },
    )
}
