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

//! Binary layouts of the engine structures read from foreign memory.
//!
//! Every type here is `#[repr(C)]` and mirrors one structure of `duckdb.h`
//! for a 64-bit target. Nothing in this module copies: accessors interpret
//! an address in place. The layouts are a fixed contract with one ABI
//! version of the engine; [LayoutSignature::verify] is run once when the
//! engine is bound and refuses to continue on any difference.

#![allow(non_camel_case_types)]

use std::mem::{align_of, offset_of, size_of};
use std::os::raw::{c_char, c_void};
use std::ptr::null_mut;

use crate::constants::{self, TypeCode, STRING_INLINE_LENGTH};
use crate::error::{Error, Result, Status};
use crate::types::TypeTag;

/// Mirror of `duckdb_result`.
///
/// The engine fills this structure in place; it is passed by pointer to
/// every introspection call and by value to the chunk calls.
#[repr(C)]
#[derive(Debug)]
pub struct ResultLayout {
    pub column_count: u64,
    pub row_count: u64,
    pub rows_changed: u64,
    pub columns: *mut c_void,
    /// Set by the engine when the query fails. Owned by the result.
    pub error_message: *mut c_char,
    pub internal_data: *mut c_void,
}

impl ResultLayout {
    pub fn zeroed() -> Self {
        Self {
            column_count: 0,
            row_count: 0,
            rows_changed: 0,
            columns: null_mut(),
            error_message: null_mut(),
            internal_data: null_mut(),
        }
    }

    /// Reads the error message embedded in a result at `address`.
    ///
    /// # Safety
    ///
    /// `address` must point to a live [ResultLayout].
    pub unsafe fn error_message_at(address: *const ResultLayout) -> *const c_char {
        (*address).error_message
    }
}

/// Mirror of the opaque handle structs (`_duckdb_data_chunk`,
/// `_duckdb_vector`, `_duckdb_logical_type`, `_duckdb_appender`, ...).
///
/// Handles are pointers to this one-field struct; the bridge never
/// dereferences them, it only forwards them to the engine.
#[repr(C)]
#[derive(Debug)]
pub struct HandleLayout {
    pub internal_ptr: *mut c_void,
}

/// Pointer variant of the 16-byte string cell.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PointerString {
    pub length: u32,
    pub prefix: [u8; 4],
    pub ptr: *const u8,
}

/// Inline variant of the 16-byte string cell.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InlineString {
    pub length: u32,
    pub inlined: [u8; STRING_INLINE_LENGTH],
}

/// Mirror of `duckdb_string_t`.
///
/// `length` is authoritative in both variants. Strings are not
/// NUL-terminated and bytes past `length` are unspecified.
#[repr(C)]
#[derive(Clone, Copy)]
pub union StringCell {
    pub pointer: PointerString,
    pub inlined: InlineString,
}

impl StringCell {
    /// Builds an inline cell. `bytes` must be at most 12 bytes long.
    pub fn inline(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > STRING_INLINE_LENGTH {
            return Err(Error::with_message_and_status(
                format!("{} bytes do not fit an inline string cell", bytes.len()),
                Status::InvalidArguments,
            ));
        }
        let mut inlined = [0u8; STRING_INLINE_LENGTH];
        inlined[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            inlined: InlineString {
                length: bytes.len() as u32,
                inlined,
            },
        })
    }

    /// Builds a pointer cell referencing `bytes`. The caller keeps `bytes`
    /// alive for as long as the cell is read.
    pub fn pointer(bytes: &[u8]) -> Self {
        let mut prefix = [0u8; 4];
        let head = bytes.len().min(prefix.len());
        prefix[..head].copy_from_slice(&bytes[..head]);
        Self {
            pointer: PointerString {
                length: bytes.len() as u32,
                prefix,
                ptr: bytes.as_ptr(),
            },
        }
    }

    pub fn len(&self) -> usize {
        // SAFETY: both variants start with the same `u32` length.
        unsafe { self.inlined.length as usize }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_inlined(&self) -> bool {
        self.len() <= STRING_INLINE_LENGTH
    }

    /// Resolves the cell to its bytes, reading exactly `len()` bytes.
    ///
    /// # Safety
    ///
    /// For cells longer than 12 bytes the pointer field must reference at
    /// least `len()` readable bytes that outlive `'a`.
    pub unsafe fn bytes<'a>(&'a self) -> &'a [u8] {
        let length = self.len();
        if length <= STRING_INLINE_LENGTH {
            &self.inlined.inlined[..length]
        } else {
            std::slice::from_raw_parts(self.pointer.ptr, length)
        }
    }
}

impl std::fmt::Debug for StringCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringCell")
            .field("length", &self.len())
            .field("inlined", &self.is_inlined())
            .finish()
    }
}

/// Mirror of `duckdb_date`: days since 1970-01-01.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateCell {
    pub days: i32,
}

/// Mirror of `duckdb_time`: microseconds since midnight.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeCell {
    pub micros: i64,
}

/// Mirror of `duckdb_timestamp`: microseconds since 1970-01-01 00:00:00.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampCell {
    pub micros: i64,
}

/// Sizes, offsets and type codes the bridge depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSignature {
    pub result_size: usize,
    pub result_rows_changed_offset: usize,
    pub result_error_message_offset: usize,
    pub result_internal_data_offset: usize,
    pub handle_size: usize,
    pub string_cell_size: usize,
    pub string_cell_align: usize,
    pub string_pointer_offset: usize,
    pub date_size: usize,
    pub time_size: usize,
    pub timestamp_size: usize,
    pub validity_word_size: usize,
    pub type_codes: Vec<(TypeTag, TypeCode)>,
}

impl LayoutSignature {
    /// The signature of the layouts declared in this module.
    pub fn expected() -> Self {
        Self {
            result_size: size_of::<ResultLayout>(),
            result_rows_changed_offset: offset_of!(ResultLayout, rows_changed),
            result_error_message_offset: offset_of!(ResultLayout, error_message),
            result_internal_data_offset: offset_of!(ResultLayout, internal_data),
            handle_size: size_of::<HandleLayout>(),
            string_cell_size: size_of::<StringCell>(),
            string_cell_align: align_of::<StringCell>(),
            string_pointer_offset: offset_of!(PointerString, ptr),
            date_size: size_of::<DateCell>(),
            time_size: size_of::<TimeCell>(),
            timestamp_size: size_of::<TimestampCell>(),
            validity_word_size: constants::VALIDITY_WORD_BITS / 8,
            type_codes: TypeTag::ALL.iter().map(|tag| (*tag, tag.code())).collect(),
        }
    }

    /// Compares `actual`, measured on the linked engine, with the expected
    /// layouts. Any difference is an [Status::AbiMismatch].
    pub fn verify(&self, actual: &LayoutSignature) -> Result<()> {
        let mut mismatches = Vec::new();
        let mut check = |name: &str, expected: usize, found: usize| {
            if expected != found {
                mismatches.push(format!("{name}: expected {expected}, found {found}"));
            }
        };
        check("result size", self.result_size, actual.result_size);
        check(
            "result rows_changed offset",
            self.result_rows_changed_offset,
            actual.result_rows_changed_offset,
        );
        check(
            "result error_message offset",
            self.result_error_message_offset,
            actual.result_error_message_offset,
        );
        check(
            "result internal_data offset",
            self.result_internal_data_offset,
            actual.result_internal_data_offset,
        );
        check("handle size", self.handle_size, actual.handle_size);
        check("string cell size", self.string_cell_size, actual.string_cell_size);
        check(
            "string cell alignment",
            self.string_cell_align,
            actual.string_cell_align,
        );
        check(
            "string pointer offset",
            self.string_pointer_offset,
            actual.string_pointer_offset,
        );
        check("date size", self.date_size, actual.date_size);
        check("time size", self.time_size, actual.time_size);
        check("timestamp size", self.timestamp_size, actual.timestamp_size);
        check(
            "validity word size",
            self.validity_word_size,
            actual.validity_word_size,
        );

        for (tag, code) in &self.type_codes {
            match actual.type_codes.iter().find(|(other, _)| other == tag) {
                Some((_, found)) if found != code => mismatches.push(format!(
                    "type code of {tag:?}: expected {code}, found {found}"
                )),
                Some(_) => (),
                None => mismatches.push(format!("type code of {tag:?}: missing")),
            }
        }

        match mismatches.is_empty() {
            true => Ok(()),
            false => Err(Error::with_message_and_status(
                format!(
                    "Engine ABI does not match the native layouts: {}",
                    mismatches.join("; ")
                ),
                Status::AbiMismatch,
            )),
        }
    }
}
