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

//! Typed views over vector data buffers.
//!
//! A decoded column borrows the engine's buffer in place whenever the
//! buffer is suitably aligned, and keeps the chunk handle that owns the
//! buffer alive for as long as the view exists. Misaligned buffers are
//! copied, which never happens with buffers allocated by the engine.
//!
//! Conversion into Arrow arrays reuses the same buffers for fixed-width
//! types. Booleans and strings are materialized because their engine
//! encoding differs from Arrow's.

use std::mem::{align_of, size_of};
use std::ops::Deref;
use std::os::raw::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

use arrow_array::types::{
    ArrowPrimitiveType, Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, Time64MicrosecondType, TimestampMicrosecondType, UInt16Type, UInt32Type, UInt64Type,
    UInt8Type,
};
use arrow_array::{ArrayRef, BooleanArray, PrimitiveArray, StringArray};
use arrow_buffer::{BooleanBuffer, Buffer, OffsetBuffer, ScalarBuffer};

use crate::error::{Error, Result, Status};
use crate::layout::StringCell;
use crate::options::DecodeOptions;
use crate::tracker::SharedHandle;
use crate::types::TypeTag;
use crate::validity::MissingRows;

enum Data<T> {
    Borrowed { ptr: NonNull<T>, len: usize },
    Copied(Vec<T>),
}

/// A read-only slice of foreign memory kept alive by its owning handle.
pub struct NativeSlice<T> {
    data: Data<T>,
    owner: SharedHandle,
}

// SAFETY: the slice is read-only and `owner` keeps the memory alive; the
// handle itself is `Send + Sync`.
unsafe impl<T: Send> Send for NativeSlice<T> {}
// SAFETY: see above.
unsafe impl<T: Sync> Sync for NativeSlice<T> {}

impl<T: Copy> NativeSlice<T> {
    /// Views `len` values at `data`.
    ///
    /// # Safety
    ///
    /// `data` must be null only when `len` is zero, and otherwise point to
    /// `len` initialized values that stay unchanged while `owner` lives.
    pub unsafe fn new(data: *const T, len: usize, owner: SharedHandle) -> Result<Self> {
        if len == 0 {
            return Ok(Self {
                data: Data::Copied(Vec::new()),
                owner,
            });
        }
        let Some(ptr) = NonNull::new(data as *mut T) else {
            return Err(Error::with_message_and_status(
                format!("Vector of {len} rows has no data buffer"),
                Status::InvalidData,
            ));
        };
        let data = match (ptr.as_ptr() as usize) % align_of::<T>() {
            0 => Data::Borrowed { ptr, len },
            _ => Data::Copied(
                (0..len)
                    .map(|index| std::ptr::read_unaligned(ptr.as_ptr().add(index)))
                    .collect(),
            ),
        };
        Ok(Self { data, owner })
    }

    /// Whether the values are read in place.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.data, Data::Borrowed { .. })
    }

    /// The handle keeping the memory alive.
    pub fn owner(&self) -> &SharedHandle {
        &self.owner
    }
}

impl<T: arrow_buffer::ArrowNativeType> NativeSlice<T> {
    /// An Arrow buffer over the values. Shares the foreign memory when
    /// `zero_copy` is set and the slice is borrowed.
    pub fn to_scalar_buffer(&self, zero_copy: bool) -> ScalarBuffer<T> {
        match &self.data {
            Data::Borrowed { ptr, len } if zero_copy => {
                // SAFETY: the allocation is kept alive by the owner clone,
                // and the pointer is aligned for `T`.
                let buffer = unsafe {
                    Buffer::from_custom_allocation(
                        ptr.cast::<u8>(),
                        len * size_of::<T>(),
                        Arc::new(self.owner.clone()),
                    )
                };
                ScalarBuffer::new(buffer, 0, *len)
            }
            _ => ScalarBuffer::from(self.deref().to_vec()),
        }
    }
}

impl<T> Deref for NativeSlice<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match &self.data {
            // SAFETY: checked non-null and aligned at construction; the
            // owner keeps the memory alive as long as `self`.
            Data::Borrowed { ptr, len } => unsafe {
                std::slice::from_raw_parts(ptr.as_ptr(), *len)
            },
            Data::Copied(values) => values,
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for NativeSlice<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeSlice")
            .field("len", &self.deref().len())
            .field("borrowed", &matches!(self.data, Data::Borrowed { .. }))
            .field("owner", &self.owner.kind())
            .finish()
    }
}

/// A varchar column.
///
/// Cells of missing rows are never dereferenced: the engine leaves them
/// uninitialized.
#[derive(Debug)]
pub struct StringColumn {
    cells: NativeSlice<StringCell>,
    missing: Arc<MissingRows>,
}

impl StringColumn {
    pub fn new(cells: NativeSlice<StringCell>, missing: Arc<MissingRows>) -> Self {
        Self { cells, missing }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The bytes of `row`, `None` when the row is missing or out of range.
    pub fn get(&self, row: usize) -> Option<&[u8]> {
        if self.missing.contains(row) {
            return None;
        }
        let cell = self.cells.get(row)?;
        // SAFETY: pointer cells of valid rows reference string heap memory
        // owned by the chunk, which `self.cells` keeps alive.
        Some(unsafe { cell.bytes() })
    }

    /// The text of `row`. Fails with [Status::InvalidData] when the bytes
    /// are not UTF-8.
    pub fn str(&self, row: usize) -> Result<Option<&str>> {
        self.get(row)
            .map(std::str::from_utf8)
            .transpose()
            .map_err(Error::from)
    }

    /// Whether the cell of `row` is stored inline.
    pub fn is_inlined(&self, row: usize) -> Option<bool> {
        self.cells.get(row).map(StringCell::is_inlined)
    }

    /// Rows in `missing` are null; so are the column's own missing rows,
    /// whose cells are never read.
    fn to_array(&self, missing: &MissingRows, options: &DecodeOptions) -> Result<ArrayRef> {
        let mut offsets: Vec<i32> = Vec::with_capacity(self.len() + 1);
        let mut values: Vec<u8> = Vec::new();
        let mut null_rows = Vec::new();
        offsets.push(0);
        for row in 0..self.len() {
            let bytes = match missing.contains(row) {
                true => None,
                false => self.get(row),
            };
            match bytes {
                Some(bytes) => {
                    if !options.trust_native_types {
                        std::str::from_utf8(bytes)?;
                    }
                    values.extend_from_slice(bytes);
                }
                None => null_rows.push(row),
            }
            let offset = i32::try_from(values.len()).map_err(|_| {
                Error::with_message_and_status(
                    "Varchar column exceeds 2 GiB of string data",
                    Status::InvalidData,
                )
            })?;
            offsets.push(offset);
        }
        let offsets = OffsetBuffer::new(ScalarBuffer::from(offsets));
        let nulls = MissingRows::from_indices(self.len(), null_rows).to_null_buffer();
        // SAFETY: offsets are monotonic and bound by `values`; the bytes are
        // UTF-8, either checked above or vouched for by the caller.
        let array =
            unsafe { StringArray::new_unchecked(offsets, Buffer::from_vec(values), nulls) };
        Ok(Arc::new(array))
    }
}

/// The values of one decoded column.
#[derive(Debug)]
pub enum ColumnValues {
    /// One byte per row, zero or one.
    Boolean(NativeSlice<u8>),
    Int8(NativeSlice<i8>),
    Int16(NativeSlice<i16>),
    Int32(NativeSlice<i32>),
    Int64(NativeSlice<i64>),
    UInt8(NativeSlice<u8>),
    UInt16(NativeSlice<u16>),
    UInt32(NativeSlice<u32>),
    UInt64(NativeSlice<u64>),
    Float32(NativeSlice<f32>),
    Float64(NativeSlice<f64>),
    /// Days since 1970-01-01.
    Date(NativeSlice<i32>),
    /// Microseconds since midnight.
    Time(NativeSlice<i64>),
    /// Microseconds since 1970-01-01.
    Timestamp(NativeSlice<i64>),
    Varchar(StringColumn),
}

impl ColumnValues {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            ColumnValues::Boolean(_) => TypeTag::Boolean,
            ColumnValues::Int8(_) => TypeTag::Int8,
            ColumnValues::Int16(_) => TypeTag::Int16,
            ColumnValues::Int32(_) => TypeTag::Int32,
            ColumnValues::Int64(_) => TypeTag::Int64,
            ColumnValues::UInt8(_) => TypeTag::UInt8,
            ColumnValues::UInt16(_) => TypeTag::UInt16,
            ColumnValues::UInt32(_) => TypeTag::UInt32,
            ColumnValues::UInt64(_) => TypeTag::UInt64,
            ColumnValues::Float32(_) => TypeTag::Float32,
            ColumnValues::Float64(_) => TypeTag::Float64,
            ColumnValues::Date(_) => TypeTag::Date,
            ColumnValues::Time(_) => TypeTag::Time,
            ColumnValues::Timestamp(_) => TypeTag::Timestamp,
            ColumnValues::Varchar(_) => TypeTag::Varchar,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Boolean(v) | ColumnValues::UInt8(v) => v.len(),
            ColumnValues::Int8(v) => v.len(),
            ColumnValues::Int16(v) => v.len(),
            ColumnValues::Int32(v) | ColumnValues::Date(v) => v.len(),
            ColumnValues::Int64(v) | ColumnValues::Time(v) | ColumnValues::Timestamp(v) => {
                v.len()
            }
            ColumnValues::UInt16(v) => v.len(),
            ColumnValues::UInt32(v) => v.len(),
            ColumnValues::UInt64(v) => v.len(),
            ColumnValues::Float32(v) => v.len(),
            ColumnValues::Float64(v) => v.len(),
            ColumnValues::Varchar(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts the column into an Arrow array of [TypeTag::data_type].
    pub fn to_array(&self, missing: &MissingRows, options: &DecodeOptions) -> Result<ArrayRef> {
        match self {
            ColumnValues::Boolean(v) => boolean_array(v, missing, options),
            ColumnValues::Int8(v) => primitive_array::<Int8Type>(v, missing, options),
            ColumnValues::Int16(v) => primitive_array::<Int16Type>(v, missing, options),
            ColumnValues::Int32(v) => primitive_array::<Int32Type>(v, missing, options),
            ColumnValues::Int64(v) => primitive_array::<Int64Type>(v, missing, options),
            ColumnValues::UInt8(v) => primitive_array::<UInt8Type>(v, missing, options),
            ColumnValues::UInt16(v) => primitive_array::<UInt16Type>(v, missing, options),
            ColumnValues::UInt32(v) => primitive_array::<UInt32Type>(v, missing, options),
            ColumnValues::UInt64(v) => primitive_array::<UInt64Type>(v, missing, options),
            ColumnValues::Float32(v) => primitive_array::<Float32Type>(v, missing, options),
            ColumnValues::Float64(v) => primitive_array::<Float64Type>(v, missing, options),
            ColumnValues::Date(v) => primitive_array::<Date32Type>(v, missing, options),
            ColumnValues::Time(v) => primitive_array::<Time64MicrosecondType>(v, missing, options),
            ColumnValues::Timestamp(v) => {
                primitive_array::<TimestampMicrosecondType>(v, missing, options)
            }
            ColumnValues::Varchar(v) => v.to_array(missing, options),
        }
    }
}

fn primitive_array<T: ArrowPrimitiveType>(
    values: &NativeSlice<T::Native>,
    missing: &MissingRows,
    options: &DecodeOptions,
) -> Result<ArrayRef> {
    let array = PrimitiveArray::<T>::try_new(
        values.to_scalar_buffer(options.zero_copy),
        missing.to_null_buffer(),
    )?;
    Ok(Arc::new(array))
}

fn boolean_array(
    values: &NativeSlice<u8>,
    missing: &MissingRows,
    options: &DecodeOptions,
) -> Result<ArrayRef> {
    if !options.trust_native_types {
        if let Some((row, byte)) = values
            .iter()
            .enumerate()
            .find(|(row, byte)| **byte > 1 && !missing.contains(*row))
        {
            return Err(Error::with_message_and_status(
                format!("Boolean value at row {row} is {byte}, expected 0 or 1"),
                Status::InvalidData,
            ));
        }
    }
    let bits = BooleanBuffer::collect_bool(values.len(), |row| values[row] != 0);
    Ok(Arc::new(BooleanArray::new(bits, missing.to_null_buffer())))
}

/// Decodes `rows` values of one vector.
///
/// The arguments are the vector's data pointer, its row count, the chunk
/// handle that owns the data, and the rows already known to be missing.
pub type DecodeFn = unsafe fn(
    data: *const c_void,
    rows: usize,
    owner: &SharedHandle,
    missing: &Arc<MissingRows>,
) -> Result<ColumnValues>;

macro_rules! fixed_width_decoder {
    ($name:ident, $native:ty, $variant:ident) => {
        unsafe fn $name(
            data: *const c_void,
            rows: usize,
            owner: &SharedHandle,
            _missing: &Arc<MissingRows>,
        ) -> Result<ColumnValues> {
            let values = NativeSlice::new(data as *const $native, rows, owner.clone())?;
            Ok(ColumnValues::$variant(values))
        }
    };
}

fixed_width_decoder!(decode_boolean, u8, Boolean);
fixed_width_decoder!(decode_int8, i8, Int8);
fixed_width_decoder!(decode_int16, i16, Int16);
fixed_width_decoder!(decode_int32, i32, Int32);
fixed_width_decoder!(decode_int64, i64, Int64);
fixed_width_decoder!(decode_uint8, u8, UInt8);
fixed_width_decoder!(decode_uint16, u16, UInt16);
fixed_width_decoder!(decode_uint32, u32, UInt32);
fixed_width_decoder!(decode_uint64, u64, UInt64);
fixed_width_decoder!(decode_float32, f32, Float32);
fixed_width_decoder!(decode_float64, f64, Float64);
fixed_width_decoder!(decode_date, i32, Date);
fixed_width_decoder!(decode_time, i64, Time);
fixed_width_decoder!(decode_timestamp, i64, Timestamp);

unsafe fn decode_varchar(
    data: *const c_void,
    rows: usize,
    owner: &SharedHandle,
    missing: &Arc<MissingRows>,
) -> Result<ColumnValues> {
    let cells = NativeSlice::new(data as *const StringCell, rows, owner.clone())?;
    Ok(ColumnValues::Varchar(StringColumn::new(
        cells,
        Arc::clone(missing),
    )))
}

/// The decode function of a type tag.
pub fn decoder(tag: TypeTag) -> DecodeFn {
    match tag {
        TypeTag::Boolean => decode_boolean,
        TypeTag::Int8 => decode_int8,
        TypeTag::Int16 => decode_int16,
        TypeTag::Int32 => decode_int32,
        TypeTag::Int64 => decode_int64,
        TypeTag::UInt8 => decode_uint8,
        TypeTag::UInt16 => decode_uint16,
        TypeTag::UInt32 => decode_uint32,
        TypeTag::UInt64 => decode_uint64,
        TypeTag::Float32 => decode_float32,
        TypeTag::Float64 => decode_float64,
        TypeTag::Date => decode_date,
        TypeTag::Time => decode_time,
        TypeTag::Timestamp => decode_timestamp,
        TypeTag::Varchar => decode_varchar,
    }
}
