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

//! Validity bitmaps.
//!
//! The engine stores one bit per row in 64-bit words, least significant bit
//! first. A cleared bit marks a missing value. A null bitmap means every
//! row is valid.

use arrow_buffer::{BooleanBuffer, NullBuffer};

use crate::constants::VALIDITY_WORD_BITS;

/// Sorted indices of the rows whose value is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingRows {
    rows: Vec<usize>,
    row_count: usize,
}

impl MissingRows {
    /// No missing rows among `row_count`.
    pub fn none(row_count: usize) -> Self {
        Self {
            rows: Vec::new(),
            row_count,
        }
    }

    /// Builds the set from arbitrary indices. Indices `>= row_count` are
    /// dropped.
    pub fn from_indices(row_count: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut rows: Vec<usize> = indices.into_iter().filter(|r| *r < row_count).collect();
        rows.sort_unstable();
        rows.dedup();
        Self { rows, row_count }
    }

    pub fn contains(&self, row: usize) -> bool {
        self.rows.binary_search(&row).is_ok()
    }

    /// Number of missing rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows the set was decoded for.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().copied()
    }

    /// Encodes the set back into engine validity words.
    pub fn to_validity_words(&self) -> Vec<u64> {
        let mut words = vec![u64::MAX; self.row_count.div_ceil(VALIDITY_WORD_BITS)];
        for row in &self.rows {
            words[row / VALIDITY_WORD_BITS] &= !(1u64 << (row % VALIDITY_WORD_BITS));
        }
        words
    }

    /// The Arrow null buffer for this set, `None` when nothing is missing.
    pub fn to_null_buffer(&self) -> Option<NullBuffer> {
        if self.rows.is_empty() {
            return None;
        }
        let valid = BooleanBuffer::collect_bool(self.row_count, |row| !self.contains(row));
        Some(NullBuffer::new(valid))
    }
}

/// Decodes validity words into the set of missing rows.
///
/// Words equal to all ones are skipped without looking at their bits. In
/// the last word only the bits below `row_count` are inspected.
pub fn decode_validity_words(row_count: usize, words: Option<&[u64]>) -> MissingRows {
    let Some(words) = words else {
        return MissingRows::none(row_count);
    };
    let mut rows = Vec::new();
    let word_count = row_count.div_ceil(VALIDITY_WORD_BITS);
    for (word_index, word) in words.iter().take(word_count).enumerate() {
        if *word == u64::MAX {
            continue;
        }
        let base = word_index * VALIDITY_WORD_BITS;
        let bits = (row_count - base).min(VALIDITY_WORD_BITS);
        for bit in 0..bits {
            if word & (1u64 << bit) == 0 {
                rows.push(base + bit);
            }
        }
    }
    MissingRows { rows, row_count }
}

/// Decodes a validity bitmap read from foreign memory.
///
/// # Safety
///
/// `validity` must be null or point to at least `ceil(row_count / 64)`
/// readable words.
pub unsafe fn decode_validity(row_count: usize, validity: *const u64) -> MissingRows {
    if validity.is_null() || row_count == 0 {
        return MissingRows::none(row_count);
    }
    let words = std::slice::from_raw_parts(validity, row_count.div_ceil(VALIDITY_WORD_BITS));
    decode_validity_words(row_count, Some(words))
}
