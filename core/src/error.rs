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

//! Error, status and result types.

use std::ffi::{CStr, NulError};
use std::fmt::Display;
use std::os::raw::c_char;

use arrow_schema::ArrowError;

/// Status of an operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    /// A native engine call returned a non-success state.
    /// The message carries the text supplied by the engine.
    NativeCallFailure,
    /// The operation relies on an engine feature this layer does not support,
    /// for instance a streaming (cursor-based) result.
    UnsupportedFeature,
    /// A column uses an engine type with no decode or append handler.
    UnsupportedType,
    /// A native handle was disposed twice or used after disposal.
    /// This is a defect in the bridge, never a data condition.
    ResourceDisposalViolation,
    /// The linked engine does not match the binary layouts this crate
    /// was built against.
    AbiMismatch,
    /// The arguments are invalid, likely a programming error.
    InvalidArguments,
    /// Invalid data was read from or handed to the engine.
    /// For instance, a varchar cell that is not valid UTF-8.
    InvalidData,
    /// The object is in a state that forbids the operation, for instance
    /// an appender after a failed append or after it was closed.
    InvalidState,
    /// An error internal to the bridge occurred.
    Internal,
}

impl Status {
    /// Whether this status reports missing support rather than a failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Status::UnsupportedFeature | Status::UnsupportedType)
    }
}

/// A bridge error.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Error {
    /// The error message.
    pub message: String,
    /// The status of the operation.
    pub status: Status,
}

/// Result type wrapping [Error].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn with_message_and_status(message: impl Into<String>, status: Status) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// Builds a [Status::NativeCallFailure] from an engine-owned message.
    ///
    /// `call` names the native entry point that failed. A null `message`
    /// is reported as `<empty>`.
    ///
    /// # Safety
    ///
    /// `message` must be null or point to a NUL-terminated string that stays
    /// valid for the duration of this call.
    pub unsafe fn from_native(call: &str, message: *const c_char) -> Self {
        let message = match message.is_null() {
            true => "<empty>".to_string(),
            // SAFETY: the caller guarantees a valid C string.
            false => CStr::from_ptr(message).to_string_lossy().into_owned(),
        };
        Self::with_message_and_status(format!("{call}: {message}"), Status::NativeCallFailure)
    }

    pub(crate) fn disposal_violation(kind: &str, message: &str) -> Self {
        Self::with_message_and_status(
            format!("{kind} handle {message}"),
            Status::ResourceDisposalViolation,
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.status, self.message)
    }
}

impl std::error::Error for Error {}

impl From<ArrowError> for Error {
    fn from(value: ArrowError) -> Self {
        Self {
            message: value.to_string(),
            status: Status::Internal,
        }
    }
}

impl From<NulError> for Error {
    fn from(value: NulError) -> Self {
        Self {
            message: format!(
                "Interior null byte was found at position {}",
                value.nul_position()
            ),
            status: Status::InvalidArguments,
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(value: std::str::Utf8Error) -> Self {
        Self {
            message: format!("Error while decoding UTF-8: {value}"),
            status: Status::InvalidData,
        }
    }
}

impl From<Error> for ArrowError {
    fn from(value: Error) -> Self {
        ArrowError::ExternalError(Box::new(value))
    }
}
