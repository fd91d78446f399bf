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

//! Various option and configuration types.

use crate::{
    constants,
    error::{Error, Result, Status},
};

/// Option value.
///
/// Can be created with various implementations of [From].
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl OptionValue {
    /// Gets the data type of the option's value.
    pub(crate) fn get_type(&self) -> &str {
        match self {
            Self::String(_) => "String",
            Self::Int(_) => "Int",
            Self::Bool(_) => "Bool",
        }
    }

    fn as_bool(&self, key: &str) -> Result<bool> {
        match self {
            Self::Bool(value) => Ok(*value),
            Self::String(value) => match value.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                value => Err(Error::with_message_and_status(
                    format!("Invalid boolean value for {key}: {value}"),
                    Status::InvalidArguments,
                )),
            },
            value => Err(unexpected_type(key, "Bool", value)),
        }
    }

    fn as_string(&self, key: &str) -> Result<String> {
        match self {
            Self::String(value) => Ok(value.clone()),
            value => Err(unexpected_type(key, "String", value)),
        }
    }

    fn as_int(&self, key: &str) -> Result<i64> {
        match self {
            Self::Int(value) => Ok(*value),
            Self::String(value) => value.parse().map_err(|_| {
                Error::with_message_and_status(
                    format!("Invalid integer value for {key}: {value}"),
                    Status::InvalidArguments,
                )
            }),
            value => Err(unexpected_type(key, "Int", value)),
        }
    }
}

fn unexpected_type(key: &str, expected: &str, value: &OptionValue) -> Error {
    Error::with_message_and_status(
        format!(
            "Option {key} expects a {expected} value, got {}",
            value.get_type()
        ),
        Status::InvalidArguments,
    )
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Keys of options affecting how query results are decoded.
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
#[non_exhaustive]
pub enum OptionQuery {
    /// Trust the type declared by the engine and skip value validation
    /// (UTF-8 checks on varchar, 0/1 checks on booleans) while building
    /// Arrow arrays.
    TrustNativeTypes,
    /// Share fixed-width vector memory with Arrow buffers instead of copying.
    ZeroCopy,
    /// Driver-specific key.
    Other(String),
}

impl AsRef<str> for OptionQuery {
    fn as_ref(&self) -> &str {
        match self {
            Self::TrustNativeTypes => constants::OPTION_TRUST_NATIVE_TYPES,
            Self::ZeroCopy => constants::OPTION_ZERO_COPY,
            Self::Other(key) => key,
        }
    }
}

impl From<&str> for OptionQuery {
    fn from(value: &str) -> Self {
        match value {
            constants::OPTION_TRUST_NATIVE_TYPES => Self::TrustNativeTypes,
            constants::OPTION_ZERO_COPY => Self::ZeroCopy,
            key => Self::Other(key.into()),
        }
    }
}

/// Keys of options affecting the bulk appender.
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
#[non_exhaustive]
pub enum OptionAppender {
    /// Schema of the target table.
    Schema,
    /// Flush the appender after this many committed rows (0 disables).
    FlushEveryRows,
    /// Driver-specific key.
    Other(String),
}

impl AsRef<str> for OptionAppender {
    fn as_ref(&self) -> &str {
        match self {
            Self::Schema => constants::OPTION_APPEND_SCHEMA,
            Self::FlushEveryRows => constants::OPTION_FLUSH_EVERY,
            Self::Other(key) => key,
        }
    }
}

impl From<&str> for OptionAppender {
    fn from(value: &str) -> Self {
        match value {
            constants::OPTION_APPEND_SCHEMA => Self::Schema,
            constants::OPTION_FLUSH_EVERY => Self::FlushEveryRows,
            key => Self::Other(key.into()),
        }
    }
}

/// Parsed decode settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub trust_native_types: bool,
    pub zero_copy: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            trust_native_types: false,
            zero_copy: true,
        }
    }
}

impl DecodeOptions {
    pub fn set_option(&mut self, key: OptionQuery, value: OptionValue) -> Result<()> {
        match key {
            OptionQuery::TrustNativeTypes => {
                self.trust_native_types = value.as_bool(key.as_ref())?
            }
            OptionQuery::ZeroCopy => self.zero_copy = value.as_bool(key.as_ref())?,
            OptionQuery::Other(key) => {
                return Err(Error::with_message_and_status(
                    format!("Unknown query option: {key}"),
                    Status::InvalidArguments,
                ))
            }
        }
        Ok(())
    }

    pub fn with_opts(opts: impl IntoIterator<Item = (OptionQuery, OptionValue)>) -> Result<Self> {
        let mut options = Self::default();
        for (key, value) in opts {
            options.set_option(key, value)?;
        }
        Ok(options)
    }
}

/// Parsed appender settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOptions {
    pub schema: String,
    pub flush_every_rows: u64,
}

impl Default for AppendOptions {
    fn default() -> Self {
        Self {
            schema: constants::DEFAULT_SCHEMA.to_string(),
            flush_every_rows: 0,
        }
    }
}

impl AppendOptions {
    pub fn set_option(&mut self, key: OptionAppender, value: OptionValue) -> Result<()> {
        match key {
            OptionAppender::Schema => self.schema = value.as_string(key.as_ref())?,
            OptionAppender::FlushEveryRows => {
                let rows = value.as_int(key.as_ref())?;
                self.flush_every_rows = u64::try_from(rows).map_err(|_| {
                    Error::with_message_and_status(
                        format!("{} must not be negative: {rows}", key.as_ref()),
                        Status::InvalidArguments,
                    )
                })?;
            }
            OptionAppender::Other(key) => {
                return Err(Error::with_message_and_status(
                    format!("Unknown appender option: {key}"),
                    Status::InvalidArguments,
                ))
            }
        }
        Ok(())
    }

    pub fn with_opts(
        opts: impl IntoIterator<Item = (OptionAppender, OptionValue)>,
    ) -> Result<Self> {
        let mut options = Self::default();
        for (key, value) in opts {
            options.set_option(key, value)?;
        }
        Ok(options)
    }
}
