// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Status codes
//!
//! Canonical status codes used to classify failures of actions, tool calls
//! and external provider requests. Codes follow the gRPC numbering so they can
//! be forwarded to observability backends unchanged.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use thiserror::Error;

/// Canonical status code of an operation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    Ok = 0,
    /// The operation was cancelled by its caller.
    Cancelled = 1,
    Unknown = 2,
    /// The caller supplied a value that does not match the declared shape.
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    /// A bounded resource, such as the generate turn budget, ran out.
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    /// An external provider could not be reached or rejected the request.
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

// (code, canonical name, HTTP status)
const STATUS_TABLE: [(StatusCode, &str, u16); 17] = [
    (StatusCode::Ok, "OK", 200),
    (StatusCode::Cancelled, "CANCELLED", 499),
    (StatusCode::Unknown, "UNKNOWN", 500),
    (StatusCode::InvalidArgument, "INVALID_ARGUMENT", 400),
    (StatusCode::DeadlineExceeded, "DEADLINE_EXCEEDED", 504),
    (StatusCode::NotFound, "NOT_FOUND", 404),
    (StatusCode::AlreadyExists, "ALREADY_EXISTS", 409),
    (StatusCode::PermissionDenied, "PERMISSION_DENIED", 403),
    (StatusCode::ResourceExhausted, "RESOURCE_EXHAUSTED", 429),
    (StatusCode::FailedPrecondition, "FAILED_PRECONDITION", 400),
    (StatusCode::Aborted, "ABORTED", 409),
    (StatusCode::OutOfRange, "OUT_OF_RANGE", 400),
    (StatusCode::Unimplemented, "UNIMPLEMENTED", 501),
    (StatusCode::Internal, "INTERNAL", 500),
    (StatusCode::Unavailable, "UNAVAILABLE", 503),
    (StatusCode::DataLoss, "DATA_LOSS", 500),
    (StatusCode::Unauthenticated, "UNAUTHENTICATED", 401),
];

impl StatusCode {
    fn entry(self) -> (StatusCode, &'static str, u16) {
        STATUS_TABLE[self as usize]
    }

    /// Canonical upper-case name, e.g. `NOT_FOUND`.
    pub fn name(self) -> &'static str {
        self.entry().1
    }

    /// Converts a `StatusCode` to its corresponding HTTP status code.
    pub fn to_http_status(self) -> u16 {
        self.entry().2
    }

    /// Looks a code up by its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        STATUS_TABLE.get(value as usize).map(|(code, _, _)| *code)
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// An error returned when parsing a `StatusCode` from a string fails.
#[derive(Debug, Error)]
#[error("invalid status name: {0}")]
pub struct ParseStatusError(String);

impl FromStr for StatusCode {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STATUS_TABLE
            .iter()
            .find(|(_, name, _)| *name == s)
            .map(|(code, _, _)| *code)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(*self as u16)
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u16::deserialize(deserializer)?;
        StatusCode::from_u16(value).ok_or_else(|| {
            serde::de::Error::invalid_value(
                serde::de::Unexpected::Unsigned(value as u64),
                &"a valid StatusCode integer",
            )
        })
    }
}

/// Serializable status of a failed operation, safe to return to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Status {}
