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

//! # Error and Result types
//!
//! This module defines the primary error and result types for the Genkit
//! framework. Every failure surfaced by an action, the generate loop or an
//! evaluator is one of the [`Error`] variants below, and each variant maps to
//! a canonical [`StatusCode`].

use crate::schema::ValidationError;
use crate::status::{Status, StatusCode};
use thiserror::Error;

/// A convenient Result type for genkit operations, defaulting to the crate's `Error` type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type for the Genkit framework.
#[derive(Debug, Error)]
pub enum Error {
    /// An error that is safe to return to the end-user in an API response.
    #[error("{0}")]
    UserFacing(#[from] Status),

    /// The input of an action does not match its declared input schema.
    /// The action handler is never called in this case.
    #[error("Invalid input for action '{action}': {source}")]
    InvalidInput {
        action: String,
        #[source]
        source: Box<ValidationError>,
    },

    /// An action handler produced a value that does not match its declared
    /// output schema.
    #[error("Invalid output from action '{action}': {source}")]
    InvalidOutput {
        action: String,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("Action '{key}' not found")]
    NotFound { key: String },

    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    #[error("Action '{key}' is already registered")]
    DuplicateAction { key: String },

    /// A value failed schema validation outside of an action boundary.
    #[error(transparent)]
    Validation(#[from] Box<ValidationError>),

    /// A tool failed while the generate loop was running it.
    #[error("Tool '{name}' failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Exceeded maximum tool call iterations ({max_turns})")]
    TurnLimitExceeded { max_turns: u32 },

    /// The external evaluation call itself failed.
    #[error("Evaluation request to {url} failed: {message}")]
    EvaluationRequest {
        url: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The evaluation provider answered with a body that does not match the
    /// metric's response schema.
    #[error("Unable to parse evaluation response from {url}: {source}")]
    ResponseParse {
        url: String,
        #[source]
        source: Box<ValidationError>,
    },

    /// A model provider reported a failure.
    #[error("Provider error: {message}")]
    Provider {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A tool response part has no matching tool request in the history.
    #[error("Tool response '{name}' (ref {reference:?}) has no matching tool request")]
    OrphanedToolResponse {
        name: String,
        reference: Option<String>,
    },

    /// The streaming consumer failed earlier; no further chunks are accepted.
    #[error("Stream aborted by a failed chunk callback")]
    StreamAborted,

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// The operation was aborted by its caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// An internal framework error. Details of this error should generally not
    /// be exposed to external users.
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl Error {
    /// Creates a new `UserFacing` error, which is safe to expose in APIs.
    pub fn new_user_facing(
        status_code: StatusCode,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Error::UserFacing(Status {
            code: status_code,
            message: message.into(),
            details,
        })
    }

    /// Creates a new `Internal` error.
    pub fn new_internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `Provider` error without an underlying cause.
    pub fn new_provider(message: impl Into<String>) -> Self {
        Error::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// True when the error, or the tool error it wraps, is a caller abort.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Tool { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::UserFacing(status) => status.code,
            Error::InvalidInput { .. }
            | Error::Validation(_)
            | Error::OrphanedToolResponse { .. } => StatusCode::InvalidArgument,
            Error::NotFound { .. } | Error::ToolNotFound { .. } => StatusCode::NotFound,
            Error::DuplicateAction { .. } => StatusCode::AlreadyExists,
            Error::Tool { source, .. } => source.status_code(),
            Error::TurnLimitExceeded { .. } => StatusCode::ResourceExhausted,
            Error::EvaluationRequest { .. } | Error::Provider { .. } => StatusCode::Unavailable,
            Error::StreamAborted => StatusCode::Aborted,
            Error::Cancelled => StatusCode::Cancelled,
            Error::InvalidOutput { .. }
            | Error::ResponseParse { .. }
            | Error::Serialization(_)
            | Error::Internal { .. } => StatusCode::Internal,
        }
    }

    /// Returns the corresponding HTTP status code for the error.
    pub fn http_status(&self) -> u16 {
        self.status_code().to_http_status()
    }

    /// Returns a `Status` representation of the error, suitable for
    /// serialization in API responses.
    ///
    /// Internal errors get a generic message to avoid leaking details.
    pub fn as_status(&self) -> Status {
        let code = self.status_code();
        match self {
            Error::UserFacing(status) => status.clone(),
            Error::InvalidInput { source, .. } | Error::Validation(source) => {
                Status::new(code, self.to_string())
                    .with_details(serde_json::json!({ "errors": source.errors() }))
            }
            _ if code == StatusCode::Internal => Status::new(code, "Internal Server Error"),
            _ => Status::new(code, self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_errors_keep_the_inner_status() {
        let err = Error::Tool {
            name: "gablorken".to_string(),
            source: Box::new(Error::Cancelled),
        };
        assert!(err.is_cancelled());
        assert_eq!(err.status_code(), StatusCode::Cancelled);
        assert!(err.to_string().contains("gablorken"));
    }

    #[test]
    fn internal_errors_are_masked() {
        let status = Error::new_internal("db password leaked").as_status();
        assert_eq!(status.code, StatusCode::Internal);
        assert_eq!(status.message, "Internal Server Error");
    }

    #[test]
    fn turn_limit_maps_to_resource_exhausted() {
        let err = Error::TurnLimitExceeded { max_turns: 5 };
        assert_eq!(err.http_status(), 429);
        assert_eq!(err.as_status().message, "Exceeded maximum tool call iterations (5)");
    }
}
