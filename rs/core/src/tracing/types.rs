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

//! # Tracing Data Types
//!
//! Span records produced by the span recorder and the wire shapes used when
//! shipping them to a Genkit telemetry server.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Final state of a closed span.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SpanState {
    Success,
    Error,
    Cancelled,
}

impl SpanState {
    pub fn as_str(self) -> &'static str {
        match self {
            SpanState::Success => "success",
            SpanState::Error => "error",
            SpanState::Cancelled => "cancelled",
        }
    }
}

/// How a span was closed. Exactly one of output, error or cancellation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SpanOutcome {
    /// The operation returned normally. `output` is `Null` when the operation
    /// did not record one.
    Success { output: Value },
    Error { message: String },
    Cancelled,
}

impl SpanOutcome {
    pub fn state(&self) -> SpanState {
        match self {
            SpanOutcome::Success { .. } => SpanState::Success,
            SpanOutcome::Error { .. } => SpanState::Error,
            SpanOutcome::Cancelled => SpanState::Cancelled,
        }
    }
}

/// An immutable record of one closed span.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub name: String,
    /// Slash separated names from the root span, e.g. `/generate/gablorken`.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    pub outcome: SpanOutcome,
    pub attributes: HashMap<String, String>,
    /// Milliseconds since the epoch.
    pub start_time: u64,
    pub end_time: u64,
}

impl SpanRecord {
    pub fn output(&self) -> Option<&Value> {
        match &self.outcome {
            SpanOutcome::Success { output } => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            SpanOutcome::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn state(&self) -> SpanState {
        self.outcome.state()
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Converts the record into the telemetry server's span shape, with the
    /// genkit attributes folded into the attribute map.
    pub fn to_span_data(&self) -> SpanData {
        let mut attributes: HashMap<String, Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        attributes.insert("genkit:name".into(), Value::String(self.name.clone()));
        attributes.insert("genkit:path".into(), Value::String(self.path.clone()));
        attributes.insert(
            "genkit:state".into(),
            Value::String(self.state().as_str().to_string()),
        );
        if let Some(input) = &self.input {
            attributes.insert("genkit:input".into(), Value::String(input.to_string()));
        }
        if let Some(output) = self.output() {
            attributes.insert("genkit:output".into(), Value::String(output.to_string()));
        }
        if self.is_root() {
            attributes.insert("genkit:isRoot".into(), Value::Bool(true));
        }

        let status = match &self.outcome {
            SpanOutcome::Success { .. } => SpanStatus {
                code: 0,
                message: None,
            },
            SpanOutcome::Error { message } => SpanStatus {
                code: 2,
                message: Some(message.clone()),
            },
            SpanOutcome::Cancelled => SpanStatus {
                code: 2,
                message: Some("cancelled".to_string()),
            },
        };

        SpanData {
            span_id: self.span_id.clone(),
            trace_id: self.trace_id.clone(),
            parent_span_id: self.parent_span_id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            attributes,
            display_name: self.name.clone(),
            instrumentation_library: InstrumentationLibrary {
                name: "genkit-tracer".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            span_kind: "INTERNAL".to_string(),
            status: Some(status),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanStatus {
    pub code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationLibrary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanData {
    pub span_id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub start_time: u64,
    pub end_time: u64,
    pub attributes: HashMap<String, Value>,
    pub display_name: String,
    pub instrumentation_library: InstrumentationLibrary,
    pub span_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SpanStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceData {
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// trace start time in milliseconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    /// end time in milliseconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    pub spans: HashMap<String, SpanData>,
}
