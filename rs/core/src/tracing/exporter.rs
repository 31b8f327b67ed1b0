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

//! # Span Exporters
//!
//! Sinks for closed spans. Exporters run synchronously when a span closes, so
//! anything slow (such as the trace server upload) is handed to the runtime.

use super::types::{SpanRecord, TraceData};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Receives every closed span of a [`super::Tracer`].
pub trait SpanExporter: Send + Sync {
    fn export(&self, span: &SpanRecord) -> Result<()>;
}

/// Keeps closed spans in memory. Mostly useful in tests.
#[derive(Debug, Default)]
pub struct InMemorySpanExporter {
    spans: Mutex<Vec<SpanRecord>>,
}

impl InMemorySpanExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All spans closed so far, in closing order.
    pub fn finished_spans(&self) -> Vec<SpanRecord> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn spans_named(&self, name: &str) -> Vec<SpanRecord> {
        self.finished_spans()
            .into_iter()
            .filter(|span| span.name == name)
            .collect()
    }

    pub fn reset(&self) {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&self, span: &SpanRecord) -> Result<()> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span.clone());
        Ok(())
    }
}

/// Writes a one-line summary of every span to the `log` facade.
#[derive(Debug, Default)]
pub struct LogSpanExporter;

impl SpanExporter for LogSpanExporter {
    fn export(&self, span: &SpanRecord) -> Result<()> {
        log::debug!(
            "span {} [{}] {}ms",
            span.path,
            span.state().as_str(),
            span.end_time.saturating_sub(span.start_time)
        );
        Ok(())
    }
}

/// An exporter that sends traces to a Genkit telemetry server.
///
/// Spans are buffered per trace and the whole trace is posted to
/// `{base_url}/api/traces` once its root span closes.
#[derive(Debug)]
pub struct TraceServerExporter {
    client: reqwest::Client,
    base_url: String,
    pending: Mutex<HashMap<String, Vec<SpanRecord>>>,
}

impl TraceServerExporter {
    pub fn new(base_url: impl Into<String>) -> Self {
        TraceServerExporter {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pending: Mutex::default(),
        }
    }

    fn trace_data(root: &SpanRecord, spans: Vec<SpanRecord>) -> TraceData {
        TraceData {
            trace_id: root.trace_id.clone(),
            display_name: Some(root.name.clone()),
            start_time: Some(root.start_time),
            end_time: Some(root.end_time),
            spans: spans
                .iter()
                .map(|span| (span.span_id.clone(), span.to_span_data()))
                .collect(),
        }
    }
}

impl SpanExporter for TraceServerExporter {
    fn export(&self, span: &SpanRecord) -> Result<()> {
        let spans = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let trace = pending.entry(span.trace_id.clone()).or_default();
            trace.push(span.clone());
            if !span.is_root() {
                return Ok(());
            }
            pending.remove(&span.trace_id).unwrap_or_default()
        };

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::Internal {
            message: "trace upload needs a tokio runtime".to_string(),
            source: Some(Box::new(e)),
        })?;
        let trace_data = Self::trace_data(span, spans);
        let client = self.client.clone();
        let url = format!("{}/api/traces", self.base_url);
        runtime.spawn(async move {
            let sent = client
                .post(&url)
                .json(&trace_data)
                .send()
                .await
                .and_then(|response| response.error_for_status());
            if let Err(e) = sent {
                log::warn!("Failed to export trace {} to {}: {}", trace_data.trace_id, url, e);
            }
        });
        Ok(())
    }
}
