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

//! # Tracing Instrumentation
//!
//! Scoped span recording. [`Tracer::in_new_span`] runs a future inside a new
//! span and closes it on every exit path: a normal return, an error, or the
//! future being dropped before completion. The span currently executing is
//! kept in a task-local slot, so spans opened by the operation become its
//! children. Every span is also an OpenTelemetry span on the global tracer,
//! started under its parent's `Context` and active while the operation runs;
//! when that tracer records, the record's ids are the OpenTelemetry ids.

use super::types::{SpanOutcome, SpanRecord};
use super::{Tracer, TraceContext};
use crate::error::Result;
use opentelemetry::trace::{FutureExt, Status as OtelStatus, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Constants for OpenTelemetry attributes.
pub const ATTR_PREFIX: &str = "genkit";
pub const SPAN_TYPE_ATTR: &str = "genkit:type";
const TRACER_NAME: &str = "genkit-tracer";

/// The span a task is currently executing in.
#[derive(Clone)]
pub(crate) struct ActiveSpan {
    pub(crate) tracer: Tracer,
    pub(crate) context: TraceContext,
    pub(crate) path: String,
    pub(crate) otel: Context,
}

tokio::task_local! {
    pub(crate) static CURRENT_SPAN: ActiveSpan;
}

/// Trace context of the span the current task is executing in, if any.
pub fn current_trace_context() -> Option<TraceContext> {
    CURRENT_SPAN.try_with(|span| span.context.clone()).ok()
}

#[derive(Default)]
struct SpanFields {
    input: Option<Value>,
    output: Option<Value>,
    attributes: HashMap<String, String>,
}

/// Mutable metadata of an open span, handed to the wrapped operation.
///
/// Output written through the handle is only committed to the record when the
/// operation succeeds.
#[derive(Clone)]
pub struct SpanHandle {
    context: TraceContext,
    fields: Arc<Mutex<SpanFields>>,
}

impl SpanHandle {
    fn new(context: TraceContext) -> Self {
        Self {
            context,
            fields: Arc::default(),
        }
    }

    fn with_fields<R>(&self, f: impl FnOnce(&mut SpanFields) -> R) -> R {
        let mut fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut fields)
    }

    pub fn trace_context(&self) -> &TraceContext {
        &self.context
    }

    pub fn set_input<T: Serialize + ?Sized>(&self, input: &T) {
        let value = serde_json::to_value(input).unwrap_or(Value::Null);
        self.with_fields(|fields| fields.input = Some(value));
    }

    pub fn set_output<T: Serialize + ?Sized>(&self, output: &T) {
        let value = serde_json::to_value(output).unwrap_or(Value::Null);
        self.with_fields(|fields| fields.output = Some(value));
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.with_fields(|fields| {
            fields.attributes.insert(key, value);
        });
    }
}

enum Exit {
    Success,
    Failure(String),
    Cancelled,
}

/// Closes the span when dropped. A guard dropped without [`SpanGuard::close`]
/// belongs to a future that was dropped mid-flight, so it records a
/// cancellation.
struct SpanGuard {
    tracer: Tracer,
    otel: Context,
    handle: SpanHandle,
    name: String,
    path: String,
    parent_span_id: Option<String>,
    start: SystemTime,
    closed: bool,
}

impl SpanGuard {
    fn close(&mut self, exit: Exit) {
        if self.closed {
            return;
        }
        self.closed = true;

        let end = SystemTime::now();
        let fields = std::mem::take(
            &mut *self
                .handle
                .fields
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let outcome = match exit {
            Exit::Success => SpanOutcome::Success {
                output: fields.output.unwrap_or(Value::Null),
            },
            Exit::Failure(message) => SpanOutcome::Error { message },
            Exit::Cancelled => SpanOutcome::Cancelled,
        };
        let record = SpanRecord {
            trace_id: self.handle.context.trace_id.clone(),
            span_id: self.handle.context.span_id.clone(),
            parent_span_id: self.parent_span_id.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
            input: fields.input,
            outcome,
            attributes: fields.attributes,
            start_time: millis(self.start),
            end_time: millis(end),
        };

        end_otel_span(&self.otel, &record, end);
        self.tracer.export(&record);
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.close(Exit::Cancelled);
    }
}

fn millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Starts the OpenTelemetry span for `name` as a child of `parent`.
fn start_otel_span(name: &str, start: SystemTime, parent: &Context) -> Context {
    let tracer = opentelemetry::global::tracer(TRACER_NAME);
    let span = tracer.build_with_context(
        tracer.span_builder(name.to_string()).with_start_time(start),
        parent,
    );
    parent.with_span(span)
}

fn end_otel_span(cx: &Context, record: &SpanRecord, end: SystemTime) {
    let span = cx.span();
    for attribute in record_to_attributes(record) {
        span.set_attribute(attribute);
    }
    match &record.outcome {
        SpanOutcome::Success { .. } => span.set_status(OtelStatus::Ok),
        SpanOutcome::Error { message } => span.set_status(OtelStatus::error(message.clone())),
        SpanOutcome::Cancelled => span.set_status(OtelStatus::error("cancelled")),
    }
    span.end_with_timestamp(end);
}

/// Converts a span record into OpenTelemetry `KeyValue` pairs.
pub fn record_to_attributes(record: &SpanRecord) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new(format!("{}:name", ATTR_PREFIX), record.name.clone()),
        KeyValue::new(format!("{}:path", ATTR_PREFIX), record.path.clone()),
        KeyValue::new(format!("{}:state", ATTR_PREFIX), record.state().as_str()),
    ];
    if let Some(input) = &record.input {
        attributes.push(KeyValue::new(format!("{}:input", ATTR_PREFIX), input.to_string()));
    }
    if let Some(output) = record.output() {
        attributes.push(KeyValue::new(format!("{}:output", ATTR_PREFIX), output.to_string()));
    }
    if record.is_root() {
        attributes.push(KeyValue::new(format!("{}:isRoot", ATTR_PREFIX), true));
    }
    for (key, value) in &record.attributes {
        attributes.push(KeyValue::new(key.clone(), value.clone()));
    }
    attributes
}

fn new_trace_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn new_span_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

impl Tracer {
    /// Executes `f` within a new span named `name`.
    ///
    /// Exactly one [`SpanRecord`] is exported per call. Its outcome is the
    /// staged output when `f` returns `Ok`, the error message when it returns
    /// `Err`, and a cancellation marker when it returns [`Error::Cancelled`]
    /// or the returned future is dropped before completing. Export failures
    /// are logged and never replace the result of `f`.
    pub async fn in_new_span<F, Fut, T>(&self, name: impl Into<String>, f: F) -> Result<T>
    where
        F: FnOnce(SpanHandle) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let name = name.into();
        let start = SystemTime::now();
        let parent = CURRENT_SPAN.try_with(ActiveSpan::clone).ok();
        let parent_otel = parent
            .as_ref()
            .map(|p| p.otel.clone())
            .unwrap_or_else(Context::current);
        let otel = start_otel_span(&name, start, &parent_otel);

        let otel_context = otel.span().span_context().clone();
        let parent_otel_span_id = parent_otel.span().span_context().span_id();
        // A non-recording tracer hands back its parent's span context.
        let context = if otel_context.is_valid() && otel_context.span_id() != parent_otel_span_id {
            TraceContext {
                trace_id: otel_context.trace_id().to_string(),
                span_id: otel_context.span_id().to_string(),
            }
        } else {
            TraceContext {
                trace_id: parent
                    .as_ref()
                    .map(|p| p.context.trace_id.clone())
                    .unwrap_or_else(new_trace_id),
                span_id: new_span_id(),
            }
        };
        let path = match &parent {
            Some(p) => format!("{}/{}", p.path, name),
            None => format!("/{}", name),
        };

        let handle = SpanHandle::new(context.clone());
        let mut guard = SpanGuard {
            tracer: self.clone(),
            otel: otel.clone(),
            handle: handle.clone(),
            name,
            path: path.clone(),
            parent_span_id: parent.map(|p| p.context.span_id),
            start,
            closed: false,
        };
        let active = ActiveSpan {
            tracer: self.clone(),
            context,
            path,
            otel: otel.clone(),
        };

        let result = CURRENT_SPAN
            .scope(active, f(handle).with_context(otel))
            .await;
        guard.close(match &result {
            Ok(_) => Exit::Success,
            Err(e) if e.is_cancelled() => Exit::Cancelled,
            Err(e) => Exit::Failure(e.to_string()),
        });
        result
    }
}

/// Binds `fut` to the span the current task is executing in.
///
/// Spans opened by `fut` become children of that span even when it is
/// polled on another task, as with `tokio::spawn`.
pub fn in_current_span<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    let active = CURRENT_SPAN.try_with(ActiveSpan::clone).ok();
    async move {
        match active {
            Some(active) => {
                let otel = active.otel.clone();
                CURRENT_SPAN.scope(active, fut.with_context(otel)).await
            }
            None => fut.await,
        }
    }
}

/// Executes `f` within a new span on the current task's tracer.
///
/// The tracer is inherited from the enclosing span, falling back to the
/// process-wide tracer for root spans.
pub async fn in_new_span<F, Fut, T>(name: impl Into<String>, f: F) -> Result<T>
where
    F: FnOnce(SpanHandle) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    Tracer::current().in_new_span(name, f).await
}
