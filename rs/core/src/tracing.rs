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

//! # Genkit Tracing
//!
//! Entry point for span recording. A [`Tracer`] owns the exporters that
//! receive closed spans; spans themselves are opened with
//! [`Tracer::in_new_span`] or the free [`in_new_span`] function.

pub mod exporter;
pub mod instrumentation;
pub mod types;

pub use self::exporter::{InMemorySpanExporter, LogSpanExporter, SpanExporter, TraceServerExporter};
pub use self::instrumentation::{
    current_trace_context, in_current_span, in_new_span, SpanHandle, SPAN_TYPE_ATTR,
};
pub use self::types::{SpanOutcome, SpanRecord, SpanState};

use crate::telemetry::TelemetryConfig;
use instrumentation::CURRENT_SPAN;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

static GLOBAL_TRACER: Lazy<RwLock<Tracer>> = Lazy::new(|| RwLock::new(Tracer::new()));

/// Trace and span ids of an open span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}

/// Records spans and forwards them to its exporters.
///
/// Cloning is cheap; clones share the same exporters.
#[derive(Clone, Default)]
pub struct Tracer {
    exporters: Arc<Vec<Arc<dyn SpanExporter>>>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("exporters", &self.exporters.len())
            .finish()
    }
}

impl Tracer {
    /// A tracer without exporters. Spans are still mirrored to OpenTelemetry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn SpanExporter>) -> Self {
        Arc::make_mut(&mut self.exporters).push(exporter);
        self
    }

    /// The tracer of the span the current task runs in, or the global tracer.
    pub fn current() -> Tracer {
        CURRENT_SPAN
            .try_with(|span| span.tracer.clone())
            .unwrap_or_else(|_| global_tracer())
    }

    fn export(&self, record: &SpanRecord) {
        for exporter in self.exporters.iter() {
            if let Err(e) = exporter.export(record) {
                log::warn!("Failed to export span '{}': {}", record.path, e);
            }
        }
    }
}

/// The process-wide tracer used for root spans outside a registry.
pub fn global_tracer() -> Tracer {
    GLOBAL_TRACER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn set_global_tracer(tracer: Tracer) {
    *GLOBAL_TRACER.write().unwrap_or_else(PoisonError::into_inner) = tracer;
}

/// Builds a tracer from `config` and installs it as the global tracer.
///
/// Returns the installed tracer so it can also be handed to a registry.
pub fn enable_telemetry(config: TelemetryConfig) -> Tracer {
    let tracer = config.build_tracer();
    log::info!(
        "Telemetry enabled with {} span exporter(s)",
        tracer.exporters.len()
    );
    set_global_tracer(tracer.clone());
    tracer
}
