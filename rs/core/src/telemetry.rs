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

//! # Telemetry Configuration
//!
//! Which sinks receive closed spans. Plugins and applications add their own
//! exporters; the environment can switch on the telemetry server upload and
//! span logging.

use crate::tracing::{LogSpanExporter, SpanExporter, TraceServerExporter, Tracer};
use crate::utils::is_dev_env;
use std::env;
use std::sync::Arc;

/// Configuration for the span exporters of a [`Tracer`].
#[derive(Default, Clone)]
pub struct TelemetryConfig {
    /// Additional exporters, called in order after the built-in ones.
    pub exporters: Vec<Arc<dyn SpanExporter>>,
    /// Base URL of a Genkit telemetry server. Traces are posted to
    /// `{url}/api/traces`.
    pub telemetry_server_url: Option<String>,
    /// Log a summary line for every closed span.
    pub log_spans: bool,
}

impl TelemetryConfig {
    /// Reads `GENKIT_TELEMETRY_SERVER`; span logging is on in the `dev`
    /// environment.
    pub fn from_env() -> Self {
        Self {
            exporters: Vec::new(),
            telemetry_server_url: env::var("GENKIT_TELEMETRY_SERVER")
                .ok()
                .filter(|url| !url.is_empty()),
            log_spans: is_dev_env(),
        }
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn SpanExporter>) -> Self {
        self.exporters.push(exporter);
        self
    }

    pub fn build_tracer(self) -> Tracer {
        let mut tracer = Tracer::new();
        if let Some(url) = self.telemetry_server_url {
            tracer = tracer.with_exporter(Arc::new(TraceServerExporter::new(url)));
        }
        if self.log_spans {
            tracer = tracer.with_exporter(Arc::new(LogSpanExporter));
        }
        self.exporters
            .into_iter()
            .fold(tracer, |tracer, exporter| tracer.with_exporter(exporter))
    }
}
