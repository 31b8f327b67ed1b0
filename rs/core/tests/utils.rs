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

//! # Test Utilities
//!
//! Shared fixtures for the integration tests: a registry whose spans are
//! captured in memory, and a span exporter that always fails.

#![allow(dead_code)]

use genkit_core::error::{Error, Result};
use genkit_core::tracing::{InMemorySpanExporter, SpanExporter, SpanRecord, Tracer};
use genkit_core::Registry;
use std::sync::Arc;

/// A registry plus the exporter receiving its spans.
pub struct TracedRegistry {
    pub registry: Registry,
    pub spans: Arc<InMemorySpanExporter>,
}

pub fn traced_registry() -> TracedRegistry {
    let spans = Arc::new(InMemorySpanExporter::new());
    let registry = Registry::new().with_tracer(Tracer::new().with_exporter(spans.clone()));
    TracedRegistry { registry, spans }
}

/// An exporter that rejects every span.
pub struct FailingExporter;

impl SpanExporter for FailingExporter {
    fn export(&self, _span: &SpanRecord) -> Result<()> {
        Err(Error::new_internal("sink unavailable"))
    }
}
