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

//! # Common Test Helpers for AI components
//!
//! A programmable mock model whose behavior tests swap at runtime, plus
//! response builders and the `gablorken` tool used across the suites.
#![allow(dead_code)]

use futures::future::BoxFuture;
use genkit_ai::model::{
    define_model, DefineModelOptions, FinishReason, GenerateRequest, GenerateResponseChunkData,
    GenerateResponseData, GenerationUsage, ModelInfoSupports,
};
use genkit_ai::{define_tool, MessageData, Part, Role, Tool};
use genkit_core::async_utils::ChunkSender;
use genkit_core::error::Result;
use genkit_core::registry::Registry;
use genkit_core::tracing::InMemorySpanExporter;
use genkit_core::Tracer;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const MODEL_NAME: &str = "programmableModel";

/// The swappable handler inside a [`ProgrammableModel`].
pub type ProgrammableModelHandler = Arc<
    dyn Fn(
            GenerateRequest,
            ChunkSender<GenerateResponseChunkData>,
        ) -> BoxFuture<'static, Result<GenerateResponseData>>
        + Send
        + Sync,
>;

/// A handle that tests use to program a model's behavior at runtime.
#[derive(Clone)]
pub struct ProgrammableModel {
    last_request: Arc<Mutex<Option<GenerateRequest>>>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
    handler: Arc<Mutex<ProgrammableModelHandler>>,
    calls: Arc<AtomicUsize>,
}

impl ProgrammableModel {
    pub fn set_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(GenerateRequest, ChunkSender<GenerateResponseChunkData>) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: std::future::Future<Output = Result<GenerateResponseData>> + Send + 'static,
    {
        *self.handler.lock().unwrap() = Arc::new(move |req, sender| Box::pin(handler(req, sender)));
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Registers a programmable model named [`MODEL_NAME`].
pub fn programmable_model(registry: &Registry) -> ProgrammableModel {
    let initial: ProgrammableModelHandler =
        Arc::new(|_req, _sender| Box::pin(async { Ok(text_response("")) }));
    let model = ProgrammableModel {
        last_request: Arc::default(),
        requests: Arc::default(),
        handler: Arc::new(Mutex::new(initial)),
        calls: Arc::default(),
    };

    let state = model.clone();
    define_model(
        registry,
        DefineModelOptions {
            name: MODEL_NAME.to_string(),
            supports: Some(ModelInfoSupports {
                tools: Some(true),
                multiturn: Some(true),
                system_role: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        },
        move |req, sender| {
            let state = state.clone();
            async move {
                state.calls.fetch_add(1, Ordering::SeqCst);
                *state.last_request.lock().unwrap() = Some(req.clone());
                state.requests.lock().unwrap().push(req.clone());
                let handler = state.handler.lock().unwrap().clone();
                handler(req, sender).await
            }
        },
    )
    .unwrap();
    model
}

/// A registry with its own tracer and in-memory span sink.
pub fn traced_registry() -> (Registry, Arc<InMemorySpanExporter>) {
    let spans = Arc::new(InMemorySpanExporter::new());
    let registry = Registry::new().with_tracer(Tracer::new().with_exporter(spans.clone()));
    (registry, spans)
}

pub fn usage(input: u32, output: u32) -> GenerationUsage {
    GenerationUsage {
        input_tokens: Some(input),
        output_tokens: Some(output),
        total_tokens: Some(input + output),
        ..Default::default()
    }
}

/// A final text response with fixed usage.
pub fn text_response(text: &str) -> GenerateResponseData {
    GenerateResponseData::from_message(MessageData::model(text), FinishReason::Stop)
        .with_usage(usage(10, 5))
}

/// A response requesting one tool call.
pub fn tool_request_response(name: &str, input: Value, r#ref: &str) -> GenerateResponseData {
    GenerateResponseData::from_message(
        MessageData::new(
            Role::Model,
            vec![Part::tool_request(name, Some(input), Some(r#ref.to_string()))],
        ),
        FinishReason::Stop,
    )
    .with_usage(usage(20, 3))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GablorkenInput {
    pub value: f64,
    pub over: f64,
}

/// Registers `gablorken`, which computes `value ^ over` and records its inputs.
pub fn gablorken_tool(
    registry: &Registry,
) -> (Tool<GablorkenInput, f64>, Arc<Mutex<Vec<GablorkenInput>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let tool = define_tool(
        registry,
        "gablorken",
        "Use when need to calculate a gablorken.",
        move |input: GablorkenInput, _| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(input.clone());
                Ok(input.value.powf(input.over))
            }
        },
    )
    .unwrap();
    (tool, seen)
}

/// Model handler for the two-turn gablorken exchange: ask for the tool, then
/// answer with the tool's result.
pub fn gablorken_exchange(req: GenerateRequest) -> GenerateResponseData {
    let answered = req
        .messages
        .iter()
        .flat_map(|m| m.tool_responses())
        .find(|r| r.name == "gablorken")
        .and_then(|r| r.output.clone());
    match answered {
        Some(output) => text_response(&format!("The gablorken is {}.", output)),
        None => tool_request_response("gablorken", json!({"value": 2, "over": 3.5}), "r1"),
    }
}
