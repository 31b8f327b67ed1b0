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

//! # Generate Action
//!
//! The turn loop behind `generate`. One call runs inside a `generate` span;
//! every model call and tool call below it is an action run and records its
//! own child span.

use super::chunk::GenerateResponseChunk;
use super::resolve_tool_requests::resolve_tool_requests;
use super::response::GenerateResponse;
use super::{to_generate_request, GenerateOptions, DEFAULT_MAX_TURNS};
use crate::message::{MessageData, Role};
use crate::model::{
    GenerateRequest, GenerateResponseChunkData, GenerateResponseData, GenerationUsage,
};
use genkit_core::action::{ActionRunOptions, ErasedAction};
use genkit_core::async_utils::{streaming_callback, ChunkSender};
use genkit_core::error::{Error, Result};
use genkit_core::registry::{ActionType, Registry};
use genkit_core::status::StatusCode;
use genkit_core::tracing::SPAN_TYPE_ATTR;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Everything one orchestrated call accumulates across turns.
struct GenerationState {
    registry: Registry,
    model_key: String,
    tools: Vec<Arc<dyn ErasedAction>>,
    /// Request of the current turn. Its messages are the history so far.
    request: GenerateRequest,
    usage: GenerationUsage,
    max_turns: u32,
    turn: u32,
    /// Index of the next message produced by this call.
    message_index: u32,
    return_tool_requests: bool,
    chunk_sender: ChunkSender<GenerateResponseChunk>,
    run_options: ActionRunOptions<Value>,
    abort_signal: CancellationToken,
}

pub(crate) async fn run_generate(
    registry: &Registry,
    options: GenerateOptions,
) -> Result<GenerateResponse> {
    let tracer = registry.tracer();
    let chunk_sender = ChunkSender::new(options.on_chunk.clone());
    let failure_source = chunk_sender.clone();

    let result = tracer
        .in_new_span("generate", |span| async move {
            span.set_attribute(SPAN_TYPE_ATTR, "util");
            let mut state = GenerationState::new(registry, options, chunk_sender)?;
            span.set_input(&state.request);
            let response = state.run().await?;
            span.set_output(&response);
            Ok(response)
        })
        .await;

    // The consumer's own error is more useful than the abort it caused.
    match failure_source.take_failure() {
        Some(failure) => Err(failure),
        None => result,
    }
}

impl GenerationState {
    fn new(
        registry: &Registry,
        options: GenerateOptions,
        chunk_sender: ChunkSender<GenerateResponseChunk>,
    ) -> Result<Self> {
        let max_turns = options.max_turns.unwrap_or(DEFAULT_MAX_TURNS);
        if max_turns == 0 {
            return Err(Error::new_user_facing(
                StatusCode::InvalidArgument,
                "max_turns must be at least 1.",
                None,
            ));
        }
        let model_key = ActionType::Model.key(&options.model);
        registry.lookup_action(&model_key)?;
        let (request, tools) = to_generate_request(registry, &options)?;
        let abort_signal = options.abort_signal.clone().unwrap_or_default();

        Ok(Self {
            registry: registry.clone(),
            model_key,
            tools,
            request,
            usage: GenerationUsage::default(),
            max_turns,
            turn: 0,
            message_index: 0,
            return_tool_requests: options.return_tool_requests,
            chunk_sender,
            run_options: ActionRunOptions {
                context: options.context,
                on_chunk: None,
                abort_signal: Some(abort_signal.clone()),
                tracer: None,
            },
            abort_signal,
        })
    }

    async fn run(&mut self) -> Result<GenerateResponse> {
        loop {
            if self.abort_signal.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.turn += 1;
            log::debug!(
                "Calling {} (turn {}/{})",
                self.model_key,
                self.turn,
                self.max_turns
            );

            let response = self.call_model().await?;
            if let Some(usage) = &response.usage {
                self.usage.accumulate(usage);
            }
            let candidate = response
                .first_candidate()
                .ok_or_else(|| Error::new_provider("Model returned no candidates."))?
                .clone();
            let message = candidate.message;
            self.message_index += 1;

            if message.tool_requests().is_empty() || self.return_tool_requests {
                return Ok(GenerateResponse {
                    message,
                    finish_reason: candidate.finish_reason,
                    finish_message: candidate.finish_message,
                    usage: self.usage.clone(),
                    custom: response.custom,
                    candidates: response.candidates,
                    request: self.request.clone(),
                });
            }
            if self.turn >= self.max_turns {
                log::warn!(
                    "{} still requested tools after {} turns",
                    self.model_key,
                    self.max_turns
                );
                return Err(Error::TurnLimitExceeded {
                    max_turns: self.max_turns,
                });
            }

            let tool_message =
                resolve_tool_requests(&self.registry, &self.tools, &message, &self.run_options)
                    .await?;
            self.send_tool_chunk(&tool_message).await?;

            self.request.messages.push(message);
            self.request.messages.push(tool_message);
        }
    }

    /// Calls the model once, relaying its chunks under the current message
    /// index. A streamed response with no candidates is rebuilt from its chunks.
    async fn call_model(&self) -> Result<GenerateResponseData> {
        let chunks = Arc::new(Mutex::new(Vec::<GenerateResponseChunkData>::new()));
        let mut options = self.run_options.clone();
        if self.chunk_sender.is_streaming() {
            let sender = self.chunk_sender.clone();
            let chunks = chunks.clone();
            let index = self.message_index;
            options.on_chunk = Some(streaming_callback(move |chunk: Value| {
                let sender = sender.clone();
                let chunks = chunks.clone();
                async move {
                    let data: GenerateResponseChunkData = serde_json::from_value(chunk)?;
                    let previous = {
                        let mut chunks = chunks.lock().unwrap_or_else(PoisonError::into_inner);
                        let previous = chunks.clone();
                        chunks.push(data.clone());
                        previous
                    };
                    sender
                        .send(GenerateResponseChunk::new(data, index, previous))
                        .await
                }
            }));
        }

        let input = serde_json::to_value(&self.request)?;
        let output = self
            .registry
            .invoke_with_options(&self.model_key, input, options)
            .await?;
        let mut response: GenerateResponseData = serde_json::from_value(output)?;

        if response.candidates.is_empty() {
            let chunks = chunks.lock().unwrap_or_else(PoisonError::into_inner);
            if !chunks.is_empty() {
                let content = chunks.iter().flat_map(|c| c.content.clone()).collect();
                response.candidates = GenerateResponseData::from_message(
                    MessageData::new(Role::Model, content),
                    Default::default(),
                )
                .candidates;
            }
        }
        Ok(response)
    }

    async fn send_tool_chunk(&mut self, tool_message: &MessageData) -> Result<()> {
        let chunk = GenerateResponseChunkData {
            role: Some(Role::Tool),
            content: tool_message.content.clone(),
            ..Default::default()
        };
        self.chunk_sender
            .send(GenerateResponseChunk::new(chunk, self.message_index, Vec::new()))
            .await?;
        self.message_index += 1;
        Ok(())
    }
}
