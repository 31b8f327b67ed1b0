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

//! # AI Content Generation
//!
//! `generate` drives a model through as many turns as its tool calls need:
//! each model response that requests tools has those tools run, their
//! results appended to the conversation, and the model called again, until a
//! response without tool requests arrives or the turn limit is hit.

pub mod action;
pub mod chunk;
pub mod resolve_tool_requests;
pub mod response;

pub use self::chunk::GenerateResponseChunk;
pub use self::response::GenerateResponse;

use crate::document::Part;
use crate::message::{MessageData, Role};
use crate::model::{GenerateRequest, ToolChoice};
use crate::tool::{resolve_tools, to_tool_definition, ToolArgument};
use genkit_core::action::ErasedAction;
use genkit_core::async_utils::{stream_channel, StreamingCallback};
use genkit_core::context::{get_context, ActionContext};
use genkit_core::error::{Error, Result};
use genkit_core::registry::Registry;
use genkit_core::status::StatusCode;
use genkit_core::tracing::in_current_span;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Maximum number of model calls of one `generate` call, unless overridden.
pub const DEFAULT_MAX_TURNS: u32 = 5;

/// Options for a `generate` call.
#[derive(Clone, Default)]
pub struct GenerateOptions {
    /// Name of the model, as registered with `define_model`.
    pub model: String,
    pub system: Option<Vec<Part>>,
    pub messages: Vec<MessageData>,
    pub prompt: Option<Vec<Part>>,
    pub tools: Vec<ToolArgument>,
    pub tool_choice: Option<ToolChoice>,
    pub config: Option<Value>,
    pub candidates: Option<u32>,
    /// Maximum number of model calls. Defaults to [`DEFAULT_MAX_TURNS`].
    pub max_turns: Option<u32>,
    /// Return the first response that requests tools instead of running them.
    pub return_tool_requests: bool,
    pub on_chunk: Option<StreamingCallback<GenerateResponseChunk>>,
    pub abort_signal: Option<CancellationToken>,
    pub context: Option<ActionContext>,
}

impl GenerateOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_prompt(mut self, text: impl Into<String>) -> Self {
        self.prompt = Some(vec![Part::text(text)]);
        self
    }

    pub fn with_system(mut self, text: impl Into<String>) -> Self {
        self.system = Some(vec![Part::text(text)]);
        self
    }

    pub fn with_messages(mut self, messages: Vec<MessageData>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tools<T>(mut self, tools: impl IntoIterator<Item = T>) -> Self
    where
        T: Into<ToolArgument>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_return_tool_requests(mut self, return_tool_requests: bool) -> Self {
        self.return_tool_requests = return_tool_requests;
        self
    }

    pub fn with_on_chunk(mut self, on_chunk: StreamingCallback<GenerateResponseChunk>) -> Self {
        self.on_chunk = Some(on_chunk);
        self
    }

    pub fn with_abort_signal(mut self, abort_signal: CancellationToken) -> Self {
        self.abort_signal = Some(abort_signal);
        self
    }

    pub fn with_context(mut self, context: ActionContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// The response from a `generate_stream` call.
///
/// Dropping it cancels the generation.
pub struct GenerateStreamResponse {
    /// Chunks in emission order. Ends when the call completes.
    pub stream: UnboundedReceiverStream<GenerateResponseChunk>,
    /// Resolves to the final response once every chunk has been sent.
    pub response: JoinHandle<Result<GenerateResponse>>,
    abort: CancellationToken,
    _abort_on_drop: DropGuard,
}

impl GenerateStreamResponse {
    /// Cancels the generation. The response then resolves to
    /// [`Error::Cancelled`] unless it had already completed.
    pub fn abort(&self) {
        self.abort.cancel();
    }
}

/// Generates content using a model, running tools as the model requests.
pub async fn generate(registry: &Registry, options: GenerateOptions) -> Result<GenerateResponse> {
    action::run_generate(registry, options).await
}

/// Generates content on a background task and streams the chunks.
///
/// The stream yields exactly the chunks `generate` would pass to `on_chunk`;
/// any `on_chunk` already set on `options` is replaced. The task runs under
/// the caller's span and action context, and stops at its next await point
/// once the returned response is dropped or `options.abort_signal` fires.
/// Must be called from within a Tokio runtime.
pub fn generate_stream(
    registry: &Registry,
    mut options: GenerateOptions,
) -> GenerateStreamResponse {
    let (callback, stream) = stream_channel();
    options.on_chunk = Some(callback);
    options.context = options.context.take().or_else(get_context);
    let abort = options
        .abort_signal
        .as_ref()
        .map(CancellationToken::child_token)
        .unwrap_or_default();
    options.abort_signal = Some(abort.clone());

    let registry = registry.clone().with_tracer(registry.tracer());
    let cancelled = abort.clone();
    let response = tokio::spawn(in_current_span(async move {
        tokio::select! {
            result = action::run_generate(&registry, options) => result,
            _ = cancelled.cancelled() => {
                log::debug!("generate_stream cancelled");
                Err(Error::Cancelled)
            }
        }
    }));
    GenerateStreamResponse {
        stream,
        response,
        abort: abort.clone(),
        _abort_on_drop: abort.drop_guard(),
    }
}

/// Builds the first model request of a call and resolves the offered tools.
///
/// Messages are ordered system, history, prompt. Every tool response in the
/// history must answer an earlier tool request with the same name and `ref`.
pub fn to_generate_request(
    registry: &Registry,
    options: &GenerateOptions,
) -> Result<(GenerateRequest, Vec<Arc<dyn ErasedAction>>)> {
    let mut messages = Vec::new();
    if let Some(system) = &options.system {
        messages.push(MessageData::new(Role::System, system.clone()));
    }
    messages.extend(options.messages.iter().cloned());
    if let Some(prompt) = &options.prompt {
        messages.push(MessageData::new(Role::User, prompt.clone()));
    }
    if messages.is_empty() {
        return Err(Error::new_user_facing(
            StatusCode::InvalidArgument,
            "At least one message is required to generate content.",
            None,
        ));
    }
    check_tool_responses(&messages)?;

    let tools = resolve_tools(registry, &options.tools)?;
    let request = GenerateRequest {
        messages,
        config: options.config.clone(),
        tools: tools.iter().map(|t| to_tool_definition(t.metadata())).collect(),
        tool_choice: options.tool_choice,
        candidates: options.candidates,
    };
    Ok((request, tools))
}

fn check_tool_responses(messages: &[MessageData]) -> Result<()> {
    let mut requested: HashSet<(&str, Option<&str>)> = HashSet::new();
    for message in messages {
        for request in message.tool_requests() {
            requested.insert((request.name.as_str(), request.r#ref.as_deref()));
        }
        for response in message.tool_responses() {
            if !requested.contains(&(response.name.as_str(), response.r#ref.as_deref())) {
                return Err(Error::OrphanedToolResponse {
                    name: response.name.clone(),
                    reference: response.r#ref.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn orders_system_history_then_prompt() {
        let options = GenerateOptions::new("echo")
            .with_system("be brief")
            .with_messages(vec![MessageData::user("earlier"), MessageData::model("ok")])
            .with_prompt("now");
        let (request, tools) = to_generate_request(&Registry::new(), &options).unwrap();
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::System, Role::User, Role::Model, Role::User]);
        assert_eq!(request.messages[3].text(), "now");
        assert!(tools.is_empty());
    }

    #[test]
    fn rejects_an_empty_conversation() {
        let err = to_generate_request(&Registry::new(), &GenerateOptions::new("echo")).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);
    }

    #[test]
    fn rejects_tool_responses_without_a_matching_request() {
        let request = MessageData::new(
            Role::Model,
            vec![Part::tool_request("gablorken", Some(json!({"value": 2})), Some("1".into()))],
        );
        let answered = MessageData::new(
            Role::Tool,
            vec![Part::tool_response("gablorken", Some(json!(8)), Some("1".into()))],
        );
        let orphan = MessageData::new(
            Role::Tool,
            vec![Part::tool_response("gablorken", Some(json!(8)), Some("2".into()))],
        );

        let ok = GenerateOptions::new("echo").with_messages(vec![request.clone(), answered]);
        assert!(to_generate_request(&Registry::new(), &ok).is_ok());

        let bad = GenerateOptions::new("echo").with_messages(vec![request, orphan]);
        let err = to_generate_request(&Registry::new(), &bad).unwrap_err();
        match err {
            Error::OrphanedToolResponse { name, reference } => {
                assert_eq!(name, "gablorken");
                assert_eq!(reference.as_deref(), Some("2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
