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

//! # Generative Models
//!
//! Request, response and chunk types exchanged with model actions, and
//! `define_model` for registering a model implementation.
//!
//! ## Key Concepts
//!
//! - **`ModelAction`**: a registered model that can be invoked to generate content.
//! - **`define_model`**: wraps a provider function into a `ModelAction`.

use crate::document::Part;
use crate::message::{MessageData, Role};
use crate::tool::ToolDefinition;
use async_trait::async_trait;
use futures::Future;
use genkit_core::action::{
    Action, ActionBuilder, ActionFnArg, ActionMetadata, ActionRunOptions, ErasedAction,
};
use genkit_core::async_utils::ChunkSender;
use genkit_core::error::{Error, Result};
use genkit_core::registry::{ActionType, Registry};
use genkit_core::status::StatusCode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

/// Describes the capabilities of a generative model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfoSupports {
    /// Whether the model supports multi-turn conversations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiturn: Option<bool>,
    /// Whether the model supports image, audio, or other media inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<bool>,
    /// Whether the model supports tool use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<bool>,
    /// Whether the model supports a system role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_role: Option<bool>,
    /// Whether the model can return more than one candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<bool>,
}

/// Provides information about a generative model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    #[serde(default)]
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports: Option<ModelInfoSupports>,
}

/// Common configuration options for generative models.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationCommonConfig {
    /// Controls the randomness of the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// The maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// A list of sequences that will stop generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// How the model may use the tools it is offered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    Required,
    None,
}

/// A request to a generative model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub messages: Vec<MessageData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Number of candidates to generate. Providers default to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<u32>,
}

/// The reason why a model finished generating a response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum FinishReason {
    /// The model finished generating the response.
    Stop,
    /// The model reached the maximum number of tokens.
    Length,
    /// The model was blocked due to a safety setting.
    Blocked,
    Other,
    #[default]
    Unknown,
}

/// Usage counters for a generation request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_characters: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_characters: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_images: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_images: Option<u32>,
}

fn add_counter(total: &mut Option<u32>, delta: Option<u32>) {
    if let Some(delta) = delta {
        *total = Some(total.unwrap_or(0).saturating_add(delta));
    }
}

impl GenerationUsage {
    /// Adds `other` into `self`. Counters only grow; overflow saturates.
    pub fn accumulate(&mut self, other: &GenerationUsage) {
        add_counter(&mut self.input_tokens, other.input_tokens);
        add_counter(&mut self.output_tokens, other.output_tokens);
        add_counter(&mut self.total_tokens, other.total_tokens);
        add_counter(&mut self.input_characters, other.input_characters);
        add_counter(&mut self.output_characters, other.output_characters);
        add_counter(&mut self.input_images, other.input_images);
        add_counter(&mut self.output_images, other.output_images);
    }
}

/// A candidate response from a generative model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateData {
    pub index: u32,
    pub message: MessageData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_message: Option<String>,
}

/// A response from a generative model.
#[derive(Default, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponseData {
    pub candidates: Vec<CandidateData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<GenerationUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}

impl GenerateResponseData {
    /// Builds a single-candidate response.
    pub fn from_message(message: MessageData, finish_reason: FinishReason) -> Self {
        Self {
            candidates: vec![CandidateData {
                index: 0,
                message,
                finish_reason: Some(finish_reason),
                finish_message: None,
            }],
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: GenerationUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// The candidate that drives the generate loop.
    pub fn first_candidate(&self) -> Option<&CandidateData> {
        self.candidates.first()
    }
}

/// A chunk of a streaming response from a generative model.
#[derive(Default, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponseChunkData {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub content: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<GenerationUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}

impl GenerateResponseChunkData {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Model),
            content: vec![Part::text(text)],
            ..Default::default()
        }
    }
}

/// An action that can be used to generate content.
#[derive(Clone, Debug)]
pub struct ModelAction(Action<GenerateRequest, GenerateResponseData, GenerateResponseChunkData>);

impl Deref for ModelAction {
    type Target = Action<GenerateRequest, GenerateResponseData, GenerateResponseChunkData>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl ErasedAction for ModelAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.0.meta
    }

    async fn run_json(&self, input: Value, options: ActionRunOptions<Value>) -> Result<Value> {
        self.0.run_json(input, options).await
    }
}

/// Options for defining a generative model.
#[derive(Default, Debug, Clone)]
pub struct DefineModelOptions {
    pub name: String,
    pub label: Option<String>,
    pub versions: Option<Vec<String>>,
    pub supports: Option<ModelInfoSupports>,
    pub config_schema: Option<Value>,
}

impl DefineModelOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            label: self.label.clone().unwrap_or_else(|| self.name.clone()),
            versions: self.versions.clone(),
            supports: self.supports.clone(),
        }
    }
}

/// Rejects requests that use features the model declared it does not support.
fn validate_support(
    name: &str,
    supports: &ModelInfoSupports,
    request: &GenerateRequest,
) -> Result<()> {
    let unsupported = |feature: &str| {
        Err(Error::new_user_facing(
            StatusCode::InvalidArgument,
            format!("Model '{}' does not support {}.", name, feature),
            None,
        ))
    };
    if supports.tools == Some(false) && !request.tools.is_empty() {
        return unsupported("tool use");
    }
    if supports.multiturn == Some(false) && request.messages.len() > 1 {
        return unsupported("multiple messages");
    }
    if supports.candidates == Some(false) && request.candidates.is_some_and(|n| n > 1) {
        return unsupported("multiple candidates");
    }
    if supports.media == Some(false)
        && request
            .messages
            .iter()
            .flat_map(|m| &m.content)
            .any(|p| p.media.is_some())
    {
        return unsupported("media input");
    }
    Ok(())
}

/// Defines a new generative model and registers it as `/model/{name}`.
///
/// `f` receives the request and a chunk sender. Sending is a no-op when the
/// caller did not ask for a stream; once a consumer fails, every later send
/// returns an error, which `f` should propagate with `?`.
pub fn define_model<F, Fut>(
    registry: &Registry,
    options: DefineModelOptions,
    f: F,
) -> Result<ModelAction>
where
    F: Fn(GenerateRequest, ChunkSender<GenerateResponseChunkData>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<GenerateResponseData>> + Send + 'static,
{
    let f = Arc::new(f);
    let name = options.name.clone();
    let supports = options.supports.clone().unwrap_or_default();

    let mut metadata = HashMap::new();
    metadata.insert("model".to_string(), json!(options.model_info()));
    if let Some(config_schema) = &options.config_schema {
        metadata.insert("configSchema".to_string(), config_schema.clone());
    }

    let action_f =
        move |request: GenerateRequest, args: ActionFnArg<GenerateResponseChunkData>| {
            let f = f.clone();
            let check = validate_support(&name, &supports, &request);
            async move {
                check?;
                f(request, args.chunk_sender).await
            }
        };

    let action = ActionBuilder::new(ActionType::Model, options.name.clone(), action_f)
        .with_metadata(metadata)
        .build();
    let model = ModelAction(action);
    registry.register_action(Arc::new(model.clone()))?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_accumulates_and_saturates() {
        let mut total = GenerationUsage::default();
        total.accumulate(&GenerationUsage {
            input_tokens: Some(10),
            output_tokens: Some(5),
            total_tokens: Some(15),
            ..Default::default()
        });
        total.accumulate(&GenerationUsage {
            input_tokens: Some(u32::MAX),
            output_images: Some(1),
            ..Default::default()
        });
        assert_eq!(total.input_tokens, Some(u32::MAX));
        assert_eq!(total.output_tokens, Some(5));
        assert_eq!(total.total_tokens, Some(15));
        assert_eq!(total.output_images, Some(1));
        assert_eq!(total.input_characters, None);
    }

    #[test]
    fn rejects_tools_for_models_without_tool_support() {
        let supports = ModelInfoSupports {
            tools: Some(false),
            ..Default::default()
        };
        let request = GenerateRequest {
            messages: vec![MessageData::user("hi")],
            tools: vec![ToolDefinition {
                name: "gablorken".into(),
                description: "".into(),
                input_schema: None,
                output_schema: None,
            }],
            ..Default::default()
        };
        let err = validate_support("echo", &supports, &request).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgument);
        assert!(validate_support("echo", &ModelInfoSupports::default(), &request).is_ok());
    }
}
