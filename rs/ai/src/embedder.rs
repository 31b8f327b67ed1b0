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

//! # Embedders
//!
//! Embedders turn documents into vectors. Like retrievers they are plain
//! actions: a request carries the documents and typed options, the response
//! carries one or more embeddings per document.

use crate::document::Document;
use async_trait::async_trait;
use genkit_core::action::{
    Action, ActionBuilder, ActionFnArg, ActionMetadata, ActionRunOptions, ErasedAction,
};
use genkit_core::error::{Error, Result};
use genkit_core::registry::{ActionType, Registry};
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

/// A single vector. A document split into chunks yields one per chunk, with
/// the chunk described in `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Embedding {
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Embedding {
    pub fn new(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmbedRequest<O = Value> {
    pub input: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<O>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct EmbedResponse {
    pub embeddings: Vec<Embedding>,
}

/// What an embedder accepts and produces, stored in its action metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbedderInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    /// Length of every vector the embedder returns, when fixed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    /// Input kinds, such as `text` or `image`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supports: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct EmbedderAction<I = Value>(pub Action<EmbedRequest<I>, EmbedResponse, ()>);

impl<I> Deref for EmbedderAction<I> {
    type Target = Action<EmbedRequest<I>, EmbedResponse, ()>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<I> ErasedAction for EmbedderAction<I>
where
    I: DeserializeOwned + Serialize + Send + Sync + 'static,
{
    fn metadata(&self) -> &ActionMetadata {
        &self.0.meta
    }

    async fn run_json(&self, input: Value, options: ActionRunOptions<Value>) -> Result<Value> {
        self.0.run_json(input, options).await
    }
}

/// Defines an embedder and registers it as `/embedder/{name}`.
pub fn define_embedder<I, F, Fut>(
    registry: &Registry,
    name: &str,
    info: EmbedderInfo,
    runner: F,
) -> Result<EmbedderAction<I>>
where
    I: JsonSchema + DeserializeOwned + Serialize + Send + Sync + 'static,
    F: Fn(EmbedRequest<I>, ActionFnArg<()>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<EmbedResponse>> + Send + 'static,
{
    let metadata = HashMap::from([("embedder".to_string(), json!(info))]);
    let action = ActionBuilder::new(ActionType::Embedder, name, runner)
        .with_metadata(metadata)
        .build();
    let embedder = EmbedderAction(action);
    registry.register_action(Arc::new(embedder.clone()))?;
    Ok(embedder)
}

/// Embeds `documents` with the embedder registered as `name`.
///
/// Fails when the embedder declares fixed `dimensions` and returns a vector
/// of another length.
pub async fn embed<I: Serialize>(
    registry: &Registry,
    name: &str,
    documents: Vec<Document>,
    options: Option<I>,
) -> Result<Vec<Embedding>> {
    let key = ActionType::Embedder.key(name);
    let dimensions = registry
        .lookup_action(&key)?
        .metadata()
        .metadata
        .get("embedder")
        .and_then(|info| serde_json::from_value::<EmbedderInfo>(info.clone()).ok())
        .and_then(|info| info.dimensions);

    let request = serde_json::to_value(EmbedRequest {
        input: documents,
        options,
    })?;
    let response = registry.invoke(&key, request).await?;
    let response: EmbedResponse = serde_json::from_value(response)?;

    if let Some(expected) = dimensions {
        if let Some(bad) = response
            .embeddings
            .iter()
            .find(|e| e.embedding.len() != expected)
        {
            log::warn!("{} returned a vector of the wrong length", key);
            return Err(Error::new_provider(format!(
                "Embedder {} returned {} dimensions, expected {}.",
                name,
                bad.embedding.len(),
                expected
            )));
        }
    }
    Ok(response.embeddings)
}
