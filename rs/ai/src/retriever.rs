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

//! # Retrievers and Indexers
//!
//! Retrievers look up documents relevant to a query document; indexers store
//! documents for later retrieval. Both are plain actions with typed options.

use crate::document::Document;
use async_trait::async_trait;
use genkit_core::action::{
    Action, ActionBuilder, ActionFnArg, ActionMetadata, ActionRunOptions, ErasedAction,
};
use genkit_core::error::Result;
use genkit_core::registry::{ActionType, Registry};
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RetrieverRequest<O = Value> {
    pub query: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<O>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RetrieverResponse {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexerRequest<O = Value> {
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<O>,
}

#[derive(Clone, Debug)]
pub struct RetrieverAction<I = Value>(pub Action<RetrieverRequest<I>, RetrieverResponse, ()>);

impl<I> Deref for RetrieverAction<I> {
    type Target = Action<RetrieverRequest<I>, RetrieverResponse, ()>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<I> ErasedAction for RetrieverAction<I>
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

#[derive(Clone, Debug)]
pub struct IndexerAction<I = Value>(pub Action<IndexerRequest<I>, (), ()>);

impl<I> Deref for IndexerAction<I> {
    type Target = Action<IndexerRequest<I>, (), ()>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<I> ErasedAction for IndexerAction<I>
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

/// Defines a retriever and registers it as `/retriever/{name}`.
pub fn define_retriever<I, F, Fut>(
    registry: &Registry,
    name: &str,
    runner: F,
) -> Result<RetrieverAction<I>>
where
    I: JsonSchema + DeserializeOwned + Serialize + Send + Sync + 'static,
    F: Fn(RetrieverRequest<I>, ActionFnArg<()>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RetrieverResponse>> + Send + 'static,
{
    let action = ActionBuilder::new(ActionType::Retriever, name, runner).build();
    let retriever = RetrieverAction(action);
    registry.register_action(Arc::new(retriever.clone()))?;
    Ok(retriever)
}

/// Defines an indexer and registers it as `/indexer/{name}`.
pub fn define_indexer<I, F, Fut>(
    registry: &Registry,
    name: &str,
    runner: F,
) -> Result<IndexerAction<I>>
where
    I: JsonSchema + DeserializeOwned + Serialize + Send + Sync + 'static,
    F: Fn(IndexerRequest<I>, ActionFnArg<()>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let action = ActionBuilder::new(ActionType::Indexer, name, runner).build();
    let indexer = IndexerAction(action);
    registry.register_action(Arc::new(indexer.clone()))?;
    Ok(indexer)
}

/// Retrieves documents for `query` with the retriever registered as `name`.
pub async fn retrieve<I: Serialize>(
    registry: &Registry,
    name: &str,
    query: Document,
    options: Option<I>,
) -> Result<Vec<Document>> {
    let request = serde_json::to_value(RetrieverRequest { query, options })?;
    let key = ActionType::Retriever.key(name);
    let response = registry.invoke(&key, request).await?;
    let response: RetrieverResponse = serde_json::from_value(response)?;
    Ok(response.documents)
}

/// Indexes `documents` with the indexer registered as `name`.
pub async fn index<I: Serialize>(
    registry: &Registry,
    name: &str,
    documents: Vec<Document>,
    options: Option<I>,
) -> Result<()> {
    let request = serde_json::to_value(IndexerRequest { documents, options })?;
    registry
        .invoke(&ActionType::Indexer.key(name), request)
        .await?;
    Ok(())
}
