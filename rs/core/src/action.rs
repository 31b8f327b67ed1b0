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

//! # Genkit Actions
//!
//! An `Action` is a named, self-describing unit of work with declared input,
//! output and stream schemas. Every run goes through the same steps: open a
//! span named after the action, validate the input, run the handler with its
//! streaming and cancellation plumbing, then validate the output before it is
//! handed back. A handler is never called with input that failed validation.

use crate::async_utils::{ChunkSender, StreamingCallback};
use crate::context::{get_context, run_with_context, ActionContext};
use crate::error::{Error, Result};
use crate::registry::{ActionType, Registry};
use crate::schema::{parse_schema, validate_value, ProvidedSchema};
use crate::tracing::{SpanHandle, TraceContext, Tracer, SPAN_TYPE_ATTR};
use async_trait::async_trait;
use futures::Future;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Metadata describing a Genkit `Action`.
#[derive(Debug, Clone)]
pub struct ActionMetadata {
    pub action_type: ActionType,
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Option<ProvidedSchema>,
    pub output_schema: Option<ProvidedSchema>,
    pub stream_schema: Option<ProvidedSchema>,
    pub metadata: HashMap<String, Value>,
}

impl ActionMetadata {
    /// Registry key of the action, e.g. `/tool/gablorken`.
    pub fn key(&self) -> String {
        self.action_type.key(&self.name)
    }
}

/// Arguments passed to the function that implements an action's logic.
pub struct ActionFnArg<S> {
    /// Indicates whether the caller requested a streaming response.
    pub streaming_requested: bool,
    /// Delivers streaming chunks to the caller, in order.
    pub chunk_sender: ChunkSender<S>,
    /// Additional runtime context, such as authentication information.
    pub context: Option<ActionContext>,
    /// Trace context of the action's span.
    pub trace: Option<TraceContext>,
    /// A token that signals when the action should be cancelled.
    pub abort_signal: CancellationToken,
}

/// Per-call options of an action run.
pub struct ActionRunOptions<S> {
    /// Context for this call. Defaults to the context of the calling action.
    pub context: Option<ActionContext>,
    /// Receives streamed chunks. Streaming is requested when this is set.
    pub on_chunk: Option<StreamingCallback<S>>,
    pub abort_signal: Option<CancellationToken>,
    /// Tracer for the action span. Defaults to the enclosing span's tracer.
    pub tracer: Option<Tracer>,
}

impl<S> Default for ActionRunOptions<S> {
    fn default() -> Self {
        Self {
            context: None,
            on_chunk: None,
            abort_signal: None,
            tracer: None,
        }
    }
}

impl<S> Clone for ActionRunOptions<S> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            on_chunk: self.on_chunk.clone(),
            abort_signal: self.abort_signal.clone(),
            tracer: self.tracer.clone(),
        }
    }
}

/// A trait that defines the executable logic of a Genkit action.
#[async_trait]
pub trait ActionFn<I, O, S>: Send + Sync {
    async fn run(&self, input: I, args: ActionFnArg<S>) -> Result<O>;
}

/// Blanket implementation of `ActionFn` for any suitable async closure.
#[async_trait]
impl<F, Fut, I, O, S> ActionFn<I, O, S> for F
where
    F: Fn(I, ActionFnArg<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send,
    I: Send + 'static,
    O: Send + 'static,
    S: Send + 'static,
{
    async fn run(&self, input: I, args: ActionFnArg<S>) -> Result<O> {
        (self)(input, args).await
    }
}

/// A type-erased action, as stored in the registry.
#[async_trait]
pub trait ErasedAction: Send + Sync {
    fn metadata(&self) -> &ActionMetadata;

    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Runs the action on a JSON input, streaming JSON chunks.
    async fn run_json(&self, input: Value, options: ActionRunOptions<Value>) -> Result<Value>;
}

impl fmt::Debug for dyn ErasedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErasedAction")
            .field(&self.metadata().key())
            .finish()
    }
}

/// A self-describing, callable unit of work.
pub struct Action<I, O, S> {
    pub meta: Arc<ActionMetadata>,
    pub func: Arc<dyn ActionFn<I, O, S>>,
}

impl<I, O, S> Clone for Action<I, O, S> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            func: self.func.clone(),
        }
    }
}

impl<I, O, S> fmt::Debug for Action<I, O, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("meta", &self.meta).finish()
    }
}

impl<I, O, S> Action<I, O, S>
where
    I: Serialize + DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    S: Serialize + Send + 'static,
{
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Runs the action on a typed input.
    pub async fn run(&self, input: I, options: ActionRunOptions<S>) -> Result<O> {
        let input = serde_json::to_value(&input)?;
        let sender = ChunkSender::new(options.on_chunk.clone());
        self.run_validated(input, sender, options)
            .await
            .map(|(output, _)| output)
    }

    async fn run_validated<T>(
        &self,
        input: Value,
        chunk_sender: ChunkSender<S>,
        options: ActionRunOptions<T>,
    ) -> Result<(O, Value)> {
        let tracer = options.tracer.clone().unwrap_or_else(Tracer::current);
        tracer
            .in_new_span(self.meta.name.clone(), |span| async move {
                span.set_attribute(SPAN_TYPE_ATTR, "action");
                span.set_attribute("genkit:metadata:subtype", self.meta.action_type.to_string());
                span.set_input(&input);

                let parsed = self.parse_input(input)?;
                let output = self
                    .execute(parsed, chunk_sender, &span, options.context, options.abort_signal)
                    .await?;
                let value = self.validate_output(&output)?;
                span.set_output(&value);
                Ok((output, value))
            })
            .await
    }

    fn parse_input(&self, input: Value) -> Result<I> {
        match &self.meta.input_schema {
            Some(schema) => parse_schema(input, schema).map_err(|source| Error::InvalidInput {
                action: self.meta.name.clone(),
                source,
            }),
            None => Ok(serde_json::from_value(input)?),
        }
    }

    fn validate_output(&self, output: &O) -> Result<Value> {
        let value = serde_json::to_value(output)?;
        if let Some(schema) = &self.meta.output_schema {
            validate_value(schema, &value).map_err(|source| Error::InvalidOutput {
                action: self.meta.name.clone(),
                source,
            })?;
        }
        Ok(value)
    }

    async fn execute(
        &self,
        input: I,
        chunk_sender: ChunkSender<S>,
        span: &SpanHandle,
        context: Option<ActionContext>,
        abort_signal: Option<CancellationToken>,
    ) -> Result<O> {
        let context = context.or_else(get_context);
        let abort_signal = abort_signal.unwrap_or_default();
        let args = ActionFnArg {
            streaming_requested: chunk_sender.is_streaming(),
            chunk_sender: chunk_sender.clone(),
            context: context.clone(),
            trace: Some(span.trace_context().clone()),
            abort_signal: abort_signal.clone(),
        };

        let handler = self.func.run(input, args);
        let handler = async move {
            match context {
                Some(context) => run_with_context(context, handler).await,
                None => handler.await,
            }
        };
        let result = tokio::select! {
            biased;
            _ = abort_signal.cancelled() => Err(Error::Cancelled),
            result = handler => result,
        };

        // A failed stream consumer outranks whatever the handler made of it.
        match chunk_sender.take_failure() {
            Some(failure) => Err(failure),
            None => result,
        }
    }
}

#[async_trait]
impl<I, O, S> ErasedAction for Action<I, O, S>
where
    I: Serialize + DeserializeOwned + Send + Sync + 'static,
    O: Serialize + Send + Sync + 'static,
    S: Serialize + Send + Sync + 'static,
{
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn run_json(&self, input: Value, options: ActionRunOptions<Value>) -> Result<Value> {
        let sender = ChunkSender::new(options.on_chunk.clone())
            .map(|chunk: S| serde_json::to_value(chunk).unwrap_or(Value::Null));
        self.run_validated(input, sender, options)
            .await
            .map(|(_, value)| value)
    }
}

/// Builder for creating a new `Action`.
///
/// Input and output schemas default to the ones generated for `I` and `O`;
/// the stream schema is always generated from `S`.
pub struct ActionBuilder<I, O, S, F> {
    action_type: ActionType,
    name: String,
    description: Option<String>,
    metadata: HashMap<String, Value>,
    input_schema: Option<ProvidedSchema>,
    output_schema: Option<ProvidedSchema>,
    func: F,
    _marker: PhantomData<fn(I, S) -> O>,
}

impl<I, O, S, F, Fut> ActionBuilder<I, O, S, F>
where
    I: Serialize + DeserializeOwned + JsonSchema + Send + Sync + 'static,
    O: Serialize + JsonSchema + Send + Sync + 'static,
    S: Serialize + JsonSchema + Send + Sync + 'static,
    F: Fn(I, ActionFnArg<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send,
{
    pub fn new(action_type: ActionType, name: impl Into<String>, func: F) -> Self {
        Self {
            action_type,
            name: name.into(),
            description: None,
            metadata: HashMap::new(),
            input_schema: None,
            output_schema: None,
            func,
            _marker: PhantomData,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_input_schema(mut self, schema: impl Into<ProvidedSchema>) -> Self {
        self.input_schema = Some(schema.into());
        self
    }

    pub fn with_output_schema(mut self, schema: impl Into<ProvidedSchema>) -> Self {
        self.output_schema = Some(schema.into());
        self
    }

    pub fn build(self) -> Action<I, O, S> {
        let meta = Arc::new(ActionMetadata {
            action_type: self.action_type,
            name: self.name,
            description: self.description,
            input_schema: Some(self.input_schema.unwrap_or_else(ProvidedSchema::of::<I>)),
            output_schema: Some(self.output_schema.unwrap_or_else(ProvidedSchema::of::<O>)),
            stream_schema: Some(ProvidedSchema::of::<S>()),
            metadata: self.metadata,
        });

        Action {
            meta,
            func: Arc::new(self.func),
        }
    }

    /// Builds the action and registers it with `registry`.
    pub fn register(self, registry: &Registry) -> Result<Action<I, O, S>> {
        let action = self.build();
        registry.register_action(Arc::new(action.clone()))?;
        Ok(action)
    }
}

/// Defines an action and registers it with `registry`.
pub fn define_action<I, O, S, F, Fut>(
    registry: &Registry,
    action_type: ActionType,
    name: impl Into<String>,
    func: F,
) -> Result<Action<I, O, S>>
where
    I: Serialize + DeserializeOwned + JsonSchema + Send + Sync + 'static,
    O: Serialize + JsonSchema + Send + Sync + 'static,
    S: Serialize + JsonSchema + Send + Sync + 'static,
    F: Fn(I, ActionFnArg<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send,
{
    ActionBuilder::new(action_type, name, func).register(registry)
}
